//! scriptcite CLI - index a script and ask it questions
//!
//! # Commands
//!
//! ```bash
//! # Embed every message of a script into ./index
//! scriptcite ingest script.json
//!
//! # Ask a question, scoped to one episode
//! scriptcite search "Who was at the dam site?" --episode onikakushi --min-score 0.3
//!
//! # Embed text and show vector stats
//! scriptcite embed "Oyashiro-sama's curse"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scriptcite_lib::{
    citation::{dedup_citations, group_by_episode, to_citation, Citation},
    embed::{Embedder, OpenAiConfig, OpenAiEmbedder, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL},
    ingest::Script,
    search::{EngineConfig, SearchEngine, SearchOptions},
    store::FsObjectStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scriptcite")]
#[command(about = "Semantic search with citations over episodic scripts")]
#[command(version)]
struct Cli {
    /// Directory holding the embedding records
    #[arg(long, global = true, env = "SCRIPTCITE_STORE", default_value = "./index")]
    store: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Provider {
    /// OpenAI-compatible embeddings endpoint
    Openai,
    /// Local BGE model (requires the `bge` feature)
    Bge,
}

#[derive(Args)]
struct ProviderArgs {
    /// Embedding provider
    #[arg(long, global = true, value_enum, default_value = "openai")]
    provider: Provider,

    /// OpenAI API key used for embeddings
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, global = true, env = "SCRIPTCITE_OPENAI_BASE", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, global = true, env = "SCRIPTCITE_OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    /// Optional embedding dimension override
    #[arg(long, global = true, env = "SCRIPTCITE_OPENAI_DIMENSIONS")]
    openai_dimensions: Option<usize>,

    /// Seconds before embedding requests time out
    #[arg(long, global = true, default_value_t = 30)]
    openai_timeout_secs: u64,

    /// Retry attempts for transient embedding errors
    #[arg(long, global = true, default_value_t = 5)]
    max_retries: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and store every message of a script file
    Ingest {
        /// Script JSON file
        input: PathBuf,

        /// Messages per embedding request
        #[arg(long, default_value = "64")]
        batch_size: usize,
    },

    /// Search the index and print citations grouped by episode
    Search {
        /// Question to search for
        query: String,

        /// Restrict to an episode (repeatable)
        #[arg(short, long = "episode")]
        episodes: Vec<String>,

        /// Metadata constraint as key=value (repeatable)
        #[arg(short, long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,

        /// Number of results to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Maximum concurrent record fetches
        #[arg(long, default_value = "16")]
        concurrency: usize,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Embed text and show vector info
    Embed {
        /// Text to embed
        text: String,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

fn build_embedder(args: &ProviderArgs) -> Result<Arc<dyn Embedder>> {
    match args.provider {
        Provider::Openai => {
            let Some(api_key) = args.openai_api_key.clone() else {
                bail!("OPENAI_API_KEY is required for the openai provider");
            };
            let config = OpenAiConfig {
                base_url: args.openai_base_url.clone(),
                model: args.openai_model.clone(),
                dimensions: args.openai_dimensions,
                timeout: Duration::from_secs(args.openai_timeout_secs.max(1)),
                max_retries: args.max_retries.max(1),
                ..OpenAiConfig::new(api_key)
            };
            Ok(Arc::new(OpenAiEmbedder::new(config)?))
        }
        Provider::Bge => build_bge(),
    }
}

#[cfg(feature = "bge")]
fn build_bge() -> Result<Arc<dyn Embedder>> {
    println!("Loading BGE model (first run downloads ~1.2GB)...");
    Ok(Arc::new(scriptcite_lib::embed::BgeEmbedder::new()?))
}

#[cfg(not(feature = "bge"))]
fn build_bge() -> Result<Arc<dyn Embedder>> {
    bail!("this build does not include the bge provider; rebuild with --features bge")
}

fn print_citations(citations: &[Citation], scores: &[f32]) {
    for (citation, score) in citations.iter().zip(scores) {
        println!("  [{}] (score: {score:.4})", citation.label());
        match &citation.speaker {
            Some(speaker) => println!("    {speaker}: {}", citation.text_primary),
            None => println!("    {}", citation.text_primary),
        }
        if let Some(secondary) = &citation.text_secondary {
            println!("    {secondary}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { input, batch_size } => {
            let text = fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let script = Script::from_json(&text)?;
            println!(
                "Loaded {} episodes ({} messages) from '{}'",
                script.episodes.len(),
                script.message_count(),
                input.display()
            );

            let embedder = build_embedder(&cli.provider)?;
            let engine = SearchEngine::new(embedder, FsObjectStore::new(&cli.store));
            let written = engine.index_with_batch_size(&script, batch_size).await?;
            println!("Indexed {written} records into '{}'", cli.store.display());
        }

        Commands::Search {
            query,
            episodes,
            filters,
            top_k,
            min_score,
            concurrency,
            json,
        } => {
            let embedder = build_embedder(&cli.provider)?;
            let config = EngineConfig {
                max_concurrent_fetches: concurrency.max(1),
                ..EngineConfig::default()
            };
            let engine = SearchEngine::with_config(embedder, FsObjectStore::new(&cli.store), config);

            let options = SearchOptions {
                episode_ids: episodes.into_iter().collect(),
                metadata_filters: filters.into_iter().collect::<BTreeMap<_, _>>(),
                top_k,
                min_score,
            };
            info!(query = %query, "searching");
            let results = engine.semantic_search(&query, &options).await?;

            if json {
                let citations = dedup_citations(results.iter().map(to_citation).collect());
                let output = serde_json::json!({
                    "query": query,
                    "results": results,
                    "citations": citations,
                    "byEpisode": group_by_episode(&results),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            if results.is_empty() {
                println!("No passages matched '{query}'");
                return Ok(());
            }
            println!("=== {} results for '{query}' ===\n", results.len());
            for (episode_id, group) in group_by_episode(&results) {
                let name = group.first().map_or(episode_id.as_str(), |r| r.episode_name.as_str());
                println!("{name} ({episode_id})");
                let citations: Vec<Citation> = group.iter().map(to_citation).collect();
                let scores: Vec<f32> = group.iter().map(|r| r.score).collect();
                print_citations(&citations, &scores);
                println!();
            }
        }

        Commands::Embed { text } => {
            let embedder = build_embedder(&cli.provider)?;
            println!("Embedding as query with {}: {text}", embedder.model_name());
            let embedding = embedder.embed_query(&text).await?;

            println!("\nEmbedding stats:");
            println!("  Dimensions: {}", embedding.len());
            println!("  First 5 values: {:?}", &embedding[..embedding.len().min(5)]);
            println!("  Min: {:.4}", embedding.iter().cloned().fold(f32::INFINITY, f32::min));
            println!("  Max: {:.4}", embedding.iter().cloned().fold(f32::NEG_INFINITY, f32::max));
        }
    }

    Ok(())
}
