//! Citations and episode grouping for answer generation
//!
//! A [`Citation`] is the caller-facing proof of where a retrieved line came
//! from. Conversion from a [`RetrievalResult`] never loses a field: optional
//! fields stay absent rather than turning into empty strings.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::search::RetrievalResult;

/// Where a passage came from, in the shape consumed by answer and display layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub episode_id: String,
    pub episode_name: String,
    pub chapter_id: String,
    pub message_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text_primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_secondary: Option<String>,
}

impl Citation {
    /// Short anchor such as `Onikakushi-hen / day3 #42`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} / {} #{}", self.episode_name, self.chapter_id, self.message_id)
    }
}

impl From<&RetrievalResult> for Citation {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            episode_id: result.episode_id.clone(),
            episode_name: result.episode_name.clone(),
            chapter_id: result.chapter_id.clone(),
            message_id: result.message_id,
            speaker: result.speaker.clone(),
            text_primary: result.text_primary.clone(),
            text_secondary: result.text_secondary.clone(),
        }
    }
}

/// Convert a retrieval result into a citation.
#[must_use]
pub fn to_citation(result: &RetrievalResult) -> Citation {
    Citation::from(result)
}

/// Group results by episode id, keeping the supplied order inside each group.
#[must_use]
pub fn group_by_episode(results: &[RetrievalResult]) -> BTreeMap<String, Vec<RetrievalResult>> {
    let mut groups: BTreeMap<String, Vec<RetrievalResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(result.episode_id.clone())
            .or_default()
            .push(result.clone());
    }
    groups
}

/// Drop repeated passages, keeping the first (best ranked) occurrence.
///
/// Message ids are only unique within a chapter, so the key is the full
/// (episode, chapter, message) coordinate.
#[must_use]
pub fn dedup_citations(citations: Vec<Citation>) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert((c.episode_id.clone(), c.chapter_id.clone(), c.message_id)))
        .collect()
}
