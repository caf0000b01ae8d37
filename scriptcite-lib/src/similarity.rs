//! Vector similarity and deterministic ranking

use std::cmp::Ordering;

use crate::{Error, Result};

/// Cosine similarity between a query vector and a candidate vector.
///
/// Returns a value in [-1, 1] where 1 means identical direction. A zero-norm
/// vector has no direction and scores 0. Vectors of different lengths are a
/// caller bug and fail with [`Error::DimensionMismatch`].
pub fn score(query: &[f32], candidate: &[f32]) -> Result<f32> {
    if query.len() != candidate.len() {
        return Err(Error::DimensionMismatch {
            expected: query.len(),
            got: candidate.len(),
        });
    }
    Ok(cosine_similarity(query, candidate))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Fields that decide where a scored passage lands in a ranking.
#[derive(Debug, Clone, Copy)]
pub struct RankKey<'a> {
    pub score: f32,
    pub message_id: u64,
    pub episode_id: &'a str,
    pub chapter_id: &'a str,
    pub id: &'a str,
}

/// Anything that can be placed in a ranking.
pub trait Ranked {
    fn rank_key(&self) -> RankKey<'_>;
}

/// Total ranking order: score descending, then ascending message id, then
/// episode id. Chapter and record id settle whatever is still tied.
#[must_use]
pub fn compare(a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.message_id.cmp(&b.message_id))
        .then_with(|| a.episode_id.cmp(b.episode_id))
        .then_with(|| a.chapter_id.cmp(b.chapter_id))
        .then_with(|| a.id.cmp(b.id))
}

/// Sort items into ranking order and keep the best `top_k`.
pub fn rank<T: Ranked>(items: &mut Vec<T>, top_k: usize) {
    items.sort_by(|a, b| compare(&a.rank_key(), &b.rank_key()));
    items.truncate(top_k);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        score: f32,
        message_id: u64,
        episode_id: String,
    }

    impl Ranked for Item {
        fn rank_key(&self) -> RankKey<'_> {
            RankKey {
                score: self.score,
                message_id: self.message_id,
                episode_id: &self.episode_id,
                chapter_id: "c",
                id: "",
            }
        }
    }

    fn item(score: f32, message_id: u64, episode_id: &str) -> Item {
        Item {
            score,
            message_id,
            episode_id: episode_id.to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let sim = score(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let sim = score(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let sim = score(&[1.0, 0.0, 0.0], &[-1.0, 0.0, 0.0]).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let sim = score(&[1.0, 1.0], &[10.0, 10.0]).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_norm_scores_zero() {
        assert_eq!(score(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert_eq!(score(&[1.0, 0.0], &[0.0, 0.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let err = score(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3 }));
    }

    #[test]
    fn test_rank_sorts_by_score_descending() {
        let mut items = vec![item(0.2, 1, "a"), item(0.9, 2, "a"), item(0.5, 3, "a")];
        rank(&mut items, 10);
        let scores: Vec<f32> = items.iter().map(|i| i.score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }

    #[test]
    fn test_rank_breaks_ties_by_message_then_episode() {
        let mut items = vec![
            item(0.5, 7, "b"),
            item(0.5, 3, "b"),
            item(0.5, 3, "a"),
            item(0.8, 9, "z"),
        ];
        rank(&mut items, 10);
        let order: Vec<(u64, &str)> = items
            .iter()
            .map(|i| (i.message_id, i.episode_id.as_str()))
            .collect();
        assert_eq!(order, vec![(9, "z"), (3, "a"), (3, "b"), (7, "b")]);
    }

    #[test]
    fn test_rank_truncates() {
        let mut items = vec![item(0.1, 1, "a"), item(0.2, 2, "a"), item(0.3, 3, "a")];
        rank(&mut items, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].score, 0.3);
    }

    #[test]
    fn test_rank_handles_nan_without_panicking() {
        let mut items = vec![item(f32::NAN, 1, "a"), item(0.3, 2, "a")];
        rank(&mut items, 5);
        assert_eq!(items.len(), 2);
    }
}
