//! Semantic memo cache.
//!
//! Reuses answers the user has confirmed for questions that embed close to
//! the current one. Entries enter the cache only through the feedback path;
//! a bare solve never writes here.

use super::splitter::{detect_operation, detect_topic};
use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::embedding::{Embedder, cosine_similarity};
use crate::models::{Feedback, FeedbackRequest, MemoEntry, ResolutionResult, ResolvedAnswer};
use crate::storage::MemoStore;
use crate::{Error, Result, current_timestamp};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// A memo entry close enough to the query to be reused.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoHit {
    /// The matched entry.
    pub entry: MemoEntry,
    /// The answer to serve (the correction for rejected entries).
    pub answer: ResolvedAnswer,
    /// Cosine similarity between the query and the entry.
    pub score: f32,
}

/// Nearest-neighbour lookup over confirmed (problem, answer) pairs.
pub struct SemanticMemoCache {
    store: Arc<dyn MemoStore>,
    embedder: Arc<dyn Embedder>,
    threshold: f32,
}

impl SemanticMemoCache {
    /// Creates a cache with the default similarity threshold.
    #[must_use]
    pub fn new(store: Arc<dyn MemoStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Sets the minimum cosine similarity for a hit (inclusive).
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns the similarity threshold.
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Finds the most similar servable entry at or above the threshold.
    ///
    /// Ties go to the oldest entry. An empty store is a miss and skips the
    /// embedding call.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the query cannot be
    /// embedded.
    #[instrument(skip(self, query), fields(operation = "memo_lookup", query_len = query.len()))]
    pub fn lookup(&self, query: &str) -> Result<Option<MemoHit>> {
        let start = Instant::now();

        let result = (|| -> Result<Option<MemoHit>> {
            let entries = self.store.load()?;
            let candidates: Vec<(MemoEntry, ResolvedAnswer)> = entries
                .into_iter()
                .filter_map(|entry| {
                    let answer = entry.servable_answer()?;
                    Some((entry, answer))
                })
                .collect();
            if candidates.is_empty() {
                return Ok(None);
            }

            let query_embedding = self.embedder.embed(query)?;
            let mut best: Option<(usize, f32)> = None;
            for (index, (entry, _)) in candidates.iter().enumerate() {
                let score = cosine_similarity(&query_embedding, &entry.embedding);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((index, score));
                }
            }

            Ok(best
                .filter(|(_, score)| *score >= self.threshold)
                .and_then(|(index, score)| {
                    let (entry, answer) = candidates.into_iter().nth(index)?;
                    Some(MemoHit { entry, answer, score })
                }))
        })();

        let outcome = match &result {
            Ok(Some(_)) => "hit",
            Ok(None) => "miss",
            Err(_) => "error",
        };
        metrics::counter!("memo_lookup_total", "outcome" => outcome).increment(1);
        metrics::histogram!("memo_lookup_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Ok(Some(hit)) = &result {
            tracing::debug!(entry_id = %hit.entry.id, score = hit.score, "Memo cache hit");
        }
        result
    }

    /// Records the user's verdict on a resolved sub-problem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank problem text, and an error if
    /// embedding or appending fails.
    pub fn record_feedback(
        &self,
        problem: &str,
        solution: &ResolutionResult,
        feedback: Feedback,
        correction: Option<&str>,
    ) -> Result<MemoEntry> {
        self.record(FeedbackRequest {
            problem_text: problem.to_string(),
            topic: None,
            final_answer: solution.final_answer.clone(),
            solution_steps: solution.steps.clone(),
            feedback,
            correction: correction.map(ToString::to_string),
        })
    }

    /// Embeds the problem and appends a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank problem text, and an error if
    /// embedding or appending fails.
    #[instrument(skip(self, request), fields(operation = "memo_record", feedback = %request.feedback))]
    pub fn record(&self, request: FeedbackRequest) -> Result<MemoEntry> {
        let problem_text = request.problem_text.trim().to_string();
        if problem_text.is_empty() {
            return Err(Error::InvalidInput("problem_text is blank".to_string()));
        }

        let embedding = self.embedder.embed(&problem_text)?;
        let topic = request
            .topic
            .unwrap_or_else(|| detect_topic(&problem_text, detect_operation(&problem_text)));
        let correction = request
            .correction
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let entry = MemoEntry {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: current_timestamp(),
            embedding,
            problem_text,
            topic,
            solution_steps: request.solution_steps,
            final_answer: request.final_answer,
            feedback: request.feedback,
            correction,
        };
        self.store.append(&entry)?;

        metrics::counter!("memo_entries_recorded_total", "feedback" => entry.feedback.as_str())
            .increment(1);
        tracing::info!(entry_id = %entry.id, topic = %entry.topic, "Recorded memo entry");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Route, SourceTier, Topic};
    use crate::storage::InMemoryMemoStore;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds known texts to fixed vectors and counts calls.
    struct TableEmbedder {
        table: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(table: &[(&'static str, Vec<f32>)]) -> Self {
            Self {
                table: table.iter().cloned().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for TableEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .get(text)
                .cloned()
                .ok_or_else(|| Error::upstream("embedding", "unknown text"))
        }
    }

    fn solution(answer: &str) -> ResolutionResult {
        ResolutionResult::new("q", ResolvedAnswer::plain(answer), SourceTier::Symbolic, Route::Derivative)
            .with_steps(vec!["Differentiate".to_string()])
    }

    fn cache(table: &[(&'static str, Vec<f32>)]) -> (SemanticMemoCache, Arc<TableEmbedder>) {
        let embedder = Arc::new(TableEmbedder::new(table));
        let cache = SemanticMemoCache::new(Arc::new(InMemoryMemoStore::new()), embedder.clone());
        (cache, embedder)
    }

    #[test]
    fn test_empty_store_is_miss_without_embedding() {
        let (cache, embedder) = cache(&[("q", vec![1.0, 0.0])]);
        assert!(cache.lookup("q").unwrap().is_none());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hit_at_or_above_threshold() {
        let (cache, _) = cache(&[
            ("derivative of x^2", vec![1.0, 0.0]),
            ("differentiate x^2", vec![0.9, 0.1]),
            ("gradient of x*y", vec![0.0, 1.0]),
        ]);
        cache
            .record_feedback("derivative of x^2", &solution("2*x"), Feedback::Correct, None)
            .unwrap();

        let hit = cache.lookup("differentiate x^2").unwrap().unwrap();
        assert_eq!(hit.answer.text, "2*x");
        assert!(hit.score >= 0.85);

        assert!(cache.lookup("gradient of x*y").unwrap().is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (cache, _) = cache(&[("a", vec![1.0, 0.0]), ("b", vec![1.0, 0.0])]);
        let cache = cache.with_threshold(1.0);
        cache.record_feedback("a", &solution("1"), Feedback::Correct, None).unwrap();
        assert!(cache.lookup("b").unwrap().is_some());
    }

    #[test]
    fn test_ties_go_to_oldest_entry() {
        let (cache, _) = cache(&[("first", vec![1.0, 0.0]), ("second", vec![1.0, 0.0])]);
        cache.record_feedback("first", &solution("old"), Feedback::Correct, None).unwrap();
        cache.record_feedback("second", &solution("new"), Feedback::Correct, None).unwrap();

        let hit = cache.lookup("first").unwrap().unwrap();
        assert_eq!(hit.answer.text, "old");
    }

    #[test]
    fn test_rejected_entries() {
        let (cache, _) = cache(&[("p", vec![1.0, 0.0]), ("r", vec![0.0, 1.0])]);
        cache.record_feedback("p", &solution("wrong"), Feedback::Incorrect, None).unwrap();
        assert!(cache.lookup("p").unwrap().is_none());

        cache
            .record_feedback("r", &solution("wrong"), Feedback::Incorrect, Some("right"))
            .unwrap();
        assert_eq!(cache.lookup("r").unwrap().unwrap().answer.text, "right");
    }

    #[test]
    fn test_record_fills_entry() {
        let (cache, _) = cache(&[("derivative of x^2", vec![1.0, 0.0])]);
        let entry = cache
            .record_feedback("  derivative of x^2 ", &solution("2*x"), Feedback::Correct, Some("  "))
            .unwrap();
        assert_eq!(entry.problem_text, "derivative of x^2");
        assert_eq!(entry.topic, Topic::Calculus);
        assert_eq!(entry.solution_steps, vec!["Differentiate".to_string()]);
        assert_eq!(entry.correction, None);
        assert!(!entry.id.is_empty());
    }

    #[test]
    fn test_record_rejects_blank_problem() {
        let (cache, _) = cache(&[]);
        let err = cache
            .record_feedback("  ", &solution("1"), Feedback::Correct, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_embedding_failure_is_error() {
        let (cache, _) = cache(&[("known", vec![1.0, 0.0])]);
        cache.record_feedback("known", &solution("1"), Feedback::Correct, None).unwrap();
        assert!(cache.lookup("unknown").is_err());
    }
}
