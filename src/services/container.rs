//! Service container.
//!
//! Wires configured collaborators into a [`ResolutionCascade`]. Collaborators
//! that fail to initialize are left out with a warning so the cascade still
//! runs with the remaining tiers.
//!
//! ```text
//! QuantixServices::from_config
//!   ├── embedder   → BulkheadEmbedder<FastEmbedEmbedder>
//!   ├── memo       → SemanticMemoCache over the configured MemoStore
//!   ├── knowledge  → VectorKnowledgeBase (saved index, or ingested docs_dir)
//!   ├── llm        → Bulkhead(Resilient(provider)), if configured
//!   └── cascade    → memory → knowledge → symbolic → generative
//! ```

use super::{
    Explainer, GenerativeFallback, LlmFallback, NullFallback, ResolutionCascade, SemanticMemoCache,
    SymbolicDispatch,
};
use crate::config::QuantixConfig;
use crate::embedding::{BulkheadEmbedder, Embedder, FastEmbedEmbedder};
use crate::knowledge::{IngestStats, KnowledgeRetriever, VectorKnowledgeBase};
use crate::llm::{LlmProvider, build_llm_provider};
use crate::models::{FeedbackRequest, MemoEntry};
use crate::storage::open_memo_store;
use crate::symbolic::NativeEngine;
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Fully wired services.
pub struct QuantixServices {
    /// The resolution cascade.
    pub cascade: Arc<ResolutionCascade>,
    /// Memo cache, when its store opened.
    pub memo: Option<Arc<SemanticMemoCache>>,
    /// Knowledge base, when enabled and loaded.
    pub knowledge: Option<Arc<VectorKnowledgeBase>>,
    /// Wrapped LLM provider, when configured.
    pub llm: Option<Arc<dyn LlmProvider>>,
    embedder: Arc<dyn Embedder>,
    config: QuantixConfig,
}

impl QuantixServices {
    /// Builds every service from configuration.
    ///
    /// # Errors
    ///
    /// Currently infallible; collaborator failures degrade the cascade
    /// instead of failing construction.
    pub fn from_config(config: &QuantixConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(BulkheadEmbedder::from_env(FastEmbedEmbedder::new()));

        let memo = Self::create_memo(config, &embedder);
        let knowledge = if config.features.knowledge_tier {
            Self::create_knowledge(config, &embedder)
        } else {
            None
        };
        let llm = build_llm_provider(&config.llm);

        let fallback: Arc<dyn GenerativeFallback> = match &llm {
            Some(llm) => Arc::new(LlmFallback::new(Arc::clone(llm))),
            None => Arc::new(NullFallback),
        };

        let mut builder = ResolutionCascade::builder(fallback)
            .symbolic(
                SymbolicDispatch::new(Arc::new(NativeEngine::new()))
                    .with_selection(config.symbolic.variable_selection),
            )
            .features(config.features)
            .max_concurrent(config.cascade.max_concurrent);
        if let Some(memo) = &memo {
            builder = builder.memory(Arc::clone(memo));
        }
        if let Some(knowledge) = &knowledge {
            builder = builder.knowledge_with_top_k(Arc::clone(knowledge) as Arc<dyn KnowledgeRetriever>, config.knowledge.top_k);
        }
        if let Some(llm) = &llm {
            builder = builder.explainer(Explainer::new(Arc::clone(llm)));
        }

        tracing::info!(
            memo = memo.is_some(),
            knowledge = knowledge.is_some(),
            llm = llm.as_ref().map_or("none", |p| p.name()),
            "Services initialized"
        );

        Ok(Self {
            cascade: Arc::new(builder.build()),
            memo,
            knowledge,
            llm,
            embedder,
            config: config.clone(),
        })
    }

    fn create_memo(
        config: &QuantixConfig,
        embedder: &Arc<dyn Embedder>,
    ) -> Option<Arc<SemanticMemoCache>> {
        let path = config.memo_path();
        match open_memo_store(&config.memo, &path) {
            Ok(store) => Some(Arc::new(
                SemanticMemoCache::new(store, Arc::clone(embedder))
                    .with_threshold(config.memo.similarity_threshold),
            )),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Memo store unavailable; memory tier disabled");
                None
            },
        }
    }

    fn create_knowledge(
        config: &QuantixConfig,
        embedder: &Arc<dyn Embedder>,
    ) -> Option<Arc<VectorKnowledgeBase>> {
        let index_path = config.knowledge_index_path();
        let kb = match VectorKnowledgeBase::load(&index_path, Arc::clone(embedder)) {
            Ok(kb) => kb.with_min_score(config.knowledge.min_score),
            Err(e) => {
                tracing::warn!(path = %index_path.display(), error = %e, "Knowledge index unavailable");
                return None;
            },
        };

        if kb.is_empty() {
            let Some(docs_dir) = &config.knowledge.docs_dir else {
                tracing::debug!("No knowledge index or docs_dir; knowledge tier disabled");
                return None;
            };
            if let Err(e) = kb.ingest_dir(docs_dir) {
                tracing::warn!(dir = %docs_dir.display(), error = %e, "Knowledge ingestion failed");
                return None;
            }
            if let Err(e) = kb.save(&index_path) {
                tracing::warn!(path = %index_path.display(), error = %e, "Failed to save knowledge index");
            }
        }
        Some(Arc::new(kb))
    }

    /// Rebuilds the knowledge index from `dir` and saves it.
    ///
    /// # Errors
    ///
    /// Returns an error if ingestion or saving fails.
    pub fn ingest_knowledge(&self, dir: &Path) -> Result<IngestStats> {
        let kb = VectorKnowledgeBase::new(Arc::clone(&self.embedder))
            .with_min_score(self.config.knowledge.min_score);
        let stats = kb.ingest_dir(dir)?;
        kb.save(&self.config.knowledge_index_path())?;
        Ok(stats)
    }

    /// Records user feedback in the memo store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FeatureNotEnabled`] when no memo store is available,
    /// or the error from recording.
    pub fn record_feedback(&self, request: FeedbackRequest) -> Result<MemoEntry> {
        let memo = self
            .memo
            .as_ref()
            .ok_or_else(|| Error::FeatureNotEnabled("memo store".to_string()))?;
        memo.record(request)
    }

    /// The configuration the services were built from.
    #[must_use]
    pub const fn config(&self) -> &QuantixConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeatureFlags, MemoBackend};
    use crate::models::{Feedback, ResolvedAnswer, SourceTier};
    use tempfile::TempDir;

    fn config(dir: &Path) -> QuantixConfig {
        let mut config = QuantixConfig::new().with_data_dir(dir);
        config.memo.backend = MemoBackend::File;
        config
    }

    #[test]
    fn test_default_services_solve_symbolically() {
        let dir = TempDir::new().unwrap();
        let services = QuantixServices::from_config(&config(dir.path())).unwrap();
        assert!(services.memo.is_some());
        assert!(services.knowledge.is_none());
        assert!(services.llm.is_none());

        let report = services.cascade.resolve_text("derivative of x^2").unwrap();
        assert_eq!(report.results[0].final_answer.text, "2*x");
        assert_eq!(report.results[0].source_tier, SourceTier::Symbolic);
    }

    #[test]
    fn test_feedback_is_served_from_memory() {
        let dir = TempDir::new().unwrap();
        let services = QuantixServices::from_config(&config(dir.path())).unwrap();
        services
            .record_feedback(FeedbackRequest {
                problem_text: "what is the integral of sec(x)".to_string(),
                topic: None,
                final_answer: ResolvedAnswer::plain("ln|sec(x) + tan(x)| + C"),
                solution_steps: Vec::new(),
                feedback: Feedback::Correct,
                correction: None,
            })
            .unwrap();

        let services = QuantixServices::from_config(&config(dir.path())).unwrap();
        let report = services.cascade.resolve_text("What is the integral of sec(x)?").unwrap();
        assert_eq!(report.results[0].source_tier, SourceTier::Memory);
        assert_eq!(report.results[0].final_answer.text, "ln|sec(x) + tan(x)| + C");
    }

    #[test]
    fn test_knowledge_docs_are_ingested_on_startup() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(
            docs.join("facts.md"),
            "# Euler\nWhat is the value of e^(i*pi) + 1?\nAnswer: 0\nExplanation: Euler's identity.\n",
        )
        .unwrap();

        let mut config = config(dir.path());
        config.knowledge.docs_dir = Some(docs);
        let services = QuantixServices::from_config(&config).unwrap();
        assert_eq!(services.knowledge.as_ref().map(|kb| kb.len()), Some(1));
        assert!(config.knowledge_index_path().exists());

        let report = services
            .cascade
            .resolve_text("What is the value of e^(i*pi) + 1?")
            .unwrap();
        assert_eq!(report.results[0].source_tier, SourceTier::KnowledgeBase);
        assert_eq!(report.results[0].final_answer.text, "0");
    }

    #[test]
    fn test_disabled_tiers_fall_through_to_generative() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.features = FeatureFlags::none();
        let services = QuantixServices::from_config(&config).unwrap();
        let report = services.cascade.resolve_text("derivative of x^2").unwrap();
        assert_eq!(report.results[0].source_tier, SourceTier::Llm);
    }
}
