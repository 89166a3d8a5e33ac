//! Resolution cascade.
//!
//! Each sub-problem moves through the tiers in a fixed order and stops at the
//! first hit:
//!
//! ```text
//! memory ──miss──▶ knowledge base ──miss──▶ symbolic ──miss──▶ generative
//!   │                   │                      │                   │
//!  hit                 hit                    hit               always
//!   ▼                   ▼                      ▼                   ▼
//!                      ResolutionResult (one per sub-problem)
//! ```
//!
//! A tier that fails (extraction error, engine error, unreachable
//! collaborator) reports a [`TierMiss`] and the cascade moves on. The
//! generative tier cannot miss, so every sub-problem yields exactly one
//! result. The only error a caller sees is [`Error::InvalidInput`] for a
//! malformed record.

use super::dispatch::{DispatchError, SymbolicDispatch};
use super::explainer::{Explainer, render_walkthrough};
use super::fallback::GenerativeFallback;
use super::memo::SemanticMemoCache;
use super::splitter::{parse_query, parse_record};
use crate::config::{DEFAULT_KB_TOP_K, DEFAULT_MAX_CONCURRENT, FeatureFlags};
use crate::knowledge::KnowledgeRetriever;
use crate::models::{
    NOT_RECOGNIZED, ProblemRecord, ResolutionReport, ResolutionResult, ResolvedAnswer, SourceTier,
    SubProblem,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Why a tier produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierMiss {
    /// The tier ran and found nothing.
    NoMatch,
    /// The tier is switched off or not configured.
    Disabled,
    /// The tier failed; the cause is logged and otherwise swallowed.
    Failed(String),
}

impl TierMiss {
    /// Returns the miss kind as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::Disabled => "disabled",
            Self::Failed(_) => "failed",
        }
    }
}

/// The result of one tier attempt.
pub type TierOutcome = std::result::Result<ResolutionResult, TierMiss>;

/// One stage of the cascade.
pub trait Tier: Send + Sync {
    /// Tries to resolve the sub-problem.
    fn attempt(&self, problem: &SubProblem) -> TierOutcome;
}

/// Reuses confirmed answers from the memo cache.
pub struct MemoryTier {
    cache: Arc<SemanticMemoCache>,
}

impl MemoryTier {
    /// Creates the tier.
    #[must_use]
    pub const fn new(cache: Arc<SemanticMemoCache>) -> Self {
        Self { cache }
    }
}

impl Tier for MemoryTier {
    fn attempt(&self, problem: &SubProblem) -> TierOutcome {
        let hit = self
            .cache
            .lookup(&problem.text)
            .map_err(|e| TierMiss::Failed(e.to_string()))?
            .ok_or(TierMiss::NoMatch)?;

        let steps = hit.entry.solution_steps.clone();
        let walkthrough = if steps.is_empty() {
            String::new()
        } else {
            render_walkthrough(&hit.entry.problem_text, &steps, &hit.answer.text)
        };
        Ok(
            ResolutionResult::new(&problem.text, hit.answer, SourceTier::Memory, problem.route)
                .with_explanation(walkthrough)
                .with_steps(steps)
                .with_context(vec![format!("memo:{}", hit.entry.id)]),
        )
    }
}

/// Takes the answer of the best matching knowledge-base chunk.
pub struct KnowledgeTier {
    retriever: Arc<dyn KnowledgeRetriever>,
    top_k: usize,
}

impl KnowledgeTier {
    /// Creates the tier, retrieving `top_k` chunks per query.
    #[must_use]
    pub fn new(retriever: Arc<dyn KnowledgeRetriever>, top_k: usize) -> Self {
        Self {
            retriever,
            top_k: top_k.max(1),
        }
    }
}

impl Tier for KnowledgeTier {
    fn attempt(&self, problem: &SubProblem) -> TierOutcome {
        let chunks = self
            .retriever
            .retrieve(&problem.text, self.top_k)
            .map_err(|e| TierMiss::Failed(e.to_string()))?;
        let best = chunks.first().ok_or(TierMiss::NoMatch)?;

        let mut sources: Vec<String> = Vec::with_capacity(chunks.len());
        for scored in &chunks {
            if !sources.contains(&scored.chunk.source) {
                sources.push(scored.chunk.source.clone());
            }
        }

        Ok(ResolutionResult::new(
            &problem.text,
            ResolvedAnswer::plain(best.chunk.answer.clone()),
            SourceTier::KnowledgeBase,
            problem.route,
        )
        .with_explanation(best.chunk.explanation.clone().unwrap_or_default())
        .with_context(sources))
    }
}

/// Computes the answer with the symbolic dispatch table.
pub struct SymbolicTier {
    dispatch: SymbolicDispatch,
}

impl SymbolicTier {
    /// Creates the tier.
    #[must_use]
    pub const fn new(dispatch: SymbolicDispatch) -> Self {
        Self { dispatch }
    }
}

impl Tier for SymbolicTier {
    fn attempt(&self, problem: &SubProblem) -> TierOutcome {
        match self.dispatch.dispatch(problem) {
            Ok(answer) => Ok(ResolutionResult::new(
                &problem.text,
                answer.final_answer,
                SourceTier::Symbolic,
                problem.route,
            )
            .with_explanation(answer.explanation)
            .with_steps(answer.steps)),
            Err(DispatchError::Unsupported(_)) => Err(TierMiss::NoMatch),
            Err(err) => Err(TierMiss::Failed(err.to_string())),
        }
    }
}

/// Asks the generative fallback. Never misses.
pub struct GenerativeTier {
    fallback: Arc<dyn GenerativeFallback>,
}

impl GenerativeTier {
    /// Creates the tier.
    #[must_use]
    pub fn new(fallback: Arc<dyn GenerativeFallback>) -> Self {
        Self { fallback }
    }

    /// Resolves the sub-problem; a fallback error yields the standard
    /// "unable to determine" answer.
    pub fn resolve(&self, problem: &SubProblem) -> ResolutionResult {
        let (answer, steps) = match self.fallback.solve(&problem.text) {
            Ok(solution) => (ResolvedAnswer::plain(solution.final_answer), solution.steps),
            Err(err) => {
                tracing::warn!(
                    fallback = self.fallback.name(),
                    error = %err,
                    "Generative fallback failed"
                );
                (ResolvedAnswer::unable(), Vec::new())
            },
        };
        ResolutionResult::new(&problem.text, answer, SourceTier::Llm, problem.route).with_steps(steps)
    }
}

impl Tier for GenerativeTier {
    fn attempt(&self, problem: &SubProblem) -> TierOutcome {
        Ok(self.resolve(problem))
    }
}

/// Runs sub-problems through the tiers.
pub struct ResolutionCascade {
    memory: Option<Box<dyn Tier>>,
    knowledge: Option<Box<dyn Tier>>,
    symbolic: Option<Box<dyn Tier>>,
    generative: GenerativeTier,
    explainer: Option<Explainer>,
    max_concurrent: usize,
}

impl ResolutionCascade {
    /// Starts building a cascade whose last tier is `fallback`.
    #[must_use]
    pub fn builder(fallback: Arc<dyn GenerativeFallback>) -> ResolutionCascadeBuilder {
        ResolutionCascadeBuilder::new(fallback)
    }

    /// Validates and resolves records, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any record has blank text or an
    /// unknown operation. Nothing is resolved in that case.
    #[instrument(skip(self, records), fields(operation = "resolve", records = records.len()))]
    pub fn resolve(&self, records: &[ProblemRecord]) -> Result<ResolutionReport> {
        let problems = records.iter().map(parse_record).collect::<Result<Vec<_>>>()?;
        Ok(self.resolve_sub_problems(&problems))
    }

    /// Splits raw text into sub-problems and resolves them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text contains no sub-problem.
    #[instrument(skip(self, raw), fields(operation = "resolve_text", raw_len = raw.len()))]
    pub fn resolve_text(&self, raw: &str) -> Result<ResolutionReport> {
        let problems = parse_query(raw);
        if problems.is_empty() {
            return Err(Error::InvalidInput("no sub-problems found in query".to_string()));
        }
        Ok(self.resolve_sub_problems(&problems))
    }

    /// Resolves already parsed sub-problems, in order.
    #[must_use]
    pub fn resolve_sub_problems(&self, problems: &[SubProblem]) -> ResolutionReport {
        ResolutionReport::from_results(problems.iter().map(|p| self.resolve_problem(p)).collect())
    }

    /// Resolves records on blocking worker threads, at most
    /// `max_concurrent` at a time. Output order matches input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any record is malformed.
    #[instrument(skip(self, records), fields(operation = "resolve_concurrent", records = records.len()))]
    pub async fn resolve_concurrent(self: Arc<Self>, records: Vec<ProblemRecord>) -> Result<ResolutionReport> {
        let problems = records.iter().map(parse_record).collect::<Result<Vec<_>>>()?;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));

        let mut pending = Vec::with_capacity(problems.len());
        for problem in problems {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::operation("acquire_cascade_permit", e))?;
            let question = problem.text.clone();
            let route = problem.route;
            let cascade = Arc::clone(&self);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                cascade.resolve_problem(&problem)
            });
            pending.push((question, route, handle));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (question, route, handle) in pending {
            let result = handle.await.unwrap_or_else(|err| {
                tracing::error!(error = %err, "Resolution worker panicked");
                ResolutionResult::new(question, ResolvedAnswer::plain(NOT_RECOGNIZED), SourceTier::Llm, route)
            });
            results.push(result);
        }
        Ok(ResolutionReport::from_results(results))
    }

    /// Resolves one sub-problem. Always returns a result.
    #[instrument(skip(self, problem), fields(operation = "resolve_problem", route = %problem.route))]
    pub fn resolve_problem(&self, problem: &SubProblem) -> ResolutionResult {
        let start = Instant::now();
        if problem.needs_clarification {
            tracing::debug!(text = %problem.text, "Sub-problem may need clarification");
        }

        let tiers = [
            (SourceTier::Memory, &self.memory),
            (SourceTier::KnowledgeBase, &self.knowledge),
            (SourceTier::Symbolic, &self.symbolic),
        ];
        let mut resolved = None;
        for (source, slot) in tiers {
            let outcome = slot
                .as_ref()
                .map_or(Err(TierMiss::Disabled), |tier| tier.attempt(problem));
            match outcome {
                Ok(result) => {
                    record_tier(source, "hit");
                    resolved = Some(result);
                    break;
                },
                Err(miss) => {
                    record_tier(source, miss.as_str());
                    if let TierMiss::Failed(cause) = &miss {
                        tracing::debug!(tier = %source, %cause, "Tier failed, falling through");
                    }
                },
            }
        }

        let result = resolved.unwrap_or_else(|| {
            record_tier(SourceTier::Llm, "hit");
            self.generative.resolve(problem)
        });
        let result = self.explain(result);

        metrics::histogram!("cascade_resolve_duration_ms", "tier" => result.source_tier.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(tier = %result.source_tier, "Sub-problem resolved");
        result
    }

    /// Fills a missing explanation for verified results.
    fn explain(&self, result: ResolutionResult) -> ResolutionResult {
        let Some(explainer) = &self.explainer else {
            return result;
        };
        if result.explanation.is_some() || !result.source_tier.is_verified() {
            return result;
        }
        match explainer.explain(&result.question, &result.final_answer.text, &result.steps) {
            Ok(explanation) => result.with_explanation(explanation),
            Err(err) => {
                tracing::warn!(error = %err, "Explanation failed, keeping result unexplained");
                result
            },
        }
    }
}

fn record_tier(tier: SourceTier, outcome: &'static str) {
    metrics::counter!(
        "cascade_tier_total",
        "tier" => tier.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Assembles a [`ResolutionCascade`]. Tier order is fixed regardless of the
/// order the builder methods are called in.
pub struct ResolutionCascadeBuilder {
    memory: Option<Box<dyn Tier>>,
    knowledge: Option<Box<dyn Tier>>,
    symbolic: Option<Box<dyn Tier>>,
    fallback: Arc<dyn GenerativeFallback>,
    explainer: Option<Explainer>,
    features: FeatureFlags,
    max_concurrent: usize,
}

impl ResolutionCascadeBuilder {
    fn new(fallback: Arc<dyn GenerativeFallback>) -> Self {
        Self {
            memory: None,
            knowledge: None,
            symbolic: None,
            fallback,
            explainer: None,
            features: FeatureFlags::default(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Adds the memory tier.
    #[must_use]
    pub fn memory(mut self, cache: Arc<SemanticMemoCache>) -> Self {
        self.memory = Some(Box::new(MemoryTier::new(cache)));
        self
    }

    /// Adds the knowledge-base tier with the default `top_k`.
    #[must_use]
    pub fn knowledge(self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.knowledge_with_top_k(retriever, DEFAULT_KB_TOP_K)
    }

    /// Adds the knowledge-base tier.
    #[must_use]
    pub fn knowledge_with_top_k(mut self, retriever: Arc<dyn KnowledgeRetriever>, top_k: usize) -> Self {
        self.knowledge = Some(Box::new(KnowledgeTier::new(retriever, top_k)));
        self
    }

    /// Adds the symbolic tier.
    #[must_use]
    pub fn symbolic(mut self, dispatch: SymbolicDispatch) -> Self {
        self.symbolic = Some(Box::new(SymbolicTier::new(dispatch)));
        self
    }

    /// Adds an explainer for results that lack an explanation.
    #[must_use]
    pub fn explainer(mut self, explainer: Explainer) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Sets which tiers may run.
    #[must_use]
    pub const fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Sets the worker limit for [`ResolutionCascade::resolve_concurrent`].
    #[must_use]
    pub const fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Builds the cascade, dropping tiers the feature flags switch off.
    #[must_use]
    pub fn build(self) -> ResolutionCascade {
        let features = self.features;
        ResolutionCascade {
            memory: self.memory.filter(|_| features.memory_tier),
            knowledge: self.knowledge.filter(|_| features.knowledge_tier),
            symbolic: self.symbolic.filter(|_| features.symbolic_tier),
            generative: GenerativeTier::new(self.fallback),
            explainer: self.explainer.filter(|_| features.explainer),
            max_concurrent: self.max_concurrent,
        }
    }
}
