//! End-to-end tests for the resolution cascade.
//!
//! These wire real tiers together (in-memory memo store, token-hash
//! embedder, native symbolic engine) and stub only the outer collaborators.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use quantix::embedding::FastEmbedEmbedder;
use quantix::models::{
    Feedback, FeedbackRequest, LLM_WARNING, NOT_RECOGNIZED, ProblemRecord, ResolvedAnswer,
    ScoredChunk,
};
use quantix::services::{LlmFallback, NullFallback};
use quantix::storage::InMemoryMemoStore;
use quantix::symbolic::{EngineError, Equation, Expr, Solution};
use quantix::{
    KnowledgeRetriever, LlmProvider, MemoStore, NativeEngine, ResolutionCascade, SemanticMemoCache,
    SourceTier, SymbolicDispatch, SymbolicEngine,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Retriever that counts calls and never finds anything.
#[derive(Default)]
struct SpyRetriever {
    calls: AtomicUsize,
}

impl KnowledgeRetriever for SpyRetriever {
    fn retrieve(&self, _query: &str, _top_k: usize) -> quantix::Result<Vec<ScoredChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Native engine that counts how often it is asked to parse.
#[derive(Default)]
struct CountingEngine {
    inner: NativeEngine,
    parses: AtomicUsize,
}

impl SymbolicEngine for CountingEngine {
    fn parse(&self, text: &str) -> Result<Expr, EngineError> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        self.inner.parse(text)
    }

    fn differentiate(&self, expr: &Expr, var: &str) -> Expr {
        self.inner.differentiate(expr, var)
    }

    fn simplify(&self, expr: &Expr) -> Expr {
        self.inner.simplify(expr)
    }

    fn solve_system(&self, equations: &[Equation], vars: &[String]) -> Result<Vec<Solution>, EngineError> {
        self.inner.solve_system(equations, vars)
    }

    fn to_display(&self, expr: &Expr) -> String {
        self.inner.to_display(expr)
    }

    fn to_latex(&self, expr: &Expr) -> String {
        self.inner.to_latex(expr)
    }
}

/// LLM that always replies with the same text.
struct CannedLlm(&'static str);

impl LlmProvider for CannedLlm {
    fn name(&self) -> &'static str {
        "canned"
    }

    fn complete(&self, _prompt: &str) -> quantix::Result<String> {
        Ok(self.0.to_string())
    }
}

fn memo_cache() -> Arc<SemanticMemoCache> {
    Arc::new(SemanticMemoCache::new(
        Arc::new(InMemoryMemoStore::new()),
        Arc::new(FastEmbedEmbedder::new()),
    ))
}

fn cascade_with(memo: &Arc<SemanticMemoCache>, retriever: Arc<SpyRetriever>) -> ResolutionCascade {
    ResolutionCascade::builder(Arc::new(NullFallback))
        .memory(Arc::clone(memo))
        .knowledge(retriever)
        .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
        .build()
}

fn feedback(problem: &str, answer: &str, verdict: Feedback, correction: Option<&str>) -> FeedbackRequest {
    FeedbackRequest {
        problem_text: problem.to_string(),
        topic: None,
        final_answer: ResolvedAnswer::plain(answer),
        solution_steps: vec!["apply the power rule".to_string()],
        feedback: verdict,
        correction: correction.map(ToString::to_string),
    }
}

#[test]
fn test_confirmed_answer_short_circuits_later_tiers() {
    let memo = memo_cache();
    memo.record(feedback("derivative of x^2", "2*x", Feedback::Correct, None))
        .unwrap();
    let retriever = Arc::new(SpyRetriever::default());
    let cascade = cascade_with(&memo, Arc::clone(&retriever));

    let report = cascade.resolve_text("Derivative of x^2?").unwrap();

    assert_eq!(report.total_problems, 1);
    let result = &report.results[0];
    assert_eq!(result.source_tier, SourceTier::Memory);
    assert_eq!(result.final_answer.text, "2*x");
    assert_eq!(result.steps, vec!["apply the power rule"]);
    assert!(result.warning.is_none());
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_memo_hit_never_reaches_symbolic_engine() {
    let memo = memo_cache();
    memo.record(feedback("derivative of x^2", "2*x", Feedback::Correct, None))
        .unwrap();
    let engine = Arc::new(CountingEngine::default());
    let cascade = ResolutionCascade::builder(Arc::new(NullFallback))
        .memory(Arc::clone(&memo))
        .symbolic(SymbolicDispatch::new(engine.clone()))
        .build();

    let hit = cascade.resolve_text("derivative of x^2").unwrap();
    assert_eq!(hit.results[0].source_tier, SourceTier::Memory);
    assert_eq!(engine.parses.load(Ordering::SeqCst), 0);

    let miss = cascade.resolve_text("Solve x + y = 3, x - y = 1").unwrap();
    assert_eq!(miss.results[0].source_tier, SourceTier::Symbolic);
    assert!(engine.parses.load(Ordering::SeqCst) > 0);
}

#[test]
fn test_unrelated_feedback_creates_its_own_entry() {
    let store = Arc::new(InMemoryMemoStore::new());
    let memo = Arc::new(SemanticMemoCache::new(store.clone(), Arc::new(FastEmbedEmbedder::new())));
    memo.record(feedback("derivative of x^2", "2*x", Feedback::Correct, None))
        .unwrap();
    let cascade = cascade_with(&memo, Arc::new(SpyRetriever::default()));

    let report = cascade.resolve_text("Solve x + y = 3, x - y = 1").unwrap();
    let fresh = &report.results[0];
    assert_eq!(fresh.source_tier, SourceTier::Symbolic);
    memo.record(feedback(&fresh.question, &fresh.final_answer.text, Feedback::Correct, None))
        .unwrap();

    let entries = store.load().unwrap();
    assert_eq!(entries.len(), 2);
    let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), 2);

    for (question, entry) in [("derivative of x^2", &entries[0]), ("Solve x + y = 3, x - y = 1", &entries[1])] {
        let report = cascade.resolve_text(question).unwrap();
        let result = &report.results[0];
        assert_eq!(result.source_tier, SourceTier::Memory);
        assert_eq!(result.final_answer.text, entry.final_answer.text);
        assert_eq!(result.context, vec![format!("memo:{}", entry.id)]);
    }
}

#[test]
fn test_incorrect_feedback_without_correction_is_not_served() {
    let memo = memo_cache();
    memo.record(feedback("derivative of x^2", "3*x", Feedback::Incorrect, None))
        .unwrap();
    let retriever = Arc::new(SpyRetriever::default());
    let cascade = cascade_with(&memo, Arc::clone(&retriever));

    let report = cascade.resolve_text("derivative of x^2").unwrap();

    let result = &report.results[0];
    assert_eq!(result.source_tier, SourceTier::Symbolic);
    assert_eq!(result.final_answer.text, "2*x");
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_correction_is_served_from_memory() {
    let memo = memo_cache();
    memo.record(feedback("derivative of x^2", "3*x", Feedback::Incorrect, Some("2*x")))
        .unwrap();
    let cascade = cascade_with(&memo, Arc::new(SpyRetriever::default()));

    let report = cascade.resolve_text("derivative of x^2").unwrap();

    let result = &report.results[0];
    assert_eq!(result.source_tier, SourceTier::Memory);
    assert_eq!(result.final_answer.text, "2*x");
}

#[test]
fn test_unrecognized_problem_reaches_llm_with_warning() {
    let llm: Arc<dyn LlmProvider> = Arc::new(CannedLlm("42\nstep one"));
    let cascade = ResolutionCascade::builder(Arc::new(LlmFallback::new(llm)))
        .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
        .build();

    let report = cascade.resolve_text("integrate x^2 from 0 to 1").unwrap();

    let result = &report.results[0];
    assert_eq!(result.source_tier, SourceTier::Llm);
    assert_eq!(result.final_answer.text, "42");
    assert_eq!(result.warning.as_deref(), Some(LLM_WARNING));
}

#[test]
fn test_without_llm_unrecognized_problem_is_reported() {
    let cascade = ResolutionCascade::builder(Arc::new(NullFallback))
        .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
        .build();

    let report = cascade.resolve_text("integrate x^2 from 0 to 1").unwrap();

    assert_eq!(report.results[0].final_answer.text, NOT_RECOGNIZED);
}

#[test]
fn test_symbolic_answers_across_operations() {
    let cascade = ResolutionCascade::builder(Arc::new(NullFallback))
        .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
        .build();

    let records: Vec<ProblemRecord> = [
        "differentiate 3x + 2",
        "gradient of x^2 + y^2",
        "hessian of x^2*y + y^3",
        "Solve x + y = 3, x - y = 1",
        "Find the minimum of x^2 - 4x + 1",
    ]
    .into_iter()
    .map(ProblemRecord::new)
    .collect();

    let report = cascade.resolve(&records).unwrap();

    let answers: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.final_answer.text.as_str())
        .collect();
    assert_eq!(
        answers,
        vec![
            "3",
            "[2*x, 2*y]",
            "[[2*y, 2*x], [2*x, 6*y]]",
            "x = 2, y = 1",
            "Minimum of -3 at x = 2",
        ]
    );
    assert!(
        report
            .results
            .iter()
            .all(|r| r.source_tier == SourceTier::Symbolic && r.warning.is_none())
    );
}

#[test]
fn test_results_keep_input_order_across_tiers() {
    let memo = memo_cache();
    memo.record(feedback("Solve x + y = 3, x - y = 1", "x = 2, y = 1", Feedback::Correct, None))
        .unwrap();
    let cascade = cascade_with(&memo, Arc::new(SpyRetriever::default()));

    let records = vec![
        ProblemRecord::new("integrate x^2 from 0 to 1"),
        ProblemRecord::new("Solve x + y = 3, x - y = 1"),
        ProblemRecord::new("derivative of x^2"),
    ];
    let report = cascade.resolve(&records).unwrap();

    let tiers: Vec<SourceTier> = report.results.iter().map(|r| r.source_tier).collect();
    assert_eq!(tiers, vec![SourceTier::Llm, SourceTier::Memory, SourceTier::Symbolic]);
    let questions: Vec<&str> = report.results.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(
        questions,
        vec!["integrate x^2 from 0 to 1", "Solve x + y = 3, x - y = 1", "derivative of x^2"]
    );
}

#[tokio::test]
async fn test_concurrent_resolution_matches_sequential() {
    let cascade = Arc::new(
        ResolutionCascade::builder(Arc::new(NullFallback))
            .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
            .max_concurrent(2)
            .build(),
    );
    let records: Vec<ProblemRecord> = ["derivative of x^2", "differentiate 3x + 2", "gradient of x^2 + y^2"]
        .into_iter()
        .map(ProblemRecord::new)
        .collect();

    let sequential = cascade.resolve(&records).unwrap();
    let concurrent = Arc::clone(&cascade).resolve_concurrent(records).await.unwrap();

    assert_eq!(sequential, concurrent);
}
