//! Answer and result types.

use super::Route;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Substituted for an empty answer.
pub const UNABLE_TO_DETERMINE: &str = "Unable to determine the answer.";

/// Answer given when no tier recognised the problem.
pub const NOT_RECOGNIZED: &str = "Problem type not recognized or uncertain.";

/// Attached to every result produced by the generative fallback.
pub const LLM_WARNING: &str =
    "This answer was generated by a language model and has not been verified.";

/// A final answer in plain and typeset form. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawAnswer")]
pub struct ResolvedAnswer {
    /// Plain-text answer.
    pub text: String,
    /// LaTeX rendering, possibly empty.
    pub latex: String,
}

#[derive(Deserialize)]
struct RawAnswer {
    #[serde(default)]
    text: String,
    #[serde(default)]
    latex: String,
}

impl From<RawAnswer> for ResolvedAnswer {
    fn from(raw: RawAnswer) -> Self {
        Self::new(raw.text, raw.latex)
    }
}

impl ResolvedAnswer {
    /// Creates an answer; blank text becomes [`UNABLE_TO_DETERMINE`].
    #[must_use]
    pub fn new(text: impl Into<String>, latex: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.trim().is_empty() {
            UNABLE_TO_DETERMINE.to_string()
        } else {
            text.trim().to_string()
        };
        Self {
            text,
            latex: latex.into(),
        }
    }

    /// An answer with no LaTeX form.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, "")
    }

    /// The [`UNABLE_TO_DETERMINE`] answer.
    #[must_use]
    pub fn unable() -> Self {
        Self::plain(UNABLE_TO_DETERMINE)
    }
}

impl fmt::Display for ResolvedAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Which cascade tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    /// Reused from the memo cache.
    Memory,
    /// Taken from the curated knowledge base.
    KnowledgeBase,
    /// Computed by the symbolic engine.
    Symbolic,
    /// Generated by a language model.
    Llm,
}

impl SourceTier {
    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::KnowledgeBase => "knowledge_base",
            Self::Symbolic => "symbolic",
            Self::Llm => "llm",
        }
    }

    /// Whether results from this tier are treated as authoritative.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        !matches!(self, Self::Llm)
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The answer to one sub-problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The sub-problem text.
    pub question: String,
    /// The answer.
    pub final_answer: ResolvedAnswer,
    /// Supporting explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Ordered solution steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<String>,
    /// Sources consulted (knowledge-base files, memo entry ids).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// The tier that produced the answer.
    pub source_tier: SourceTier,
    /// The route assigned to the sub-problem.
    pub route: Route,
    /// Present on unverified results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ResolutionResult {
    /// Creates a result. Generative results always carry [`LLM_WARNING`].
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        final_answer: ResolvedAnswer,
        source_tier: SourceTier,
        route: Route,
    ) -> Self {
        let warning = (!source_tier.is_verified()).then(|| LLM_WARNING.to_string());
        Self {
            question: question.into(),
            final_answer,
            explanation: None,
            steps: Vec::new(),
            context: Vec::new(),
            source_tier,
            route,
            warning,
        }
    }

    /// Sets the explanation; blank text leaves it unset.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        if !explanation.trim().is_empty() {
            self.explanation = Some(explanation);
        }
        self
    }

    /// Sets the solution steps.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the consulted sources.
    #[must_use]
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }
}

/// Aggregated results, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Number of sub-problems resolved.
    pub total_problems: usize,
    /// One result per sub-problem.
    pub results: Vec<ResolutionResult>,
}

impl ResolutionReport {
    /// Wraps results, counting them.
    #[must_use]
    pub fn from_results(results: Vec<ResolutionResult>) -> Self {
        Self {
            total_problems: results.len(),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_answer_replaced() {
        assert_eq!(ResolvedAnswer::plain("").text, UNABLE_TO_DETERMINE);
        assert_eq!(ResolvedAnswer::plain("   ").text, UNABLE_TO_DETERMINE);
        assert_eq!(ResolvedAnswer::plain(" 2*x ").text, "2*x");
    }

    #[test]
    fn test_deserialized_empty_answer_replaced() {
        let answer: ResolvedAnswer = serde_json::from_str(r#"{"text": "", "latex": ""}"#).unwrap();
        assert_eq!(answer.text, UNABLE_TO_DETERMINE);
    }

    #[test]
    fn test_source_tier_serialization() {
        let names: Vec<String> = [
            SourceTier::Memory,
            SourceTier::KnowledgeBase,
            SourceTier::Symbolic,
            SourceTier::Llm,
        ]
        .iter()
        .map(|t| serde_json::to_string(t).unwrap())
        .collect();
        assert_eq!(
            names,
            vec!["\"memory\"", "\"knowledge_base\"", "\"symbolic\"", "\"llm\""]
        );
    }

    #[test]
    fn test_llm_results_carry_warning() {
        let result = ResolutionResult::new("q", ResolvedAnswer::unable(), SourceTier::Llm, Route::Unsupported);
        assert_eq!(result.warning.as_deref(), Some(LLM_WARNING));

        let result = ResolutionResult::new("q", ResolvedAnswer::plain("3"), SourceTier::Symbolic, Route::Gradient);
        assert!(result.warning.is_none());
    }

    #[test]
    fn test_report_counts_results() {
        let report = ResolutionReport::from_results(vec![
            ResolutionResult::new("a", ResolvedAnswer::plain("1"), SourceTier::Memory, Route::Derivative),
        ]);
        assert_eq!(report.total_problems, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["source_tier"], "memory");
        assert!(json["results"][0].get("warning").is_none());
    }
}
