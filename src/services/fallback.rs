//! Generative fallback: the last tier of the cascade.

use crate::Result;
use crate::llm::{LlmProvider, SOLVER_SYSTEM_PROMPT, solver_user_prompt};
use crate::models::NOT_RECOGNIZED;
use std::sync::Arc;
use tracing::instrument;

/// An unverified solution from a generative model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GeneratedSolution {
    /// The answer line. May be empty; the cascade substitutes a failure string.
    pub final_answer: String,
    /// Supporting steps, in order.
    pub steps: Vec<String>,
}

/// Produces an answer for any problem, without guarantees.
pub trait GenerativeFallback: Send + Sync {
    /// The fallback name, for logs.
    fn name(&self) -> &'static str;

    /// Solves the problem.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unreachable or times out.
    fn solve(&self, problem_text: &str) -> Result<GeneratedSolution>;
}

/// Asks an [`LlmProvider`] to solve the problem.
///
/// The first non-empty line of the reply is the answer; remaining non-empty
/// lines are steps.
pub struct LlmFallback {
    llm: Arc<dyn LlmProvider>,
}

impl LlmFallback {
    /// Creates a fallback over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

impl GenerativeFallback for LlmFallback {
    fn name(&self) -> &'static str {
        self.llm.name()
    }

    #[instrument(skip(self, problem_text), fields(operation = "llm_fallback", provider = self.llm.name()))]
    fn solve(&self, problem_text: &str) -> Result<GeneratedSolution> {
        let reply = self
            .llm
            .complete_with_system(SOLVER_SYSTEM_PROMPT, &solver_user_prompt(problem_text))?;
        Ok(parse_reply(&reply))
    }
}

/// Splits a model reply into answer and steps.
fn parse_reply(reply: &str) -> GeneratedSolution {
    let mut lines = reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"));

    let final_answer = lines.next().map(strip_answer_label).unwrap_or_default();
    GeneratedSolution {
        final_answer,
        steps: lines.map(ToString::to_string).collect(),
    }
}

fn strip_answer_label(line: &str) -> String {
    for label in ["final answer:", "answer:"] {
        if line.get(..label.len()).is_some_and(|p| p.eq_ignore_ascii_case(label)) {
            return line[label.len()..].trim().to_string();
        }
    }
    line.to_string()
}

/// Fallback used when no model is configured: every problem is unrecognised.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFallback;

impl GenerativeFallback for NullFallback {
    fn name(&self) -> &'static str {
        "none"
    }

    fn solve(&self, _problem_text: &str) -> Result<GeneratedSolution> {
        Ok(GeneratedSolution {
            final_answer: NOT_RECOGNIZED.to_string(),
            steps: Vec::new(),
        })
    }
}
