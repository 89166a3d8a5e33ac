//! Explanations for resolved answers.

use crate::llm::{EXPLAINER_SYSTEM_PROMPT, LlmProvider, explainer_user_prompt};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Renders a numbered walkthrough:
///
/// ```text
/// Problem: derivative of x^2
///
/// Step 1: Differentiate x^2 with respect to x
///
/// Final Answer: 2*x
/// ```
#[must_use]
pub fn render_walkthrough(problem: &str, steps: &[String], answer: &str) -> String {
    let mut lines = vec![format!("Problem: {problem}\n")];
    lines.extend(
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("Step {}: {step}", i + 1)),
    );
    lines.push(format!("\nFinal Answer: {answer}"));
    lines.join("\n")
}

/// Asks an LLM to explain an answer without recomputing it.
pub struct Explainer {
    llm: Arc<dyn LlmProvider>,
}

impl Explainer {
    /// Creates an explainer over `llm`.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Explains how `steps` lead to `answer`. With no steps, the answer is
    /// explained from the problem alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails or replies with nothing.
    #[instrument(skip_all, fields(operation = "explain", provider = self.llm.name()))]
    pub fn explain(&self, problem: &str, answer: &str, steps: &[String]) -> Result<String> {
        let reply = self.llm.complete_with_system(
            EXPLAINER_SYSTEM_PROMPT,
            &explainer_user_prompt(problem, answer, steps),
        )?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::upstream(self.llm.name(), "empty explanation"));
        }
        Ok(reply.to_string())
    }
}
