//! Prompts for the generative tier and the explainer.
//!
//! The solver prompt keeps the model honest about uncertainty and pins the
//! answer to the first line of the reply, which is what
//! [`crate::services::LlmFallback`] parses.

/// System prompt for the fallback solver.
pub const SOLVER_SYSTEM_PROMPT: &str = "You are a fallback mathematics solver.

STRICT RULES:
- You are used ONLY when no answer exists in the knowledge base.
- Do NOT claim the problem is from any exam or known collection.
- Do NOT hallucinate known results.
- If unsure, say you are unsure.
- Keep the final answer concise and factual.";

/// System prompt for the explainer.
pub const EXPLAINER_SYSTEM_PROMPT: &str = "You explain math solutions.

Rules:
- Do NOT recompute.
- Do NOT change answers.
- Explain the given steps clearly.
- Be concise and educational.";

/// User message asking the solver for an answer on the first line.
#[must_use]
pub fn solver_user_prompt(problem: &str) -> String {
    format!(
        "Solve the following problem carefully.

Problem:
{problem}

Instructions:
- If the solution is uncertain, state that clearly.
- Return ONLY the final answer in the first line.
- Put any working on the following lines, one step per line."
    )
}

/// User message asking for an explanation of a fixed answer. Without steps,
/// the model explains the answer from the problem alone.
#[must_use]
pub fn explainer_user_prompt(problem: &str, answer: &str, steps: &[String]) -> String {
    if steps.is_empty() {
        return format!(
            "Problem:
{problem}

Final Answer:
{answer}

Explain how this answer follows from the problem."
        );
    }
    let steps = steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Problem:
{problem}

Final Answer:
{answer}

Steps:
{steps}

Explain the reasoning behind these steps."
    )
}
