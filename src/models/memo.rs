//! Memo cache entries and feedback.

use super::{ResolvedAnswer, Topic};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user's verdict on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// The answer was right.
    Correct,
    /// The answer was wrong.
    Incorrect,
}

impl Feedback {
    /// Returns the feedback as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
        }
    }

    /// Parses `correct` or `incorrect`, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            _ => None,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored (problem, solution) pair. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoEntry {
    /// Unique identifier (UUID v7, so ids sort by creation).
    pub id: String,
    /// Creation time (Unix epoch seconds).
    pub created_at: u64,
    /// Embedding of `problem_text`.
    pub embedding: Vec<f32>,
    /// The problem as asked.
    pub problem_text: String,
    /// Subject area.
    #[serde(default)]
    pub topic: Topic,
    /// Ordered solution steps.
    #[serde(default)]
    pub solution_steps: Vec<String>,
    /// The answer that was given.
    pub final_answer: ResolvedAnswer,
    /// The user's verdict on `final_answer`.
    pub feedback: Feedback,
    /// The right answer, when `feedback` is incorrect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

impl MemoEntry {
    /// The answer this entry may serve: the original when confirmed, the
    /// correction when rejected with one, otherwise nothing.
    #[must_use]
    pub fn servable_answer(&self) -> Option<ResolvedAnswer> {
        match (self.feedback, &self.correction) {
            (Feedback::Correct, _) => Some(self.final_answer.clone()),
            (Feedback::Incorrect, Some(correction)) if !correction.trim().is_empty() => {
                Some(ResolvedAnswer::plain(correction.clone()))
            },
            (Feedback::Incorrect, _) => None,
        }
    }
}

/// Input to the feedback path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// The problem as asked.
    pub problem_text: String,
    /// Subject area; detected from the text when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    /// The answer that was given.
    pub final_answer: ResolvedAnswer,
    /// Ordered solution steps.
    #[serde(default)]
    pub solution_steps: Vec<String>,
    /// The verdict.
    pub feedback: Feedback,
    /// The right answer, for incorrect feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(feedback: Feedback, correction: Option<&str>) -> MemoEntry {
        MemoEntry {
            id: "id".to_string(),
            created_at: 0,
            embedding: vec![1.0],
            problem_text: "derivative of x^2".to_string(),
            topic: Topic::Calculus,
            solution_steps: Vec::new(),
            final_answer: ResolvedAnswer::plain("2*x"),
            feedback,
            correction: correction.map(ToString::to_string),
        }
    }

    #[test]
    fn test_servable_answer() {
        assert_eq!(entry(Feedback::Correct, None).servable_answer().unwrap().text, "2*x");
        assert_eq!(
            entry(Feedback::Incorrect, Some("2x")).servable_answer().unwrap().text,
            "2x"
        );
        assert!(entry(Feedback::Incorrect, None).servable_answer().is_none());
        assert!(entry(Feedback::Incorrect, Some(" ")).servable_answer().is_none());
    }

    #[test]
    fn test_feedback_parse() {
        assert_eq!(Feedback::parse("Correct"), Some(Feedback::Correct));
        assert_eq!(Feedback::parse("incorrect"), Some(Feedback::Incorrect));
        assert_eq!(Feedback::parse("maybe"), None);
    }
}
