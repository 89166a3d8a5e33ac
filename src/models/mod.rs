//! Data models for quantix.
//!
//! This module contains all the core data structures used throughout the system.

mod answer;
mod knowledge;
mod memo;
mod problem;

pub use answer::{
    LLM_WARNING, NOT_RECOGNIZED, ResolutionReport, ResolutionResult, ResolvedAnswer, SourceTier,
    UNABLE_TO_DETERMINE,
};
pub use knowledge::{KbChunk, ScoredChunk};
pub use memo::{Feedback, FeedbackRequest, MemoEntry};
pub use problem::{CLARIFICATION_THRESHOLD, Operation, ProblemRecord, Route, SubProblem, Topic};
