//! # Quantix
//!
//! Tiered resolution of free-form mathematical questions.
//!
//! A query is split into atomic sub-problems, each sub-problem is routed by
//! intent, and a fixed cascade of strategies tries to answer it, cheapest
//! first:
//!
//! 1. **Memory**: reuse a previously verified answer for a semantically
//!    similar question.
//! 2. **Knowledge base**: take the answer of the best matching curated chunk.
//! 3. **Symbolic**: compute the answer with the symbolic engine.
//! 4. **LLM**: ask a generative model, clearly labelled as unverified.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quantix::config::QuantixConfig;
//! use quantix::services::QuantixServices;
//!
//! let services = QuantixServices::from_config(&QuantixConfig::load_default())?;
//! let report = services.cascade.resolve_text("Find the derivative of x^2")?;
//! assert_eq!(report.results[0].final_answer.text, "2*x");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod bulkhead;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod knowledge;
pub mod llm;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod symbolic;

pub use config::{FeatureFlags, QuantixConfig};
pub use embedding::Embedder;
pub use knowledge::KnowledgeRetriever;
pub use llm::LlmProvider;
pub use models::{
    Feedback, FeedbackRequest, MemoEntry, Operation, ProblemRecord, ResolutionReport,
    ResolutionResult, ResolvedAnswer, Route, SourceTier, SubProblem, Topic,
};
pub use services::{
    GenerativeFallback, QuantixServices, ResolutionCascade, SemanticMemoCache, SymbolicDispatch,
    classify_route, split_into_sub_problems,
};
pub use storage::MemoStore;
pub use symbolic::{NativeEngine, SymbolicEngine};

/// Error type for quantix operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Blank problem text, unknown operation name, malformed feedback |
/// | `OperationFailed` | I/O errors, store or index failures, configuration parse errors |
/// | `Upstream` | Embedding service, knowledge retriever or LLM unreachable or timed out |
/// | `FeatureNotEnabled` | Using features requiring compile-time flags |
///
/// Inside the cascade every variant except `InvalidInput` is demoted to a tier
/// miss; `InvalidInput` is the only error a caller of `resolve` can observe.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An external collaborator was unavailable.
    #[error("upstream '{service}' unavailable: {cause}")]
    Upstream {
        /// The collaborator that failed.
        service: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from anything displayable.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::Upstream`] from anything displayable.
    pub fn upstream(service: &str, cause: impl std::fmt::Display) -> Self {
        Self::Upstream {
            service: service.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for quantix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("blank problem".to_string());
        assert_eq!(err.to_string(), "invalid input: blank problem");

        let err = Error::operation("append_memo", "disk full");
        assert_eq!(err.to_string(), "operation 'append_memo' failed: disk full");

        let err = Error::upstream("embedding", "timed out");
        assert_eq!(err.to_string(), "upstream 'embedding' unavailable: timed out");
    }

    #[test]
    fn test_current_timestamp_is_positive() {
        assert!(current_timestamp() > 0);
    }
}
