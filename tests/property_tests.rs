//! Property-based tests for query splitting and resolution.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Splitting is idempotent
//! - Fragments are trimmed and never blank
//! - Every sub-problem gets exactly one non-empty answer
//! - Memo similarity ignores case

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use quantix::embedding::{FastEmbedEmbedder, cosine_similarity};
use quantix::models::ProblemRecord;
use quantix::services::NullFallback;
use quantix::{Embedder, NativeEngine, ResolutionCascade, SourceTier, SymbolicDispatch, split_into_sub_problems};
use std::sync::Arc;

fn symbolic_cascade() -> ResolutionCascade {
    ResolutionCascade::builder(Arc::new(NullFallback))
        .symbolic(SymbolicDispatch::new(Arc::new(NativeEngine)))
        .build()
}

/// A small polynomial in `x`, such as `3x^2 + 5`.
fn polynomial() -> impl Strategy<Value = String> {
    (1u32..10, 1u32..5, 0u32..10).prop_map(|(a, n, b)| format!("{a}x^{n} + {b}"))
}

/// A question the symbolic tier recognizes.
fn derivative_question() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["derivative of", "Find the derivative of", "differentiate"]),
        polynomial(),
    )
        .prop_map(|(verb, poly)| format!("{verb} {poly}"))
}

/// Any question, recognized or not.
fn any_question() -> impl Strategy<Value = String> {
    prop_oneof![
        derivative_question(),
        "[a-z]{3,12}( [a-z]{2,10}){0,3}",
        polynomial().prop_map(|p| format!("integrate {p} from 0 to 1")),
    ]
}

proptest! {
    /// Property: every fragment splits to exactly itself.
    #[test]
    fn prop_split_is_idempotent(text in "[a-zA-Z0-9 .?!;^+=*\n-]{0,120}") {
        for fragment in split_into_sub_problems(&text) {
            prop_assert_eq!(split_into_sub_problems(&fragment), vec![fragment.clone()]);
        }
    }

    /// Property: fragments are trimmed and at least three characters long.
    #[test]
    fn prop_fragments_are_trimmed(text in "[a-zA-Z0-9 .?!;\t\r\n]{0,120}") {
        for fragment in split_into_sub_problems(&text) {
            prop_assert_eq!(fragment.trim(), fragment.as_str());
            prop_assert!(fragment.chars().count() >= 3);
            prop_assert!(!fragment.contains('\n'));
        }
    }

    /// Property: joining questions with sentence breaks splits them back apart.
    #[test]
    fn prop_split_recovers_joined_questions(questions in prop::collection::vec(derivative_question(), 1..5)) {
        let capitalized: Vec<String> = questions
            .iter()
            .map(|q| {
                let mut chars = q.chars();
                chars.next().map_or_else(String::new, |c| c.to_uppercase().chain(chars).collect())
            })
            .collect();
        let text = capitalized.join(".\n");
        prop_assert_eq!(split_into_sub_problems(&text).len(), questions.len());
    }

    /// Property: the report has one non-empty answer per record, in order.
    #[test]
    fn prop_one_answer_per_record(questions in prop::collection::vec(any_question(), 1..6)) {
        let records: Vec<ProblemRecord> = questions.iter().map(ProblemRecord::new).collect();
        let report = symbolic_cascade().resolve(&records).unwrap();

        prop_assert_eq!(report.total_problems, records.len());
        prop_assert_eq!(report.results.len(), records.len());
        for (result, question) in report.results.iter().zip(&questions) {
            prop_assert!(!result.final_answer.text.trim().is_empty());
            prop_assert_eq!(result.question.as_str(), question.trim());
            prop_assert_eq!(result.warning.is_some(), result.source_tier == SourceTier::Llm);
        }
    }

    /// Property: recognized derivatives never reach the generative tier.
    #[test]
    fn prop_derivatives_are_symbolic(question in derivative_question()) {
        let report = symbolic_cascade().resolve_text(&question).unwrap();
        prop_assert_eq!(report.results[0].source_tier, SourceTier::Symbolic);
    }

    /// Property: case does not change the memo embedding.
    #[test]
    fn prop_embedding_ignores_case(question in derivative_question()) {
        let embedder = FastEmbedEmbedder::new();
        let lower = embedder.embed(&question.to_lowercase()).unwrap();
        let upper = embedder.embed(&question.to_uppercase()).unwrap();
        prop_assert!(cosine_similarity(&lower, &upper) > 0.999);
    }
}
