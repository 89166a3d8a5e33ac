//! Resolution services.
//!
//! Query text flows splitter → router → cascade. The cascade tries the memo
//! cache, the knowledge base, symbolic dispatch and finally the generative
//! fallback; [`QuantixServices`] wires them from configuration.

mod cascade;
mod container;
mod dispatch;
mod explainer;
mod fallback;
mod memo;
pub mod patterns;
mod router;
mod splitter;

pub use cascade::{
    GenerativeTier, KnowledgeTier, MemoryTier, ResolutionCascade, ResolutionCascadeBuilder,
    SymbolicTier, Tier, TierMiss, TierOutcome,
};
pub use container::QuantixServices;
pub use dispatch::{DispatchError, SymbolicAnswer, SymbolicDispatch};
pub use explainer::{Explainer, render_walkthrough};
pub use fallback::{GeneratedSolution, GenerativeFallback, LlmFallback, NullFallback};
pub use memo::{MemoHit, SemanticMemoCache};
pub use router::classify_route;
pub use splitter::{
    detect_operation, detect_topic, detect_variables, normalize, parse_problem, parse_query,
    parse_record, split_into_sub_problems,
};
