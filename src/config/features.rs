//! Feature flags for optional tiers.

use serde::Serialize;

/// Switches for the optional cascade stages.
///
/// The generative tier has no switch: it always runs last, possibly as a
/// fallback that only reports "not recognized".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    /// Reuse confirmed answers from the memo cache.
    pub memory_tier: bool,
    /// Consult the curated knowledge base.
    pub knowledge_tier: bool,
    /// Compute answers symbolically.
    pub symbolic_tier: bool,
    /// Ask the LLM to explain verified answers that lack an explanation.
    pub explainer: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::core()
    }
}

impl FeatureFlags {
    /// All optional stages disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            memory_tier: false,
            knowledge_tier: false,
            symbolic_tier: false,
            explainer: false,
        }
    }

    /// All tiers enabled, explainer off.
    #[must_use]
    pub const fn core() -> Self {
        Self {
            memory_tier: true,
            knowledge_tier: true,
            symbolic_tier: true,
            explainer: false,
        }
    }

    /// Everything enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            memory_tier: true,
            knowledge_tier: true,
            symbolic_tier: true,
            explainer: true,
        }
    }

    /// Applies `QUANTIX_FEATURE_*` overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        let flags = [
            ("QUANTIX_FEATURE_MEMORY", &mut self.memory_tier),
            ("QUANTIX_FEATURE_KNOWLEDGE", &mut self.knowledge_tier),
            ("QUANTIX_FEATURE_SYMBOLIC", &mut self.symbolic_tier),
            ("QUANTIX_FEATURE_EXPLAINER", &mut self.explainer),
        ];
        for (name, flag) in flags {
            if let Some(value) = super::env_parse::<bool>(name) {
                *flag = value;
            }
        }
        self
    }
}
