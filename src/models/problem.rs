//! Problem types: operations, topics, routes and sub-problems.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Normalized text shorter than this is flagged for clarification.
pub const CLARIFICATION_THRESHOLD: usize = 10;

/// A mathematical operation detected in problem text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Ordinary or partial derivative.
    Derivative,
    /// Vector of first partials.
    Gradient,
    /// Matrix of first partials of a vector function.
    Jacobian,
    /// Matrix of second partials.
    Hessian,
    /// Simultaneous equations.
    System,
    /// Extremum of a function.
    Optimization,
}

impl Operation {
    /// Returns all operation variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Derivative,
            Self::Gradient,
            Self::Jacobian,
            Self::Hessian,
            Self::System,
            Self::Optimization,
        ]
    }

    /// Returns the operation as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Derivative => "derivative",
            Self::Gradient => "gradient",
            Self::Jacobian => "jacobian",
            Self::Hessian => "hessian",
            Self::System => "system",
            Self::Optimization => "optimization",
        }
    }

    /// Parses an operation name, accepting common aliases.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "derivative" | "differentiate" | "differentiation" => Some(Self::Derivative),
            "gradient" | "grad" => Some(Self::Gradient),
            "jacobian" => Some(Self::Jacobian),
            "hessian" => Some(Self::Hessian),
            "system" | "system_of_equations" | "simultaneous" => Some(Self::System),
            "optimization" | "optimisation" | "optimize" | "optimise" => Some(Self::Optimization),
            _ => None,
        }
    }

    /// The topic an operation belongs to.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::Jacobian | Self::System => Topic::LinearAlgebra,
            Self::Derivative | Self::Gradient | Self::Hessian | Self::Optimization => {
                Topic::Calculus
            },
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad subject area of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Derivatives, gradients, limits, integrals.
    Calculus,
    /// Matrices and systems.
    LinearAlgebra,
    /// Equations and manipulation.
    Algebra,
    /// Nothing recognised.
    #[default]
    Unknown,
}

impl Topic {
    /// Returns the topic as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Calculus => "calculus",
            Self::LinearAlgebra => "linear_algebra",
            Self::Algebra => "algebra",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a topic name. Unrecognised names map to `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "calculus" => Some(Self::Calculus),
            "linear_algebra" | "linalg" => Some(Self::LinearAlgebra),
            "algebra" => Some(Self::Algebra),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Selects the symbolic handler for a sub-problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Differentiate and simplify.
    Derivative,
    /// Partials over every free variable.
    Gradient,
    /// Partials of each listed component.
    Jacobian,
    /// Second partials.
    Hessian,
    /// Solve equations simultaneously.
    System,
    /// Critical points and extremum.
    Optimization,
    /// No symbolic handler applies.
    #[default]
    Unsupported,
}

impl Route {
    /// Maps an operation to its route; no operation is unsupported.
    #[must_use]
    pub const fn from_operation(operation: Option<Operation>) -> Self {
        match operation {
            Some(Operation::Derivative) => Self::Derivative,
            Some(Operation::Gradient) => Self::Gradient,
            Some(Operation::Jacobian) => Self::Jacobian,
            Some(Operation::Hessian) => Self::Hessian,
            Some(Operation::System) => Self::System,
            Some(Operation::Optimization) => Self::Optimization,
            None => Self::Unsupported,
        }
    }

    /// Returns the route as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Derivative => "derivative",
            Self::Gradient => "gradient",
            Self::Jacobian => "jacobian",
            Self::Hessian => "hessian",
            Self::System => "system",
            Self::Optimization => "optimization",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One atomic question, owned by the cascade for a single resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProblem {
    /// Normalized question text.
    pub text: String,
    /// Detected operation, if any.
    pub operation: Option<Operation>,
    /// Subject area.
    pub topic: Topic,
    /// Single-letter variables mentioned, sorted.
    pub variables: BTreeSet<String>,
    /// Handler selected by the router.
    pub route: Route,
    /// Set when the text is too short to interpret confidently.
    pub needs_clarification: bool,
}

impl SubProblem {
    /// Creates a sub-problem, deriving the route from the operation.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        operation: Option<Operation>,
        topic: Topic,
        variables: BTreeSet<String>,
    ) -> Self {
        let text = text.into();
        let needs_clarification = text.trim().chars().count() < CLARIFICATION_THRESHOLD;
        Self {
            text,
            operation,
            topic,
            variables,
            route: Route::from_operation(operation),
            needs_clarification,
        }
    }
}

/// A problem as submitted to [`resolve`](crate::services::ResolutionCascade::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProblemRecord {
    /// The question text.
    pub problem_text: String,
    /// Operation hint overriding detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Topic hint overriding detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl ProblemRecord {
    /// Creates a record with no hints.
    #[must_use]
    pub fn new(problem_text: impl Into<String>) -> Self {
        Self {
            problem_text: problem_text.into(),
            operation: None,
            topic: None,
        }
    }

    /// Sets the operation hint.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the topic hint.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}
