//! Operation, topic and sentence-boundary patterns.
//!
//! Static pattern data for keyword-based intent detection, kept apart from
//! the splitter so the heuristics can be extended without touching it.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::{Operation, Topic};
use regex::Regex;
use std::sync::LazyLock;

/// A keyword pattern indicating an operation.
#[derive(Debug)]
pub struct OperationSignal {
    /// The regex pattern to match.
    pub pattern: Regex,
    /// The operation this pattern indicates.
    pub operation: Operation,
    /// Human-readable description of the signal.
    #[allow(dead_code)]
    pub description: &'static str,
}

/// Order in which operations are tested; more specific operations first.
pub const DETECTION_ORDER: [Operation; 6] = [
    Operation::Jacobian,
    Operation::Hessian,
    Operation::Gradient,
    Operation::Optimization,
    Operation::System,
    Operation::Derivative,
];

/// Static operation signal patterns.
pub static OPERATION_SIGNALS: LazyLock<Vec<OperationSignal>> = LazyLock::new(|| {
    vec![
        OperationSignal {
            pattern: Regex::new(r"(?i)\bjacobian\b").expect("static regex: jacobian"),
            operation: Operation::Jacobian,
            description: "jacobian",
        },
        OperationSignal {
            pattern: Regex::new(r"(?i)\bhessian\b").expect("static regex: hessian"),
            operation: Operation::Hessian,
            description: "hessian",
        },
        OperationSignal {
            pattern: Regex::new(r"(?i)\bgrad(?:ient)?\b").expect("static regex: gradient"),
            operation: Operation::Gradient,
            description: "gradient/grad",
        },
        OperationSignal {
            pattern: Regex::new("∇").expect("static regex: nabla"),
            operation: Operation::Gradient,
            description: "nabla",
        },
        OperationSignal {
            pattern: Regex::new(
                r"(?i)\b(?:maximi[sz]e|minimi[sz]e|maximum|minimum|max|min|optimi[sz]e|optimum)\b",
            )
            .expect("static regex: max/min"),
            operation: Operation::Optimization,
            description: "maximize/minimize/max/min",
        },
        OperationSignal {
            pattern: Regex::new(r"(?i)\b(?:critical\s+points?|stationary\s+points?|extrem\w*)\b")
                .expect("static regex: critical point"),
            operation: Operation::Optimization,
            description: "critical point/extremum",
        },
        OperationSignal {
            pattern: Regex::new(r"(?i)\b(?:system\s+of\s+(?:linear\s+)?equations|simultaneous(?:ly)?)\b")
                .expect("static regex: system of equations"),
            operation: Operation::System,
            description: "system of equations/simultaneous",
        },
        OperationSignal {
            pattern: Regex::new(r"(?i)\b(?:derivatives?|differentiate|differentiation|partial)\b")
                .expect("static regex: derivative"),
            operation: Operation::Derivative,
            description: "derivative/differentiate/partial",
        },
        OperationSignal {
            pattern: Regex::new(r"\b[dD][a-zA-Z]?\s*/\s*d[a-zA-Z]|∂")
                .expect("static regex: differential operator"),
            operation: Operation::Derivative,
            description: "d/dx, ∂",
        },
        OperationSignal {
            pattern: Regex::new(r"\b[a-zA-Z]'+\s*\(").expect("static regex: prime notation"),
            operation: Operation::Derivative,
            description: "f'(x)",
        },
    ]
});

/// Keyword patterns for topics, tested in order.
pub static TOPIC_SIGNALS: LazyLock<Vec<(Regex, Topic)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(
                r"(?i)\b(?:jacobian|matri(?:x|ces)|system|determinant|eigen\w*|vectors?|linear\s+equations?)\b",
            )
            .expect("static regex: linear algebra topic"),
            Topic::LinearAlgebra,
        ),
        (
            Regex::new(
                r"(?i)\b(?:derivatives?|differentiat\w*|gradient|hessian|integra\w*|limits?|optimi[sz]\w*|maximi[sz]e|minimi[sz]e|maximum|minimum|critical\s+points?|extrem\w*)\b|d/d|∂|∇",
            )
            .expect("static regex: calculus topic"),
            Topic::Calculus,
        ),
        (
            Regex::new(r"(?i)\b(?:solve|equations?|factori[sz]e|simplify|expand|roots?)\b")
                .expect("static regex: algebra topic"),
            Topic::Algebra,
        ),
    ]
});

/// A sentence-ending character followed by whitespace.
pub static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!;]\s+").expect("static regex: sentence boundary"));

/// An imperative verb that starts a new question.
pub static IMPERATIVE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:find|solve|compute|calculate|evaluate|determine|differentiate|maximi[sz]e|minimi[sz]e|max|min|show|prove)\b",
    )
    .expect("static regex: imperative verb")
});

/// Runs of whitespace other than newlines.
pub static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex: horizontal space"));

/// An identifier-like token.
pub static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]+(?:_?\d+)?").expect("static regex: identifier"));

/// `maximum`/`max` or `minimum`/`min`, for choosing an extremum.
pub static EXTREMUM_KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(max|min)(?:imi[sz]e|imum|ima)?\b").expect("static regex: extremum kind")
});
