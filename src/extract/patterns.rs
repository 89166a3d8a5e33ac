//! Regex tables for natural-language math extraction.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

/// A variable name: one letter with an optional numeric subscript.
const VAR: &str = r"[a-zA-Z](?:_?\d+)?";

/// A signed decimal or simple fraction.
const NUMBER: &str = r"-?\d*\.?\d+(?:\s*/\s*\d*\.?\d+)?";

/// Operation words introducing the expression, with their filler words.
pub static LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:find|compute|calculate|determine|evaluate|simplify|solve|what\s+is|differentiate|(?:partial\s+)?derivatives?|gradient|jacobian|hessian|maximi[sz]e|minimi[sz]e|maximum|minimum|max|min|optimi[sz]e|extrem(?:a|um|e\s+values?)|critical\s+points?)\b(?:\s*(?:(?:of|for|the|function|matrix|vector|values?|points?|expression)\b|:))*\s*",
    )
    .expect("static regex: lead-in")
});

/// `with respect to x`, `w.r.t. x, y`.
pub static WITH_RESPECT_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\s*,?\s*\b(?:with\s+respect\s+to|w\.?r\.?t\.?)\s+({VAR})(?:\s*(?:,|and)\s*{VAR})*\b"
    ))
    .expect("static regex: with respect to")
});

/// `d/dx`, `dy/dx`, `∂/∂y`, `∂f/∂y`.
pub static DIFFERENTIAL_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:\b[dD][a-zA-Z]?|∂[a-zA-Z]?)\s*/\s*(?:d|∂)({VAR})\b"))
        .expect("static regex: differential operator")
});

/// `partial x`, `partial in y`.
pub static PARTIAL_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bpartial\s+(?:in\s+|by\s+)?({VAR})\b(?:\s+of\b)?"))
        .expect("static regex: partial in")
});

/// An evaluation point clause running to the end of the text.
pub static AT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\s*,?\s*\bat\s+(?:the\s+)?(?:point\s+)?(?:\(|{VAR}\s*=).*$"
    ))
    .expect("static regex: at clause")
});

/// A domain clause such as `for x in [0, 1]` or `on the interval ...`.
pub static DOMAIN_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\s*,?\s*\b(?:for\s+{VAR}\s+in|over\s+the\s+interval|on\s+the\s+interval|for\s+all)\b.*$"
    ))
    .expect("static regex: domain clause")
});

/// `at (1, 2)` or `at point (1, 2)`.
pub static AT_TUPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bat\s+(?:the\s+)?(?:point\s+)?\(\s*([^()]*?)\s*\)")
        .expect("static regex: at tuple")
});

/// `at x = 1, y = 2`.
pub static AT_NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bat\s+(?:the\s+point\s+)?((?:{VAR}\s*=\s*{NUMBER}\s*(?:,|\band\b)?\s*)+)"
    ))
    .expect("static regex: at named")
});

/// One `x = 2` binding inside a named point.
pub static BINDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"({VAR})\s*=\s*({NUMBER})")).expect("static regex: binding")
});

/// A number, optionally a fraction.
pub static NUMBER_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*({NUMBER})\s*$")).expect("static regex: number")
});

/// A function or variable name on the left of a definition: `f(x)`, `y`.
pub static DEFINITION_LHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[a-zA-Z]\w*\s*(?:\([^()]*\))?\s*$").expect("static regex: definition lhs")
});

/// Separators between equations of a system.
pub static EQUATION_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:[,;\n]|\band\b)\s*").expect("static regex: equation separator")
});

/// Words that may precede the first equation of a system.
pub static SYSTEM_LEAD_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:solve|the|following|system|of|linear|equations?|simultaneous(?:ly)?|find|given|if|where)\b\s*)+",
    )
    .expect("static regex: system lead words")
});

/// Words that may follow the last equation of a system.
pub static SYSTEM_TRAIL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\s*\b(?:simultaneously|together|for\s+{VAR}(?:\s*(?:,|and)\s*{VAR})*)\s*$"
    ))
    .expect("static regex: system trail words")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_in_matches_common_phrasings() {
        for text in [
            "Find the derivative of x^2",
            "gradient of 3x + 2",
            "Maximize the function x - x^2",
            "compute the jacobian matrix of [x, y]",
        ] {
            assert!(LEAD_IN.is_match(text), "{text}");
        }
    }

    #[test]
    fn test_differential_operator_captures_variable() {
        let caps = DIFFERENTIAL_OPERATOR.captures("find dy/dx of y = x^2").unwrap();
        assert_eq!(&caps[1], "x");
        let caps = DIFFERENTIAL_OPERATOR.captures("∂/∂y (x y)").unwrap();
        assert_eq!(&caps[1], "y");
    }

    #[test]
    fn test_at_clause_runs_to_end() {
        let stripped = AT_CLAUSE.replace("x^2 + y at x = 1, y = 2", "");
        assert_eq!(stripped, "x^2 + y");
    }
}
