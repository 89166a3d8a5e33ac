//! Expression extraction from natural-language problem text.
//!
//! Every function here is a best-effort heuristic over regex patterns (see
//! [`patterns`]). Failures are reported as [`ExtractionError`] and demote the
//! symbolic tier to a miss; they never abort a resolution.

pub mod patterns;

use patterns::{
    AT_CLAUSE, AT_NAMED, AT_TUPLE, BINDING, DEFINITION_LHS, DIFFERENTIAL_OPERATOR, DOMAIN_CLAUSE,
    EQUATION_SEPARATOR, LEAD_IN, NUMBER_ONLY, PARTIAL_IN, SYSTEM_LEAD_WORDS, SYSTEM_TRAIL_WORDS,
    WITH_RESPECT_TO,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Extraction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// An equation (`lhs = rhs`) was required but not found.
    #[error("no equation found")]
    NoEquation,

    /// A bracketed `[a, b, ...]` list was required but not found.
    #[error("missing bracketed list of expressions")]
    MissingBracketList,

    /// A free variable was required but the expression has none.
    #[error("no free variable")]
    NoVariable,

    /// Nothing expression-like was left after removing the prose.
    #[error("no expression found")]
    NoExpression,

    /// The expression text was rejected by the engine's parser.
    #[error("could not parse expression: {0}")]
    Parse(String),
}

/// Which variable a single-variable route picks when several are free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableSelection {
    /// Lexicographically first.
    #[default]
    First,
    /// Lexicographically last.
    Last,
}

/// An evaluation point as written in the text.
#[derive(Debug, Clone, PartialEq)]
pub enum Point {
    /// `at x = 1, y = 2`.
    Named(BTreeMap<String, f64>),
    /// `at (1, 2)`, bound in sorted variable order.
    Positional(Vec<f64>),
}

impl Point {
    /// Binds the point to `vars` (sorted). A positional point whose arity
    /// does not match is ignored.
    #[must_use]
    pub fn bind(&self, vars: &[String]) -> Option<BTreeMap<String, f64>> {
        match self {
            Self::Named(bindings) => Some(bindings.clone()),
            Self::Positional(values) if values.len() == vars.len() => {
                Some(vars.iter().cloned().zip(values.iter().copied()).collect())
            },
            Self::Positional(_) => None,
        }
    }
}

/// Rewrites informal notation into the engine's input syntax.
///
/// `**` becomes `^`, unicode operators become ASCII, superscripts become
/// powers and `π` becomes `pi`.
#[must_use]
pub fn normalize_notation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '×' | '·' | '⋅' | '∗' => out.push('*'),
            '÷' => out.push('/'),
            '−' | '–' | '—' => out.push('-'),
            '²' => out.push_str("^2"),
            '³' => out.push_str("^3"),
            'π' => out.push_str("pi"),
            other => out.push(other),
        }
    }
    out.replace("**", "^").trim().to_string()
}

fn trim_punctuation(text: &str) -> &str {
    text.trim()
        .trim_end_matches(['.', ',', ';', '?', '!', ':'])
        .trim()
}

/// Removes `with respect to`, `at ...` and domain clauses.
fn strip_qualifiers(text: &str) -> String {
    let text = WITH_RESPECT_TO.replace_all(text, "");
    let text = AT_CLAUSE.replace(&text, "");
    let text = DOMAIN_CLAUSE.replace(&text, "");
    text.trim().to_string()
}

/// Removes leading operation words, keeping what follows the last one that
/// is followed by something other than more operation words.
fn strip_lead_in(text: &str) -> String {
    let matches: Vec<_> = LEAD_IN.find_iter(text).collect();
    for m in matches.iter().rev() {
        let rest = trim_punctuation(&text[m.end()..]);
        if !trim_punctuation(&LEAD_IN.replace_all(rest, " ")).is_empty() {
            return rest.to_string();
        }
    }
    trim_punctuation(&LEAD_IN.replace_all(text, " ")).to_string()
}

/// `f(x) = rhs` and `y = rhs` reduce to `rhs`.
fn strip_definition(text: &str) -> String {
    match text.split_once('=') {
        Some((lhs, rhs)) if DEFINITION_LHS.is_match(lhs) && !rhs.contains('=') => {
            trim_punctuation(rhs).to_string()
        },
        _ => text.to_string(),
    }
}

/// Extracts the single expression a problem is about.
///
/// # Errors
///
/// Returns [`ExtractionError::NoExpression`] when nothing remains once the
/// prose is removed.
pub fn extract_expression(text: &str) -> Result<String, ExtractionError> {
    let text = strip_qualifiers(&normalize_notation(text));
    let text = DIFFERENTIAL_OPERATOR.replace_all(&text, " ");
    let text = PARTIAL_IN.replace_all(&text, " ");
    let text = strip_definition(&strip_lead_in(&text));
    let text = trim_punctuation(&text);
    if text.is_empty() {
        return Err(ExtractionError::NoExpression);
    }
    Ok(text.to_string())
}

/// Extracts the right-hand side of the first `=`.
///
/// Without an `=`, fails with [`ExtractionError::NoEquation`] when
/// `required`, and otherwise falls back to [`extract_expression`].
///
/// # Errors
///
/// See above.
pub fn extract_rhs(text: &str, required: bool) -> Result<String, ExtractionError> {
    let cleaned = strip_qualifiers(&normalize_notation(text));
    match cleaned.split_once('=') {
        Some((_, rhs)) => {
            let rhs = trim_punctuation(rhs);
            if rhs.is_empty() {
                Err(ExtractionError::NoExpression)
            } else {
                Ok(rhs.to_string())
            }
        },
        None if required => Err(ExtractionError::NoEquation),
        None => extract_expression(text),
    }
}

/// Splits `items` on commas that are not nested in brackets.
fn split_top_level(items: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut current = String::new();
    for c in items.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
                continue;
            },
            _ => {},
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Extracts the components of the first `[...]` list.
///
/// # Errors
///
/// Returns [`ExtractionError::MissingBracketList`] when there is no
/// bracketed list, and [`ExtractionError::NoExpression`] when it is empty.
pub fn extract_bracket_list(text: &str) -> Result<Vec<String>, ExtractionError> {
    let text = normalize_notation(text);
    let start = text.find('[').ok_or(ExtractionError::MissingBracketList)?;

    let mut depth = 0_i32;
    let mut end = None;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset);
                    break;
                }
            },
            _ => {},
        }
    }
    let end = end.ok_or(ExtractionError::MissingBracketList)?;

    let items = split_top_level(&text[start + 1..end]);
    if items.is_empty() {
        return Err(ExtractionError::NoExpression);
    }
    Ok(items)
}

fn parse_number(text: &str) -> Option<f64> {
    let caps = NUMBER_ONLY.captures(text)?;
    let number = caps.get(1)?.as_str();
    match number.split_once('/') {
        Some((n, d)) => {
            let d: f64 = d.trim().parse().ok()?;
            (d != 0.0).then_some(n.trim().parse::<f64>().ok()? / d)
        },
        None => number.parse().ok(),
    }
}

/// Extracts an optional evaluation point. Absence is not an error.
#[must_use]
pub fn extract_point(text: &str) -> Option<Point> {
    let text = normalize_notation(text);

    if let Some(caps) = AT_TUPLE.captures(&text) {
        let values: Option<Vec<f64>> = caps[1].split(',').map(parse_number).collect();
        if let Some(values) = values.filter(|v| !v.is_empty()) {
            return Some(Point::Positional(values));
        }
    }

    let caps = AT_NAMED.captures(&text)?;
    let bindings: BTreeMap<String, f64> = BINDING
        .captures_iter(&caps[1])
        .filter_map(|b| Some((b[1].to_string(), parse_number(&b[2])?)))
        .collect();
    (!bindings.is_empty()).then_some(Point::Named(bindings))
}

/// Extracts every `lhs = rhs` equation.
///
/// # Errors
///
/// Returns [`ExtractionError::NoEquation`] unless at least two equations are
/// present.
pub fn extract_equations(text: &str) -> Result<Vec<(String, String)>, ExtractionError> {
    let text = normalize_notation(text);
    // Prose before a colon ("Solve for x and y: ...") is not part of the system.
    let body = match text.rsplit_once(':') {
        Some((_, after)) if after.contains('=') => after,
        _ => text.as_str(),
    };

    let equations: Vec<(String, String)> = EQUATION_SEPARATOR
        .split(body)
        .filter(|piece| piece.matches('=').count() == 1)
        .filter_map(|piece| {
            let (lhs, rhs) = piece.split_once('=')?;
            let lhs = SYSTEM_LEAD_WORDS.replace(lhs.trim(), "");
            let rhs = SYSTEM_TRAIL_WORDS.replace(trim_punctuation(rhs), "");
            let (lhs, rhs) = (trim_punctuation(&lhs), trim_punctuation(&rhs));
            (!lhs.is_empty() && !rhs.is_empty()).then(|| (lhs.to_string(), rhs.to_string()))
        })
        .collect();

    if equations.len() < 2 {
        return Err(ExtractionError::NoEquation);
    }
    Ok(equations)
}

/// The variable named explicitly by `d/dx`, `∂/∂y`, `with respect to z` or
/// `partial x`.
#[must_use]
pub fn explicit_variable(text: &str) -> Option<String> {
    [&*DIFFERENTIAL_OPERATOR, &*WITH_RESPECT_TO, &*PARTIAL_IN]
        .into_iter()
        .find_map(|re| re.captures(text).map(|caps| caps[1].to_string()))
}

/// Picks one variable from a sorted set.
///
/// # Errors
///
/// Returns [`ExtractionError::NoVariable`] when `vars` is empty.
pub fn select_variable(vars: &BTreeSet<String>, policy: VariableSelection) -> Result<String, ExtractionError> {
    let picked = match policy {
        VariableSelection::First => vars.first(),
        VariableSelection::Last => vars.last(),
    };
    picked.cloned().ok_or(ExtractionError::NoVariable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("x**2 + 3×x", "x^2 + 3*x" ; "operators")]
    #[test_case("x² − 1", "x^2 - 1" ; "superscripts and minus")]
    #[test_case("2π", "2pi" ; "pi")]
    fn test_normalize_notation(input: &str, expected: &str) {
        assert_eq!(normalize_notation(input), expected);
    }

    #[test_case("Find the derivative of x^2", "x^2")]
    #[test_case("derivative of x^2 with respect to x", "x^2")]
    #[test_case("Differentiate f(x) = sin(x) + x^3.", "sin(x) + x^3")]
    #[test_case("gradient of 3*x + 2", "3*x + 2")]
    #[test_case("Find the derivative of x^3 at x = 2", "x^3")]
    #[test_case("d/dx (x^2 + 1)", "(x^2 + 1)")]
    #[test_case("y = x^2, find dy/dx", "x^2")]
    #[test_case("Maximize the function x - x^2", "x - x^2")]
    #[test_case("find the critical points of f(x, y) = x^2 + y^2", "x^2 + y^2")]
    #[test_case("x^2 + 1", "x^2 + 1")]
    fn test_extract_expression(input: &str, expected: &str) {
        assert_eq!(extract_expression(input).unwrap(), expected);
    }

    #[test]
    fn test_extract_expression_empty() {
        assert_eq!(
            extract_expression("find the derivative"),
            Err(ExtractionError::NoExpression)
        );
    }

    #[test]
    fn test_extract_rhs() {
        assert_eq!(extract_rhs("f(x) = x^2 + 1", true).unwrap(), "x^2 + 1");
        assert_eq!(extract_rhs("derivative of x^2", true), Err(ExtractionError::NoEquation));
        assert_eq!(extract_rhs("derivative of x^2", false).unwrap(), "x^2");
        // The `=` of an evaluation point is not an equation.
        assert_eq!(
            extract_rhs("derivative of x^2 at x = 3", true),
            Err(ExtractionError::NoEquation)
        );
    }

    #[test]
    fn test_extract_bracket_list() {
        let items = extract_bracket_list("jacobian of [x*y, x+y]").unwrap();
        assert_eq!(items, vec!["x*y", "x+y"]);

        let nested = extract_bracket_list("jacobian of [f(x, y), sin(x)]").unwrap();
        assert_eq!(nested, vec!["f(x, y)", "sin(x)"]);
    }

    #[test]
    fn test_extract_bracket_list_missing() {
        assert_eq!(
            extract_bracket_list("jacobian of x*y, x+y"),
            Err(ExtractionError::MissingBracketList)
        );
        assert_eq!(
            extract_bracket_list("jacobian of (x*y, x+y)"),
            Err(ExtractionError::MissingBracketList)
        );
    }

    #[test]
    fn test_extract_point_named() {
        let point = extract_point("derivative of x^2 y at x = 1, y = -2").unwrap();
        let expected = BTreeMap::from([("x".to_string(), 1.0), ("y".to_string(), -2.0)]);
        assert_eq!(point, Point::Named(expected));
    }

    #[test]
    fn test_extract_point_positional() {
        let point = extract_point("gradient of x*y at point (1, 1/2)").unwrap();
        assert_eq!(point, Point::Positional(vec![1.0, 0.5]));
        let vars = vec!["x".to_string(), "y".to_string()];
        let bound = point.bind(&vars).unwrap();
        assert!((bound["y"] - 0.5).abs() < f64::EPSILON);
        assert!(point.bind(&vars[..1]).is_none());
    }

    #[test]
    fn test_extract_point_absent() {
        assert!(extract_point("derivative of x^2").is_none());
    }

    #[test]
    fn test_extract_equations() {
        let eqs = extract_equations("Solve the system x + y = 3, x - y = 1").unwrap();
        assert_eq!(
            eqs,
            vec![
                ("x + y".to_string(), "3".to_string()),
                ("x - y".to_string(), "1".to_string())
            ]
        );

        let eqs = extract_equations("Solve for x and y: 2x + y = 5 and x - y = 1").unwrap();
        assert_eq!(eqs.len(), 2);
        assert_eq!(eqs[0].0, "2x + y");
    }

    #[test]
    fn test_extract_equations_needs_two() {
        assert_eq!(
            extract_equations("solve x + 1 = 2"),
            Err(ExtractionError::NoEquation)
        );
    }

    #[test_case("d/dy (x y^2)", Some("y"))]
    #[test_case("∂/∂z x z", Some("z"))]
    #[test_case("derivative of x y with respect to y", Some("y"))]
    #[test_case("partial y of x*y", Some("y"))]
    #[test_case("derivative of x^2", None)]
    fn test_explicit_variable(input: &str, expected: Option<&str>) {
        assert_eq!(explicit_variable(input).as_deref(), expected);
    }

    #[test]
    fn test_select_variable() {
        let vars: BTreeSet<String> = ["y", "x", "z"].iter().map(ToString::to_string).collect();
        assert_eq!(select_variable(&vars, VariableSelection::First).unwrap(), "x");
        assert_eq!(select_variable(&vars, VariableSelection::Last).unwrap(), "z");
        assert_eq!(
            select_variable(&BTreeSet::new(), VariableSelection::First),
            Err(ExtractionError::NoVariable)
        );
    }
}
