//! Plain-text and LaTeX rendering.
//!
//! Both renderers print a product with negative powers as a single fraction
//! (`x^-1 * 3` → `3/x`) and snap floats that are close to a fraction with a
//! small denominator (`0.5` → `1/2`).

#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

use super::expr::{Constant, Expr, Func};

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

/// Largest denominator a float is snapped to.
const MAX_DENOMINATOR: i64 = 100;

/// Returns `(numerator, denominator)` when `v` is within rounding error of a
/// fraction with a denominator up to [`MAX_DENOMINATOR`].
#[must_use]
pub fn as_rational(v: f64) -> Option<(i64, i64)> {
    if !v.is_finite() || v.abs() > 1e12 {
        return None;
    }
    for q in 1..=MAX_DENOMINATOR {
        let p = v * q as f64;
        if (p - p.round()).abs() < 1e-9 * q as f64 {
            return Some((p.round() as i64, q));
        }
    }
    None
}

/// Formats a number as an integer, a fraction, or a trimmed decimal.
#[must_use]
pub fn format_number(v: f64) -> String {
    match as_rational(v) {
        Some((p, 1)) => p.to_string(),
        Some((p, q)) => format!("{p}/{q}"),
        None if v.is_finite() => {
            let text = format!("{v:.6}");
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        },
        None => v.to_string(),
    }
}

/// Renders an expression as plain text, e.g. `x^2 + 3*x - 1`.
#[must_use]
pub fn to_display(expr: &Expr) -> String {
    plain(expr, 0)
}

/// Renders an expression as LaTeX, e.g. `x^{2} + 3 x - 1`.
#[must_use]
pub fn to_latex(expr: &Expr) -> String {
    latex(expr, 0)
}

/// If the expression reads as negative, returns its negation.
fn negated(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::Num(v) if *v < 0.0 => Some(Expr::Num(-v)),
        Expr::Mul(factors) => {
            let idx = factors
                .iter()
                .position(|f| f.as_num().is_some_and(|v| v < 0.0))?;
            let mut out = factors.clone();
            let flipped = -out[idx].as_num()?;
            if (flipped - 1.0).abs() < f64::EPSILON {
                out.remove(idx);
            } else {
                out[idx] = Expr::Num(flipped);
            }
            Some(if out.len() == 1 {
                out.remove(0)
            } else {
                Expr::Mul(out)
            })
        },
        _ => None,
    }
}

fn has_negative_exponent(expr: &Expr) -> bool {
    matches!(expr, Expr::Pow(_, exp) if exp.as_num().is_some_and(|e| e < 0.0))
}

/// Numerator and denominator factors of a product, with the coefficient's
/// sign returned separately.
struct Fraction {
    negative: bool,
    numerator: Vec<Expr>,
    denominator: Vec<Expr>,
}

fn split_fraction(factors: &[Expr]) -> Fraction {
    let mut coef = 1.0;
    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    for factor in factors {
        match factor {
            Expr::Num(v) => coef *= v,
            Expr::Pow(base, exp) if has_negative_exponent(factor) => {
                let flipped = -exp.as_num().unwrap_or(-1.0);
                if (flipped - 1.0).abs() < f64::EPSILON {
                    denominator.push((**base).clone());
                } else {
                    denominator.push(Expr::pow((**base).clone(), Expr::Num(flipped)));
                }
            },
            other => numerator.push(other.clone()),
        }
    }

    let magnitude = coef.abs();
    match as_rational(magnitude) {
        Some((p, q)) => {
            if p != 1 || numerator.is_empty() {
                numerator.insert(0, Expr::Num(p as f64));
            }
            if q != 1 {
                denominator.insert(0, Expr::Num(q as f64));
            }
        },
        None => numerator.insert(0, Expr::Num(magnitude)),
    }

    Fraction {
        negative: coef < 0.0,
        numerator,
        denominator,
    }
}

fn paren(text: String, wrap: bool) -> String {
    if wrap { format!("({text})") } else { text }
}

fn plain(expr: &Expr, parent: u8) -> String {
    match expr {
        Expr::Num(v) => {
            let text = format_number(*v);
            let wrap = (*v < 0.0 && parent >= PREC_MUL) || (text.contains('/') && parent >= PREC_POW);
            paren(text, wrap)
        },
        Expr::Const(Constant::Pi) => "pi".to_string(),
        Expr::Const(Constant::E) => "e".to_string(),
        Expr::Sym(name) => name.clone(),
        Expr::Add(terms) => {
            let mut out = String::new();
            for (i, term) in terms.iter().enumerate() {
                if i == 0 {
                    out.push_str(&plain(term, PREC_ADD));
                } else if let Some(positive) = negated(term) {
                    out.push_str(" - ");
                    out.push_str(&plain(&positive, PREC_MUL));
                } else {
                    out.push_str(" + ");
                    out.push_str(&plain(term, PREC_ADD));
                }
            }
            paren(out, parent > PREC_ADD)
        },
        Expr::Mul(factors) => plain_product(factors, parent),
        Expr::Pow(..) if has_negative_exponent(expr) => {
            plain_product(std::slice::from_ref(expr), parent)
        },
        Expr::Pow(base, exp) => {
            let text = format!("{}^{}", plain(base, PREC_ATOM), plain(exp, PREC_ATOM));
            paren(text, parent > PREC_POW)
        },
        Expr::Func(f, arg) => format!("{}({})", f.name(), plain(arg, 0)),
    }
}

fn plain_product(factors: &[Expr], parent: u8) -> String {
    let fraction = split_fraction(factors);
    let numerator: Vec<String> = fraction
        .numerator
        .iter()
        .map(|f| plain(f, PREC_MUL))
        .collect();
    let mut body = numerator.join("*");

    if !fraction.denominator.is_empty() {
        let denominator = if fraction.denominator.len() == 1 {
            plain(&fraction.denominator[0], PREC_POW)
        } else {
            let parts: Vec<String> = fraction
                .denominator
                .iter()
                .map(|f| plain(f, PREC_MUL))
                .collect();
            format!("({})", parts.join("*"))
        };
        body = format!("{body}/{denominator}");
    }

    if fraction.negative {
        body = format!("-{body}");
    }
    let compound = fraction.negative || factors.len() > 1 || !fraction.denominator.is_empty();
    paren(body, compound && parent > PREC_MUL)
}

fn latex_paren(text: String, wrap: bool) -> String {
    if wrap {
        format!("\\left({text}\\right)")
    } else {
        text
    }
}

fn latex_number(v: f64) -> String {
    match as_rational(v.abs()) {
        Some((p, 1)) if v < 0.0 => format!("-{p}"),
        Some((p, 1)) => p.to_string(),
        Some((p, q)) if v < 0.0 => format!("-\\frac{{{p}}}{{{q}}}"),
        Some((p, q)) => format!("\\frac{{{p}}}{{{q}}}"),
        None => format_number(v),
    }
}

/// `x1` → `x_{1}`, `x_12` → `x_{12}`.
fn latex_symbol(name: &str) -> String {
    let split = name.find(|c: char| c == '_' || c.is_ascii_digit());
    match split {
        Some(at) if at > 0 => {
            let (head, tail) = name.split_at(at);
            format!("{head}_{{{}}}", tail.trim_start_matches('_'))
        },
        _ => name.to_string(),
    }
}

fn latex(expr: &Expr, parent: u8) -> String {
    match expr {
        Expr::Num(v) => {
            let text = latex_number(*v);
            let wrap = (*v < 0.0 && parent >= PREC_MUL) || (text.contains("frac") && parent >= PREC_POW);
            latex_paren(text, wrap)
        },
        Expr::Const(Constant::Pi) => "\\pi".to_string(),
        Expr::Const(Constant::E) => "e".to_string(),
        Expr::Sym(name) => latex_symbol(name),
        Expr::Add(terms) => {
            let mut out = String::new();
            for (i, term) in terms.iter().enumerate() {
                if i == 0 {
                    out.push_str(&latex(term, PREC_ADD));
                } else if let Some(positive) = negated(term) {
                    out.push_str(" - ");
                    out.push_str(&latex(&positive, PREC_MUL));
                } else {
                    out.push_str(" + ");
                    out.push_str(&latex(term, PREC_ADD));
                }
            }
            latex_paren(out, parent > PREC_ADD)
        },
        Expr::Mul(factors) => latex_product(factors, parent),
        Expr::Pow(..) if has_negative_exponent(expr) => {
            latex_product(std::slice::from_ref(expr), parent)
        },
        Expr::Pow(base, exp) => {
            let text = format!("{}^{{{}}}", latex(base, PREC_ATOM), latex(exp, 0));
            latex_paren(text, parent > PREC_POW)
        },
        Expr::Func(Func::Sqrt, arg) => format!("\\sqrt{{{}}}", latex(arg, 0)),
        Expr::Func(Func::Exp, arg) => format!("e^{{{}}}", latex(arg, 0)),
        Expr::Func(Func::Log, arg) => format!("\\log_{{10}}\\left({}\\right)", latex(arg, 0)),
        Expr::Func(f, arg) => format!("\\{}\\left({}\\right)", f.name(), latex(arg, 0)),
    }
}

fn latex_join(factors: &[Expr]) -> String {
    let mut out = String::new();
    for (i, factor) in factors.iter().enumerate() {
        if i > 0 {
            out.push_str(if factor.as_num().is_some() { " \\cdot " } else { " " });
        }
        out.push_str(&latex(factor, PREC_MUL));
    }
    out
}

fn latex_product(factors: &[Expr], parent: u8) -> String {
    let fraction = split_fraction(factors);
    let numerator = latex_join(&fraction.numerator);
    let mut body = if fraction.denominator.is_empty() {
        numerator
    } else {
        format!("\\frac{{{numerator}}}{{{}}}", latex_join(&fraction.denominator))
    };
    if fraction.negative {
        body = format!("-{body}");
    }
    let compound = fraction.negative || factors.len() > 1;
    latex_paren(body, compound && parent > PREC_MUL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::SymbolicEngine;
    use crate::symbolic::parser::parse;
    use crate::symbolic::simplify::simplify;
    use test_case::test_case;

    fn show(text: &str) -> String {
        to_display(&simplify(&parse(text).unwrap()))
    }

    fn tex(text: &str) -> String {
        to_latex(&simplify(&parse(text).unwrap()))
    }

    #[test_case(2.0, "2")]
    #[test_case(-3.0, "-3")]
    #[test_case(0.5, "1/2")]
    #[test_case(-0.75, "-3/4")]
    #[test_case(std::f64::consts::PI, "3.141593")]
    fn test_format_number(v: f64, expected: &str) {
        assert_eq!(format_number(v), expected);
    }

    #[test_case("1/x", "1/x")]
    #[test_case("3/x^2", "3/x^2")]
    #[test_case("x/2", "x/2")]
    #[test_case("-x", "-x")]
    #[test_case("x - 2y", "x - 2*y")]
    #[test_case("2(x + 1)", "2*(x + 1)")]
    #[test_case("sqrt(x)", "sqrt(x)")]
    #[test_case("x^(1/2)", "x^(1/2)")]
    #[test_case("1/(2x)", "1/(2*x)")]
    fn test_plain(input: &str, expected: &str) {
        assert_eq!(show(input), expected);
    }

    #[test_case("x^2", "x^{2}")]
    #[test_case("1/x", "\\frac{1}{x}")]
    #[test_case("3x", "3 x")]
    #[test_case("sin(x)", "\\sin\\left(x\\right)")]
    #[test_case("sqrt(x)", "\\sqrt{x}")]
    #[test_case("x1 + 1", "x_{1} + 1")]
    fn test_latex(input: &str, expected: &str) {
        assert_eq!(tex(input), expected);
    }

    #[test]
    fn test_matrix_rendering() {
        let rows = vec![
            vec![Expr::sym("y"), Expr::sym("x")],
            vec![Expr::num(1.0), Expr::num(1.0)],
        ];
        let engine = crate::symbolic::NativeEngine::new();
        assert_eq!(engine.matrix_display(&rows), "[[y, x], [1, 1]]");
        assert_eq!(
            engine.matrix_latex(&rows),
            "\\begin{bmatrix} y & x \\\\ 1 & 1 \\end{bmatrix}"
        );
    }
}
