//! Algebraic simplification.
//!
//! Produces a canonical form: nested sums and products are flattened,
//! constants folded, like terms collected (`x + 2x` → `3*x`), equal bases
//! merged (`x * x^2` → `x^3`), and terms ordered by descending degree with the
//! constant last.

// Canonical keys are the display strings of the sub-expressions.
#![allow(clippy::float_cmp)]

use super::display::to_display;
use super::expr::{Constant, Expr, Func};

/// Upper bound on rewrite passes before the current form is accepted.
const MAX_PASSES: usize = 8;

/// Tolerance for treating a float as an integer or as zero.
const EPS: f64 = 1e-12;

/// Simplifies an expression to a fixed point.
#[must_use]
pub fn simplify(expr: &Expr) -> Expr {
    let mut current = expr.clone();
    for _ in 0..MAX_PASSES {
        let next = simplify_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
    current
}

fn simplify_once(expr: &Expr) -> Expr {
    match expr {
        Expr::Num(v) => Expr::Num(clean(*v)),
        Expr::Const(_) | Expr::Sym(_) => expr.clone(),
        Expr::Add(terms) => simplify_add(terms.iter().map(simplify_once).collect()),
        Expr::Mul(factors) => simplify_mul(factors.iter().map(simplify_once).collect()),
        Expr::Pow(base, exp) => simplify_pow(simplify_once(base), simplify_once(exp)),
        Expr::Func(f, arg) => simplify_func(*f, simplify_once(arg)),
    }
}

fn clean(v: f64) -> f64 {
    if v.abs() < EPS { 0.0 } else { v }
}

fn is_integer(v: f64) -> bool {
    (v - v.round()).abs() < 1e-9
}

struct LikeTerm {
    key: String,
    coef: f64,
    rest: Vec<Expr>,
}

fn simplify_add(terms: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            Expr::Add(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut constant = 0.0;
    let mut groups: Vec<LikeTerm> = Vec::new();
    for term in flat {
        if let Some(v) = term.as_num() {
            constant += v;
            continue;
        }
        let (coef, rest) = split_coefficient(term);
        let key = to_display(&rebuild_product(1.0, rest.clone()));
        if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
            group.coef += coef;
        } else {
            groups.push(LikeTerm { key, coef, rest });
        }
    }

    groups.retain(|g| g.coef.abs() > EPS);
    groups.sort_by(|a, b| {
        degree(&b.rest)
            .partial_cmp(&degree(&a.rest))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });

    let mut out: Vec<Expr> = groups
        .into_iter()
        .map(|g| rebuild_product(g.coef, g.rest))
        .collect();
    if constant.abs() > EPS {
        out.push(Expr::Num(constant));
    }

    match out.len() {
        0 => Expr::Num(0.0),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

/// Splits a term into its numeric coefficient and remaining factors.
fn split_coefficient(term: Expr) -> (f64, Vec<Expr>) {
    match term {
        Expr::Mul(factors) => {
            let mut coef = 1.0;
            let mut rest = Vec::with_capacity(factors.len());
            for f in factors {
                match f.as_num() {
                    Some(v) => coef *= v,
                    None => rest.push(f),
                }
            }
            (coef, rest)
        },
        other => (1.0, vec![other]),
    }
}

fn rebuild_product(coef: f64, mut rest: Vec<Expr>) -> Expr {
    if rest.is_empty() {
        return Expr::Num(clean(coef));
    }
    if (coef - 1.0).abs() < EPS {
        return if rest.len() == 1 {
            rest.remove(0)
        } else {
            Expr::Mul(rest)
        };
    }
    let mut factors = Vec::with_capacity(rest.len() + 1);
    factors.push(Expr::Num(coef));
    factors.extend(rest);
    Expr::Mul(factors)
}

/// Total polynomial degree of a product of factors.
fn degree(factors: &[Expr]) -> f64 {
    factors
        .iter()
        .map(|f| match f {
            Expr::Sym(_) => 1.0,
            Expr::Pow(base, exp) if matches!(**base, Expr::Sym(_)) => exp.as_num().unwrap_or(0.0),
            _ => 0.0,
        })
        .sum()
}

struct PowerGroup {
    key: String,
    base: Expr,
    exponents: Vec<Expr>,
}

fn simplify_mul(factors: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(factors.len());
    for factor in factors {
        match factor {
            Expr::Mul(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }

    let mut coef = 1.0;
    let mut groups: Vec<PowerGroup> = Vec::new();
    for factor in flat {
        if let Some(v) = factor.as_num() {
            coef *= v;
            continue;
        }
        let (base, exponent) = match factor {
            Expr::Pow(b, e) => (*b, *e),
            other => (other, Expr::Num(1.0)),
        };
        let key = to_display(&base);
        if let Some(group) = groups.iter_mut().find(|g| g.key == key) {
            group.exponents.push(exponent);
        } else {
            groups.push(PowerGroup {
                key,
                base,
                exponents: vec![exponent],
            });
        }
    }

    if coef.abs() < EPS {
        return Expr::Num(0.0);
    }

    let mut out: Vec<(u8, String, Expr)> = Vec::with_capacity(groups.len());
    for group in groups {
        let exponent = if group.exponents.len() == 1 {
            group.exponents.into_iter().next().unwrap_or(Expr::Num(1.0))
        } else {
            simplify_add(group.exponents)
        };
        let merged = simplify_pow(group.base, exponent);
        match merged {
            Expr::Num(v) => coef *= v,
            Expr::Mul(inner) => {
                // (2x)^2 expands into coefficient and factors.
                for f in inner {
                    match f.as_num() {
                        Some(v) => coef *= v,
                        None => {
                            let key = to_display(&f);
                            out.push((factor_rank(&f), key, f));
                        },
                    }
                }
            },
            other => {
                let key = to_display(&other);
                out.push((factor_rank(&other), key, other));
            },
        }
    }

    out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    rebuild_product(coef, out.into_iter().map(|(_, _, f)| f).collect())
}

/// Symbols and their powers first, then constants, then everything else.
fn factor_rank(factor: &Expr) -> u8 {
    match factor {
        Expr::Sym(_) => 0,
        Expr::Pow(base, _) if matches!(**base, Expr::Sym(_)) => 0,
        Expr::Const(_) => 1,
        _ => 2,
    }
}

fn simplify_pow(base: Expr, exp: Expr) -> Expr {
    if exp.is_num(0.0) || base.is_num(1.0) {
        return Expr::Num(1.0);
    }
    if exp.is_num(1.0) {
        return base;
    }

    match (&base, exp.as_num()) {
        (Expr::Num(b), Some(e)) => {
            let value = b.powf(e);
            if value.is_finite() && (is_integer(e) || is_integer(value)) {
                return Expr::Num(clean(value));
            }
        },
        // (b^m)^n = b^(m*n) only when no even root is taken of an even power.
        (Expr::Pow(inner_base, inner_exp), Some(e)) => {
            if let Some(ie) = inner_exp.as_num().filter(|&ie| is_integer(e) || is_odd_integer(ie)) {
                return simplify_pow((**inner_base).clone(), Expr::Num(ie * e));
            }
        },
        (Expr::Mul(factors), Some(e)) if is_integer(e) => {
            let powered = factors
                .iter()
                .map(|f| simplify_pow(f.clone(), Expr::Num(e)))
                .collect();
            return simplify_mul(powered);
        },
        (Expr::Func(Func::Sqrt, arg), Some(e)) if is_integer(e / 2.0) => {
            return simplify_pow((**arg).clone(), Expr::Num(e / 2.0));
        },
        _ => {},
    }

    if base.is_num(0.0) && exp.as_num().is_some_and(|e| e > 0.0) {
        return Expr::Num(0.0);
    }
    if base == Expr::Const(Constant::E) {
        return Expr::func(Func::Exp, exp);
    }
    Expr::pow(base, exp)
}

fn is_odd_integer(v: f64) -> bool {
    is_integer(v) && (v.round().rem_euclid(2.0) - 1.0).abs() < EPS
}

fn simplify_func(f: Func, arg: Expr) -> Expr {
    if let Some(v) = arg.as_num() {
        let value = f.apply(v);
        // Only exact results are folded; sin(1) stays symbolic.
        if value.is_finite() && is_integer(value) {
            return Expr::Num(clean(value.round()));
        }
    }
    match (f, &arg) {
        (Func::Ln, Expr::Const(Constant::E)) => Expr::Num(1.0),
        (Func::Ln, Expr::Func(Func::Exp, inner)) | (Func::Exp, Expr::Func(Func::Ln, inner)) => {
            (**inner).clone()
        },
        _ => Expr::func(f, arg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parser::parse;
    use test_case::test_case;

    fn simp(text: &str) -> String {
        to_display(&simplify(&parse(text).unwrap()))
    }

    #[test_case("x + x", "2*x" ; "collects like terms")]
    #[test_case("2*x*1 + 0", "2*x" ; "drops identities")]
    #[test_case("x * x^2", "x^3" ; "merges powers")]
    #[test_case("3 + 4*2", "11" ; "folds constants")]
    #[test_case("x - x", "0" ; "cancels")]
    #[test_case("2 + x^2 + 3x", "x^2 + 3*x + 2" ; "orders by degree")]
    #[test_case("(2x)^2", "4*x^2" ; "distributes integer power")]
    #[test_case("y*x", "x*y" ; "sorts factors")]
    #[test_case("x^2/x", "x" ; "cancels division")]
    #[test_case("sin(0) + cos(0)", "1" ; "folds exact functions")]
    #[test_case("ln(e^x)", "x" ; "ln of exp")]
    #[test_case("x - 3", "x - 3" ; "keeps subtraction")]
    fn test_simplify(input: &str, expected: &str) {
        assert_eq!(simp(input), expected);
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let once = simplify(&parse("3x^2 + 2x*y - x*y + 7 - 2").unwrap());
        assert_eq!(simplify(&once), once);
    }

    #[test]
    fn test_even_power_under_root_is_kept() {
        let x = Expr::sym("x");
        let root = simplify(&Expr::pow(Expr::pow(x.clone(), Expr::num(2.0)), Expr::num(0.5)));
        assert_ne!(root, x);
        assert_eq!(root, Expr::pow(Expr::pow(x.clone(), Expr::num(2.0)), Expr::num(0.5)));

        let cube = simplify(&Expr::pow(Expr::pow(x.clone(), Expr::num(3.0)), Expr::num(1.0 / 3.0)));
        assert_eq!(cube, x);
        assert_eq!(simp("(x^2)^3"), "x^6");
    }

    #[test]
    fn test_sin_of_one_stays_symbolic() {
        assert_eq!(simp("sin(1)"), "sin(1)");
    }
}
