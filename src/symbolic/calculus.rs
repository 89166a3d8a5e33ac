//! Symbolic differentiation.
//!
//! The result is unsimplified; callers run it through
//! [`simplify`](super::simplify::simplify).

use super::expr::{Constant, Expr, Func};

/// Differentiates `expr` with respect to `var`.
#[must_use]
pub fn differentiate(expr: &Expr, var: &str) -> Expr {
    if !expr.contains(var) {
        return Expr::num(0.0);
    }
    match expr {
        Expr::Num(_) | Expr::Const(_) => Expr::num(0.0),
        Expr::Sym(name) => Expr::num(if name == var { 1.0 } else { 0.0 }),
        Expr::Add(terms) => Expr::Add(terms.iter().map(|t| differentiate(t, var)).collect()),
        Expr::Mul(factors) => product_rule(factors, var),
        Expr::Pow(base, exp) => power_rule(base, exp, var),
        Expr::Func(f, arg) => chain_rule(*f, arg, var),
    }
}

fn product_rule(factors: &[Expr], var: &str) -> Expr {
    let terms = factors
        .iter()
        .enumerate()
        .filter(|(_, f)| f.contains(var))
        .map(|(i, f)| {
            let mut term: Vec<Expr> = factors.to_vec();
            term[i] = differentiate(f, var);
            Expr::Mul(term)
        })
        .collect();
    Expr::Add(terms)
}

fn power_rule(base: &Expr, exp: &Expr, var: &str) -> Expr {
    let base_has = base.contains(var);
    let exp_has = exp.contains(var);
    let original = Expr::pow(base.clone(), exp.clone());

    match (base_has, exp_has) {
        // d(u^n) = n * u^(n-1) * u'
        (true, false) => Expr::Mul(vec![
            exp.clone(),
            Expr::pow(base.clone(), Expr::sub(exp.clone(), Expr::num(1.0))),
            differentiate(base, var),
        ]),
        // d(a^v) = a^v * ln(a) * v'
        (false, true) => Expr::Mul(vec![
            original,
            ln_of(base),
            differentiate(exp, var),
        ]),
        // d(u^v) = u^v * (v' ln u + v u'/u)
        (true, true) => Expr::Mul(vec![
            original,
            Expr::Add(vec![
                Expr::mul(differentiate(exp, var), ln_of(base)),
                Expr::Mul(vec![
                    exp.clone(),
                    differentiate(base, var),
                    Expr::pow(base.clone(), Expr::num(-1.0)),
                ]),
            ]),
        ]),
        (false, false) => Expr::num(0.0),
    }
}

fn ln_of(base: &Expr) -> Expr {
    if *base == Expr::Const(Constant::E) {
        Expr::num(1.0)
    } else {
        Expr::func(Func::Ln, base.clone())
    }
}

fn chain_rule(f: Func, arg: &Expr, var: &str) -> Expr {
    let inner = differentiate(arg, var);
    let u = arg.clone();
    let outer = match f {
        Func::Sin => Expr::func(Func::Cos, u),
        Func::Cos => Expr::neg(Expr::func(Func::Sin, u)),
        Func::Tan => Expr::pow(Expr::func(Func::Cos, u), Expr::num(-2.0)),
        Func::Exp => Expr::func(Func::Exp, u),
        Func::Ln => Expr::pow(u, Expr::num(-1.0)),
        Func::Log => Expr::pow(
            Expr::mul(u, Expr::func(Func::Ln, Expr::num(10.0))),
            Expr::num(-1.0),
        ),
        Func::Sqrt => Expr::mul(
            Expr::num(0.5),
            Expr::pow(Expr::func(Func::Sqrt, u), Expr::num(-1.0)),
        ),
    };
    Expr::mul(outer, inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::parser::parse;
    use crate::symbolic::simplify::simplify;
    use std::collections::BTreeMap;

    fn slope(text: &str, var: &str, at: f64) -> f64 {
        let d = simplify(&differentiate(&parse(text).unwrap(), var));
        d.evaluate(&BTreeMap::from([(var.to_string(), at)])).unwrap()
    }

    #[test]
    fn test_constant_derivative_is_zero() {
        assert_eq!(differentiate(&parse("5").unwrap(), "x"), Expr::num(0.0));
        assert_eq!(differentiate(&parse("y^2").unwrap(), "x"), Expr::num(0.0));
    }

    #[test]
    fn test_power_rule_numeric() {
        assert!((slope("x^3", "x", 2.0) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_product_rule_numeric() {
        // d/dx x*sin(x) = sin(x) + x cos(x)
        let expected = 1.0_f64.sin() + 1.0_f64.cos();
        assert!((slope("x sin(x)", "x", 1.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_chain_rule_numeric() {
        // d/dx exp(x^2) = 2x exp(x^2)
        let expected = 2.0 * 0.5 * 0.25_f64.exp();
        assert!((slope("exp(x^2)", "x", 0.5) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_quotient_numeric() {
        // d/dx 1/x = -1/x^2
        assert!((slope("1/x", "x", 2.0) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_variable_exponent() {
        // d/dx 2^x = 2^x ln 2
        let expected = 8.0 * 2.0_f64.ln();
        assert!((slope("2^x", "x", 3.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sqrt_and_log() {
        assert!((slope("sqrt(x)", "x", 4.0) - 0.25).abs() < 1e-9);
        assert!((slope("ln(x)", "x", 2.0) - 0.5).abs() < 1e-9);
        let expected = 1.0 / (5.0 * 10.0_f64.ln());
        assert!((slope("log(x)", "x", 5.0) - expected).abs() < 1e-9);
    }
}
