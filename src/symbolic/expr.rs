//! Expression tree.
//!
//! Subtraction and division have no node of their own: `a - b` is
//! `a + (-1)*b` and `a / b` is `a * b^-1`. Sums and products are n-ary.

use super::EngineError;
use std::collections::{BTreeMap, BTreeSet};

/// Elementary functions understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
    /// Natural exponential.
    Exp,
    /// Natural logarithm.
    Ln,
    /// Base-10 logarithm.
    Log,
    /// Square root.
    Sqrt,
}

impl Func {
    /// Resolves a function name, accepting common aliases.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "tan" => Some(Self::Tan),
            "exp" => Some(Self::Exp),
            "ln" => Some(Self::Ln),
            "log" => Some(Self::Log),
            "sqrt" => Some(Self::Sqrt),
            _ => None,
        }
    }

    /// Canonical function name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
        }
    }

    /// Applies the function to a number.
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Ln => x.ln(),
            Self::Log => x.log10(),
            Self::Sqrt => x.sqrt(),
        }
    }
}

/// Named mathematical constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Constant {
    /// Ratio of circumference to diameter.
    Pi,
    /// Euler's number.
    E,
}

impl Constant {
    /// Numeric value of the constant.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::Pi => std::f64::consts::PI,
            Self::E => std::f64::consts::E,
        }
    }
}

/// A symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal.
    Num(f64),
    /// Named constant.
    Const(Constant),
    /// Free symbol.
    Sym(String),
    /// Sum of terms.
    Add(Vec<Expr>),
    /// Product of factors.
    Mul(Vec<Expr>),
    /// Power `base ^ exponent`.
    Pow(Box<Expr>, Box<Expr>),
    /// Function application.
    Func(Func, Box<Expr>),
}

impl Expr {
    /// Numeric literal.
    #[must_use]
    pub const fn num(value: f64) -> Self {
        Self::Num(value)
    }

    /// Free symbol.
    #[must_use]
    pub fn sym(name: impl Into<String>) -> Self {
        Self::Sym(name.into())
    }

    /// `a + b`.
    #[must_use]
    pub fn add(a: Self, b: Self) -> Self {
        Self::Add(vec![a, b])
    }

    /// `a - b`.
    #[must_use]
    pub fn sub(a: Self, b: Self) -> Self {
        Self::Add(vec![a, Self::neg(b)])
    }

    /// `a * b`.
    #[must_use]
    pub fn mul(a: Self, b: Self) -> Self {
        Self::Mul(vec![a, b])
    }

    /// `a / b`.
    #[must_use]
    pub fn div(a: Self, b: Self) -> Self {
        Self::Mul(vec![a, Self::pow(b, Self::Num(-1.0))])
    }

    /// `-a`.
    #[must_use]
    pub fn neg(a: Self) -> Self {
        Self::Mul(vec![Self::Num(-1.0), a])
    }

    /// `base ^ exponent`.
    #[must_use]
    pub fn pow(base: Self, exponent: Self) -> Self {
        Self::Pow(Box::new(base), Box::new(exponent))
    }

    /// `f(arg)`.
    #[must_use]
    pub fn func(f: Func, arg: Self) -> Self {
        Self::Func(f, Box::new(arg))
    }

    /// Returns the literal value if this is a number.
    #[must_use]
    pub const fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this is the literal `value`.
    #[must_use]
    pub fn is_num(&self, value: f64) -> bool {
        self.as_num().is_some_and(|v| (v - value).abs() < f64::EPSILON)
    }

    /// Collects the free symbols, sorted.
    #[must_use]
    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Num(_) | Self::Const(_) => {},
            Self::Sym(name) => {
                out.insert(name.clone());
            },
            Self::Add(items) | Self::Mul(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            },
            Self::Pow(base, exp) => {
                base.collect_symbols(out);
                exp.collect_symbols(out);
            },
            Self::Func(_, arg) => arg.collect_symbols(out),
        }
    }

    /// Whether `var` occurs anywhere in the expression.
    #[must_use]
    pub fn contains(&self, var: &str) -> bool {
        match self {
            Self::Num(_) | Self::Const(_) => false,
            Self::Sym(name) => name == var,
            Self::Add(items) | Self::Mul(items) => items.iter().any(|i| i.contains(var)),
            Self::Pow(base, exp) => base.contains(var) || exp.contains(var),
            Self::Func(_, arg) => arg.contains(var),
        }
    }

    /// Replaces bound symbols with numbers. Unbound symbols are kept.
    #[must_use]
    pub fn substitute(&self, bindings: &BTreeMap<String, f64>) -> Self {
        match self {
            Self::Sym(name) => bindings
                .get(name)
                .map_or_else(|| self.clone(), |v| Self::Num(*v)),
            Self::Num(_) | Self::Const(_) => self.clone(),
            Self::Add(items) => Self::Add(items.iter().map(|i| i.substitute(bindings)).collect()),
            Self::Mul(items) => Self::Mul(items.iter().map(|i| i.substitute(bindings)).collect()),
            Self::Pow(base, exp) => Self::pow(base.substitute(bindings), exp.substitute(bindings)),
            Self::Func(f, arg) => Self::func(*f, arg.substitute(bindings)),
        }
    }

    /// Evaluates numerically. Every free symbol must be bound.
    pub fn evaluate(&self, bindings: &BTreeMap<String, f64>) -> Result<f64, EngineError> {
        let value = match self {
            Self::Num(v) => *v,
            Self::Const(c) => c.value(),
            Self::Sym(name) => *bindings
                .get(name)
                .ok_or_else(|| EngineError::NonNumeric(format!("unbound symbol '{name}'")))?,
            Self::Add(items) => items
                .iter()
                .map(|i| i.evaluate(bindings))
                .sum::<Result<f64, _>>()?,
            Self::Mul(items) => items
                .iter()
                .map(|i| i.evaluate(bindings))
                .product::<Result<f64, _>>()?,
            Self::Pow(base, exp) => base.evaluate(bindings)?.powf(exp.evaluate(bindings)?),
            Self::Func(f, arg) => f.apply(arg.evaluate(bindings)?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_symbols_sorted() {
        let e = Expr::add(
            Expr::mul(Expr::sym("y"), Expr::sym("x")),
            Expr::func(Func::Sin, Expr::sym("z")),
        );
        let vars: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(vars, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_constants_are_not_symbols() {
        let e = Expr::pow(Expr::Const(Constant::E), Expr::sym("x"));
        assert_eq!(e.free_symbols().len(), 1);
    }

    #[test]
    fn test_evaluate() {
        let e = Expr::sub(Expr::pow(Expr::sym("x"), Expr::num(2.0)), Expr::num(1.0));
        let bindings = BTreeMap::from([("x".to_string(), 3.0)]);
        let value = e.evaluate(&bindings).unwrap();
        assert!((value - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_unbound_fails() {
        let e = Expr::sym("q");
        assert!(e.evaluate(&BTreeMap::new()).is_err());
    }

    #[test]
    fn test_substitute_keeps_unbound() {
        let e = Expr::mul(Expr::sym("x"), Expr::sym("y"));
        let bindings = BTreeMap::from([("x".to_string(), 2.0)]);
        let out = e.substitute(&bindings);
        assert_eq!(out, Expr::mul(Expr::num(2.0), Expr::sym("y")));
    }
}
