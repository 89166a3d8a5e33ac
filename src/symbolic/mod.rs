//! Symbolic engine.
//!
//! The resolution cascade talks to the engine only through
//! [`SymbolicEngine`]; [`NativeEngine`] is the bundled implementation.
//!
//! | Capability | Module |
//! |------------|--------|
//! | Parsing informal notation | [`parser`] |
//! | Differentiation | [`calculus`] |
//! | Canonical simplification | [`simplify`] |
//! | Linear and polynomial solving | [`solve`] |
//! | Plain text and LaTeX output | [`display`] |

pub mod calculus;
pub mod display;
pub mod expr;
pub mod parser;
pub mod simplify;
pub mod solve;

pub use expr::{Constant, Expr, Func};

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Failures raised by the symbolic engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The expression text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The problem has no solution (inconsistent system, no critical point).
    #[error("no solution: {0}")]
    NoSolution(String),

    /// The engine cannot handle this kind of problem.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Operand shapes do not agree.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A numeric value was required but the expression still has free symbols.
    #[error("not numeric: {0}")]
    NonNumeric(String),
}

/// An equation `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    /// Left-hand side.
    pub lhs: Expr,
    /// Right-hand side.
    pub rhs: Expr,
}

impl Equation {
    /// Creates an equation.
    #[must_use]
    pub const fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    /// `lhs - rhs`, which is zero exactly when the equation holds.
    #[must_use]
    pub fn residual(&self) -> Expr {
        Expr::sub(self.lhs.clone(), self.rhs.clone())
    }
}

/// Rows of expressions.
pub type Matrix = Vec<Vec<Expr>>;

/// One solution of a system, keyed by variable name.
pub type Solution = BTreeMap<String, Expr>;

/// Symbolic-algebra operations used by the dispatch table.
///
/// Only the primitive operations are required; matrix assembly, substitution,
/// evaluation and symbol collection have default implementations in terms of
/// them.
pub trait SymbolicEngine: Send + Sync {
    /// Parses expression text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Parse`] on malformed input.
    fn parse(&self, text: &str) -> Result<Expr, EngineError>;

    /// Derivative of `expr` with respect to `var`, unsimplified.
    fn differentiate(&self, expr: &Expr, var: &str) -> Expr;

    /// Canonical simplified form.
    fn simplify(&self, expr: &Expr) -> Expr;

    /// Solves equations simultaneously over `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoSolution`] for inconsistent systems and
    /// [`EngineError::Unsupported`] for systems outside the engine's reach.
    fn solve_system(&self, equations: &[Equation], vars: &[String]) -> Result<Vec<Solution>, EngineError>;

    /// Plain-text rendering.
    fn to_display(&self, expr: &Expr) -> String;

    /// LaTeX rendering.
    fn to_latex(&self, expr: &Expr) -> String;

    /// Matrix of simplified partials `∂exprs[i] / ∂vars[j]`.
    fn jacobian(&self, exprs: &[Expr], vars: &[String]) -> Matrix {
        exprs
            .iter()
            .map(|e| {
                vars.iter()
                    .map(|v| self.simplify(&self.differentiate(e, v)))
                    .collect()
            })
            .collect()
    }

    /// Matrix of simplified second partials of `expr` over `vars`.
    fn hessian(&self, expr: &Expr, vars: &[String]) -> Matrix {
        vars.iter()
            .map(|vi| {
                let first = self.differentiate(expr, vi);
                vars.iter()
                    .map(|vj| self.simplify(&self.differentiate(&first, vj)))
                    .collect()
            })
            .collect()
    }

    /// `[a, b, c]`.
    fn vector_display(&self, items: &[Expr]) -> String {
        let inner: Vec<String> = items.iter().map(|e| self.to_display(e)).collect();
        format!("[{}]", inner.join(", "))
    }

    /// `[[a, b], [c, d]]`.
    fn matrix_display(&self, rows: &[Vec<Expr>]) -> String {
        let inner: Vec<String> = rows.iter().map(|r| self.vector_display(r)).collect();
        format!("[{}]", inner.join(", "))
    }

    /// Column vector in a `bmatrix`.
    fn vector_latex(&self, items: &[Expr]) -> String {
        let inner: Vec<String> = items.iter().map(|e| self.to_latex(e)).collect();
        format!("\\begin{{bmatrix}} {} \\end{{bmatrix}}", inner.join(" \\\\ "))
    }

    /// Matrix in a `bmatrix`.
    fn matrix_latex(&self, rows: &[Vec<Expr>]) -> String {
        let inner: Vec<String> = rows
            .iter()
            .map(|r| r.iter().map(|e| self.to_latex(e)).collect::<Vec<_>>().join(" & "))
            .collect();
        format!("\\begin{{bmatrix}} {} \\end{{bmatrix}}", inner.join(" \\\\ "))
    }

    /// Binds symbols to numbers and simplifies.
    fn substitute(&self, expr: &Expr, bindings: &BTreeMap<String, f64>) -> Expr {
        self.simplify(&expr.substitute(bindings))
    }

    /// Numeric value with every free symbol bound.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NonNumeric`] if a symbol is left unbound.
    fn evaluate(&self, expr: &Expr, bindings: &BTreeMap<String, f64>) -> Result<f64, EngineError> {
        expr.evaluate(bindings)
    }

    /// Sorted free symbols.
    fn free_symbols(&self, expr: &Expr) -> BTreeSet<String> {
        expr.free_symbols()
    }
}

/// The bundled pure-Rust engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    /// Creates the engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SymbolicEngine for NativeEngine {
    fn parse(&self, text: &str) -> Result<Expr, EngineError> {
        parser::parse(text)
    }

    fn differentiate(&self, expr: &Expr, var: &str) -> Expr {
        calculus::differentiate(expr, var)
    }

    fn simplify(&self, expr: &Expr) -> Expr {
        simplify::simplify(expr)
    }

    fn solve_system(&self, equations: &[Equation], vars: &[String]) -> Result<Vec<Solution>, EngineError> {
        solve::solve_system(equations, vars)
    }

    fn to_display(&self, expr: &Expr) -> String {
        display::to_display(expr)
    }

    fn to_latex(&self, expr: &Expr) -> String {
        display::to_latex(expr)
    }
}
