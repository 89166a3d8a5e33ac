//! Equation solving.
//!
//! Linear systems go through Gaussian elimination with partial pivoting.
//! A single nonlinear equation in one unknown is solved exactly when it is a
//! polynomial of degree two or less, by derivative bracketing for higher
//! degree polynomials, and by a sign-change scan otherwise. Small nonlinear
//! systems fall back to Newton iteration from a grid of starting points.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

use super::calculus::differentiate;
use super::display::as_rational;
use super::expr::Expr;
use super::simplify::simplify;
use super::{EngineError, Equation, Solution};
use std::collections::BTreeMap;

/// Highest polynomial degree recognised for exact coefficient extraction.
const MAX_DEGREE: usize = 10;

/// Interval scanned for roots of non-polynomial equations.
const SCAN_RANGE: (f64, f64) = (-10.0, 10.0);
const SCAN_STEPS: usize = 4000;

/// Newton iteration is attempted for at most this many unknowns.
const MAX_NEWTON_VARS: usize = 3;
const NEWTON_STARTS: [f64; 6] = [-3.0, -1.0, -0.5, 0.5, 1.0, 3.0];
const NEWTON_ITERATIONS: usize = 60;

const TOLERANCE: f64 = 1e-9;

/// Solves `equations` simultaneously for `vars`.
///
/// Returns every real solution found, each mapping variable to value.
pub fn solve_system(equations: &[Equation], vars: &[String]) -> Result<Vec<Solution>, EngineError> {
    if equations.is_empty() {
        return Err(EngineError::NoSolution("no equations given".to_string()));
    }
    if vars.is_empty() {
        return Err(EngineError::Unsupported("no unknowns to solve for".to_string()));
    }

    let residuals: Vec<Expr> = equations.iter().map(|eq| simplify(&eq.residual())).collect();
    for residual in &residuals {
        if let Some(stray) = residual.free_symbols().into_iter().find(|s| !vars.contains(s)) {
            return Err(EngineError::Unsupported(format!(
                "symbol '{stray}' is not among the unknowns"
            )));
        }
    }

    if let Some(rows) = residuals
        .iter()
        .map(|r| linear_coefficients(r, vars))
        .collect::<Option<Vec<_>>>()
    {
        let values = gaussian_elimination(rows, vars.len())?;
        return Ok(vec![to_solution(vars, &values)]);
    }

    if vars.len() == 1 {
        return solve_univariate(&residuals, &vars[0]);
    }
    if vars.len() <= MAX_NEWTON_VARS && residuals.len() == vars.len() {
        let roots = newton_roots(&residuals, vars);
        if roots.is_empty() {
            return Err(EngineError::NoSolution("no real root found".to_string()));
        }
        return Ok(roots.iter().map(|r| to_solution(vars, r)).collect());
    }
    Err(EngineError::Unsupported(format!(
        "nonlinear system of {} equations in {} unknowns",
        residuals.len(),
        vars.len()
    )))
}

fn to_solution(vars: &[String], values: &[f64]) -> Solution {
    vars.iter()
        .zip(values)
        .map(|(v, x)| (v.clone(), Expr::num(tidy(*x))))
        .collect()
}

/// Snaps values within rounding error of a simple fraction.
fn tidy(v: f64) -> f64 {
    match as_rational(v) {
        Some((p, q)) => p as f64 / q as f64,
        None => v,
    }
}

fn bind(vars: &[String], values: &[f64]) -> BTreeMap<String, f64> {
    vars.iter().cloned().zip(values.iter().copied()).collect()
}

/// Coefficients `a` and constant `c` with `residual = a·vars + c`, or `None`
/// when the residual is not linear in `vars`.
fn linear_coefficients(residual: &Expr, vars: &[String]) -> Option<(Vec<f64>, f64)> {
    let mut coefficients = Vec::with_capacity(vars.len());
    for var in vars {
        let slope = simplify(&differentiate(residual, var));
        coefficients.push(slope.as_num()?);
    }
    let origin = bind(vars, &vec![0.0; vars.len()]);
    let constant = residual.evaluate(&origin).ok()?;
    constant.is_finite().then_some((coefficients, constant))
}

fn gaussian_elimination(rows: Vec<(Vec<f64>, f64)>, n: usize) -> Result<Vec<f64>, EngineError> {
    let mut m: Vec<Vec<f64>> = rows
        .into_iter()
        .map(|(mut a, c)| {
            a.push(-c);
            a
        })
        .collect();

    let mut pivot_row = 0;
    let mut pivot_cols = Vec::with_capacity(n);
    for col in 0..n {
        if pivot_row == m.len() {
            break;
        }
        let best = (pivot_row..m.len())
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(pivot_row);
        if m[best][col].abs() < TOLERANCE {
            continue;
        }
        m.swap(pivot_row, best);
        for r in 0..m.len() {
            if r == pivot_row {
                continue;
            }
            let factor = m[r][col] / m[pivot_row][col];
            if factor != 0.0 {
                for k in col..=n {
                    m[r][k] -= factor * m[pivot_row][k];
                }
            }
        }
        pivot_cols.push(col);
        pivot_row += 1;
    }

    // A zero row with a non-zero right-hand side is a contradiction.
    if m[pivot_row..].iter().any(|row| row[n].abs() > 1e-7) {
        return Err(EngineError::NoSolution("the system is inconsistent".to_string()));
    }
    if pivot_cols.len() < n {
        return Err(EngineError::Unsupported(
            "the system is underdetermined".to_string(),
        ));
    }

    let mut values = vec![0.0; n];
    for (row, &col) in pivot_cols.iter().enumerate() {
        values[col] = m[row][n] / m[row][col];
    }
    Ok(values)
}

fn solve_univariate(residuals: &[Expr], var: &str) -> Result<Vec<Solution>, EngineError> {
    let candidates = real_roots(&residuals[0], var)?;
    let vars = [var.to_string()];
    let roots: Vec<Solution> = candidates
        .into_iter()
        .filter(|x| {
            residuals[1..].iter().all(|r| {
                r.evaluate(&bind(&vars, &[*x]))
                    .is_ok_and(|v| v.abs() < 1e-6)
            })
        })
        .map(|x| to_solution(&vars, &[x]))
        .collect();
    if roots.is_empty() {
        return Err(EngineError::NoSolution(format!("no real value of {var} satisfies the system")));
    }
    Ok(roots)
}

/// Real roots of `expr = 0` in one unknown, ascending.
pub fn real_roots(expr: &Expr, var: &str) -> Result<Vec<f64>, EngineError> {
    let roots = match polynomial_coefficients(expr, var) {
        Some(coefficients) => polynomial_roots(&coefficients)?,
        None => scan_roots(expr, var),
    };
    Ok(dedupe(roots))
}

fn dedupe(mut roots: Vec<f64>) -> Vec<f64> {
    roots.sort_by(f64::total_cmp);
    roots.dedup_by(|a, b| (*a - *b).abs() < 1e-7);
    roots
}

/// Structural degree of a polynomial in `var`, or `None` if not polynomial.
fn polynomial_degree(expr: &Expr, var: &str) -> Option<usize> {
    if !expr.contains(var) {
        return Some(0);
    }
    match expr {
        Expr::Num(_) | Expr::Const(_) => Some(0),
        Expr::Sym(name) => (name == var).then_some(1),
        Expr::Add(terms) => terms
            .iter()
            .map(|t| polynomial_degree(t, var))
            .try_fold(0, |acc, d| d.map(|d| acc.max(d))),
        Expr::Mul(factors) => factors
            .iter()
            .map(|f| polynomial_degree(f, var))
            .try_fold(0, |acc, d| d.map(|d| acc + d)),
        Expr::Pow(base, exp) => {
            let n = exp.as_num()?;
            if n < 0.0 || n.fract() != 0.0 || n > MAX_DEGREE as f64 {
                return None;
            }
            let base_degree = polynomial_degree(base, var)?;
            Some(base_degree * n as usize)
        },
        Expr::Func(_, arg) => (!arg.contains(var)).then_some(0),
    }
}

/// Coefficients in ascending order of power, via Taylor expansion at zero.
fn polynomial_coefficients(expr: &Expr, var: &str) -> Option<Vec<f64>> {
    let degree = polynomial_degree(expr, var)?;
    if degree > MAX_DEGREE {
        return None;
    }
    let origin = BTreeMap::from([(var.to_string(), 0.0)]);
    let mut coefficients = Vec::with_capacity(degree + 1);
    let mut current = expr.clone();
    let mut factorial = 1.0;
    for k in 0..=degree {
        if k > 0 {
            factorial *= k as f64;
            current = simplify(&differentiate(&current, var));
        }
        coefficients.push(current.evaluate(&origin).ok()? / factorial);
    }
    Some(coefficients)
}

fn evaluate_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn polynomial_roots(coefficients: &[f64]) -> Result<Vec<f64>, EngineError> {
    let mut c = coefficients.to_vec();
    while c.len() > 1 && c.last().is_some_and(|v| v.abs() < TOLERANCE) {
        c.pop();
    }

    match c.len() {
        0 | 1 => {
            if c.first().is_none_or(|v| v.abs() < TOLERANCE) {
                Err(EngineError::Unsupported(
                    "the equation holds for every value".to_string(),
                ))
            } else {
                Err(EngineError::NoSolution("the equation is a contradiction".to_string()))
            }
        },
        2 => Ok(vec![-c[0] / c[1]]),
        3 => {
            let (a, b, k) = (c[2], c[1], c[0]);
            let disc = b.mul_add(b, -4.0 * a * k);
            if disc < -TOLERANCE {
                Ok(Vec::new())
            } else if disc.abs() <= TOLERANCE {
                Ok(vec![-b / (2.0 * a)])
            } else {
                let root = disc.sqrt();
                Ok(vec![(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)])
            }
        },
        _ => Ok(bracket_polynomial_roots(&c)),
    }
}

/// Roots of a polynomial of degree three or more. Roots of the derivative
/// split the real line into monotone pieces, each holding at most one root.
fn bracket_polynomial_roots(c: &[f64]) -> Vec<f64> {
    let derivative: Vec<f64> = c
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, v)| v * k as f64)
        .collect();
    let mut critical = polynomial_roots(&derivative).unwrap_or_default();
    critical.sort_by(f64::total_cmp);

    let lead = c[c.len() - 1];
    let bound = 1.0
        + c[..c.len() - 1]
            .iter()
            .map(|v| (v / lead).abs())
            .fold(0.0, f64::max);

    let mut edges = vec![-bound];
    edges.extend(critical.iter().copied().filter(|x| x.abs() < bound));
    edges.push(bound);

    let f = |x: f64| evaluate_polynomial(c, x);
    let mut roots = Vec::new();
    for pair in edges.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if f(lo).abs() < 1e-9 {
            roots.push(lo);
        }
        if let Some(root) = bisect(&f, lo, hi) {
            roots.push(root);
        }
    }
    if let Some(&last) = edges.last() {
        if f(last).abs() < 1e-9 {
            roots.push(last);
        }
    }
    roots
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> Option<f64> {
    let (mut f_lo, f_hi) = (f(lo), f(hi));
    if !f_lo.is_finite() || !f_hi.is_finite() || f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) < 1e-13 {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

fn scan_roots(expr: &Expr, var: &str) -> Vec<f64> {
    let f = |x: f64| {
        expr.evaluate(&BTreeMap::from([(var.to_string(), x)]))
            .unwrap_or(f64::NAN)
    };
    let (start, end) = SCAN_RANGE;
    let step = (end - start) / SCAN_STEPS as f64;

    let mut roots = Vec::new();
    for i in 0..SCAN_STEPS {
        let lo = (i as f64).mul_add(step, start);
        let hi = lo + step;
        if f(lo).abs() < 1e-12 {
            roots.push(lo);
            continue;
        }
        // Poles also flip sign; keep only genuine zeros.
        if let Some(root) = bisect(&f, lo, hi).filter(|r| f(*r).abs() < 1e-6) {
            roots.push(root);
        }
    }
    roots
}

/// Newton iteration on a square system from every grid starting point.
fn newton_roots(residuals: &[Expr], vars: &[String]) -> Vec<Vec<f64>> {
    let n = vars.len();
    let jacobian: Vec<Vec<Expr>> = residuals
        .iter()
        .map(|r| vars.iter().map(|v| simplify(&differentiate(r, v))).collect())
        .collect();

    let mut starts: Vec<Vec<f64>> = vec![Vec::new()];
    for _ in 0..n {
        starts = starts
            .into_iter()
            .flat_map(|s| {
                NEWTON_STARTS.iter().map(move |x| {
                    let mut next = s.clone();
                    next.push(*x);
                    next
                })
            })
            .collect();
    }

    let mut found: Vec<Vec<f64>> = Vec::new();
    for start in starts {
        let Some(root) = newton(residuals, &jacobian, vars, start) else {
            continue;
        };
        let duplicate = found
            .iter()
            .any(|f| f.iter().zip(&root).all(|(a, b)| (a - b).abs() < 1e-6));
        if !duplicate {
            found.push(root);
        }
    }
    found.sort_by(|a, b| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    found
}

fn newton(residuals: &[Expr], jacobian: &[Vec<Expr>], vars: &[String], mut x: Vec<f64>) -> Option<Vec<f64>> {
    for _ in 0..NEWTON_ITERATIONS {
        let bindings = bind(vars, &x);
        let f: Vec<f64> = residuals
            .iter()
            .map(|r| r.evaluate(&bindings))
            .collect::<Result<_, _>>()
            .ok()?;
        if f.iter().all(|v| v.abs() < 1e-12) {
            return Some(x);
        }
        let rows = jacobian
            .iter()
            .zip(&f)
            .map(|(row, fi)| {
                let coefficients = row
                    .iter()
                    .map(|e| e.evaluate(&bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((coefficients, *fi))
            })
            .collect::<Result<Vec<_>, EngineError>>()
            .ok()?;
        // J·dx = -f
        let delta = gaussian_elimination(rows, vars.len()).ok()?;
        for (xi, di) in x.iter_mut().zip(&delta) {
            *xi += di;
        }
        if x.iter().any(|v| !v.is_finite()) {
            return None;
        }
    }
    let bindings = bind(vars, &x);
    residuals
        .iter()
        .all(|r| r.evaluate(&bindings).is_ok_and(|v| v.abs() < 1e-8))
        .then_some(x)
}
