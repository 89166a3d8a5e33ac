//! Symbolic dispatch table.
//!
//! One handler per [`Route`]. Handlers extract structured input from the
//! sub-problem text (see [`crate::extract`]) and delegate every algebraic
//! operation to the injected [`SymbolicEngine`].

use super::patterns::EXTREMUM_KIND;
use super::router::classify_route;
use crate::extract::{
    ExtractionError, VariableSelection, explicit_variable, extract_bracket_list,
    extract_equations, extract_point, extract_rhs, select_variable,
};
use crate::models::{ResolvedAnswer, Route, SubProblem};
use crate::symbolic::{EngineError, Equation, Expr, Solution, SymbolicEngine};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Output of a successful handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicAnswer {
    /// The computed answer.
    pub final_answer: ResolvedAnswer,
    /// One-sentence summary of what was computed.
    pub explanation: String,
    /// Human-readable steps, in order.
    pub steps: Vec<String>,
}

/// Why a handler could not produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The text did not yield the input the handler needs.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The engine rejected the computation.
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),

    /// No handler exists for the route.
    #[error("no symbolic handler for route '{0}'")]
    Unsupported(Route),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Maximum,
    Minimum,
}

impl Extremum {
    /// `max`/`maxim...` or `min`/`minim...`, whichever appears first; minimum
    /// when neither does.
    fn detect(text: &str) -> Self {
        match EXTREMUM_KIND.captures(text) {
            Some(caps) if caps[1].eq_ignore_ascii_case("max") => Self::Maximum,
            _ => Self::Minimum,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Maximum => "Maximum",
            Self::Minimum => "Minimum",
        }
    }

    fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Maximum => candidate > current,
            Self::Minimum => candidate < current,
        }
    }
}

/// Routes sub-problems to symbolic handlers.
#[derive(Clone)]
pub struct SymbolicDispatch {
    engine: Arc<dyn SymbolicEngine>,
    selection: VariableSelection,
}

impl SymbolicDispatch {
    /// Creates a dispatch table over `engine`.
    #[must_use]
    pub fn new(engine: Arc<dyn SymbolicEngine>) -> Self {
        Self {
            engine,
            selection: VariableSelection::default(),
        }
    }

    /// Sets which variable single-variable routes pick.
    #[must_use]
    pub const fn with_selection(mut self, selection: VariableSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Runs the handler for the sub-problem's route.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unsupported`] for [`Route::Unsupported`], and
    /// the extraction or engine failure of the handler otherwise.
    #[instrument(skip(self, problem), fields(operation = "symbolic_dispatch", route = %problem.route))]
    pub fn dispatch(&self, problem: &SubProblem) -> Result<SymbolicAnswer, DispatchError> {
        let text = problem.text.as_str();
        match classify_route(problem) {
            Route::Derivative => self.derivative(text),
            Route::Gradient => self.gradient(text),
            Route::Jacobian => self.jacobian(text),
            Route::Hessian => self.hessian(text),
            Route::System => self.system(text),
            Route::Optimization => self.optimization(text),
            Route::Unsupported => Err(DispatchError::Unsupported(Route::Unsupported)),
        }
    }

    fn parse(&self, text: &str) -> Result<Expr, DispatchError> {
        self.engine.parse(text).map_err(|err| match err {
            EngineError::Parse(msg) => ExtractionError::Parse(msg).into(),
            other => other.into(),
        })
    }

    /// The single expression a problem is about.
    fn objective(&self, text: &str) -> Result<Expr, DispatchError> {
        self.parse(&extract_rhs(text, false)?)
    }

    fn sorted_variables(&self, exprs: &[&Expr]) -> Result<Vec<String>, DispatchError> {
        let vars: BTreeSet<String> = exprs
            .iter()
            .flat_map(|e| self.engine.free_symbols(e))
            .collect();
        if vars.is_empty() {
            return Err(ExtractionError::NoVariable.into());
        }
        Ok(vars.into_iter().collect())
    }

    fn show(&self, expr: &Expr) -> String {
        self.engine.to_display(expr)
    }

    fn show_bindings(&self, bindings: &BTreeMap<String, f64>) -> String {
        bindings
            .iter()
            .map(|(var, value)| format!("{var} = {}", self.show(&Expr::num(*value))))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn show_solution(&self, solution: &Solution) -> String {
        solution
            .iter()
            .map(|(var, value)| format!("{var} = {}", self.show(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn latex_solution(&self, solution: &Solution) -> String {
        solution
            .iter()
            .map(|(var, value)| format!("{var} = {}", self.engine.to_latex(value)))
            .collect::<Vec<_>>()
            .join(",\\ ")
    }

    fn derivative(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let expr = self.objective(text)?;
        let vars: BTreeSet<String> = self.engine.free_symbols(&expr);
        let var = match explicit_variable(text) {
            Some(var) => var,
            None => select_variable(&vars, self.selection)?,
        };
        let vars: Vec<String> = vars.into_iter().collect();
        Ok(self.differentiate_at(text, &expr, &var, &vars))
    }

    /// Differentiates, simplifies, and substitutes the point named in `text`
    /// when there is one.
    fn differentiate_at(&self, text: &str, expr: &Expr, var: &str, vars: &[String]) -> SymbolicAnswer {
        let derivative = self.engine.simplify(&self.engine.differentiate(expr, var));
        let mut steps = vec![
            format!("Differentiate {} with respect to {var}", self.show(expr)),
            format!("Simplify: {}", self.show(&derivative)),
        ];
        let mut explanation = format!(
            "The derivative of {} with respect to {var} is {}.",
            self.show(expr),
            self.show(&derivative)
        );

        let mut result = derivative;
        if let Some(bindings) = extract_point(text).and_then(|p| p.bind(vars)) {
            result = self.engine.substitute(&result, &bindings);
            let at = self.show_bindings(&bindings);
            steps.push(format!("Substitute {at}: {}", self.show(&result)));
            explanation.push_str(&format!(" At {at} it equals {}.", self.show(&result)));
        }

        SymbolicAnswer {
            final_answer: ResolvedAnswer::new(self.show(&result), self.engine.to_latex(&result)),
            explanation,
            steps,
        }
    }

    fn gradient(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let expr = self.objective(text)?;
        let vars = self.sorted_variables(&[&expr])?;
        if let [var] = vars.as_slice() {
            return Ok(self.differentiate_at(text, &expr, var, &vars));
        }

        let mut steps: Vec<String> = Vec::with_capacity(vars.len() + 1);
        let mut components: Vec<Expr> = vars
            .iter()
            .map(|var| {
                let partial = self.engine.simplify(&self.engine.differentiate(&expr, var));
                steps.push(format!("∂/∂{var}: {}", self.show(&partial)));
                partial
            })
            .collect();

        if let Some(bindings) = extract_point(text).and_then(|p| p.bind(&vars)) {
            components = components
                .iter()
                .map(|c| self.engine.substitute(c, &bindings))
                .collect();
            steps.push(format!("Substitute {}", self.show_bindings(&bindings)));
        }

        let answer = self.engine.vector_display(&components);
        Ok(SymbolicAnswer {
            explanation: format!(
                "The gradient of {} over ({}) is {answer}.",
                self.show(&expr),
                vars.join(", ")
            ),
            final_answer: ResolvedAnswer::new(answer, self.engine.vector_latex(&components)),
            steps,
        })
    }

    fn jacobian(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let components = extract_bracket_list(text)?
            .iter()
            .map(|c| self.parse(c))
            .collect::<Result<Vec<_>, _>>()?;
        let vars = self.sorted_variables(&components.iter().collect::<Vec<_>>())?;

        let matrix = self.engine.jacobian(&components, &vars);
        let answer = self.engine.matrix_display(&matrix);
        Ok(SymbolicAnswer {
            explanation: format!(
                "Row i holds the partial derivatives of component i over ({}).",
                vars.join(", ")
            ),
            steps: vec![
                format!("Components: {}", self.engine.vector_display(&components)),
                format!("Variables: {}", vars.join(", ")),
                format!("Jacobian: {answer}"),
            ],
            final_answer: ResolvedAnswer::new(answer, self.engine.matrix_latex(&matrix)),
        })
    }

    fn hessian(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let expr = self.objective(text)?;
        let vars = self.sorted_variables(&[&expr])?;

        let mut matrix = self.engine.hessian(&expr, &vars);
        let mut steps = vec![
            format!("Variables: {}", vars.join(", ")),
            format!("Second partials: {}", self.engine.matrix_display(&matrix)),
        ];
        if let Some(bindings) = extract_point(text).and_then(|p| p.bind(&vars)) {
            matrix = matrix
                .iter()
                .map(|row| row.iter().map(|e| self.engine.substitute(e, &bindings)).collect())
                .collect();
            steps.push(format!("Substitute {}", self.show_bindings(&bindings)));
        }

        let answer = self.engine.matrix_display(&matrix);
        Ok(SymbolicAnswer {
            explanation: format!("The Hessian of {} is {answer}.", self.show(&expr)),
            final_answer: ResolvedAnswer::new(answer, self.engine.matrix_latex(&matrix)),
            steps,
        })
    }

    fn system(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let equations = extract_equations(text)?
            .iter()
            .map(|(lhs, rhs)| Ok(Equation::new(self.parse(lhs)?, self.parse(rhs)?)))
            .collect::<Result<Vec<_>, DispatchError>>()?;
        let sides: Vec<&Expr> = equations.iter().flat_map(|eq| [&eq.lhs, &eq.rhs]).collect();
        let vars = self.sorted_variables(&sides)?;

        let solutions = self.engine.solve_system(&equations, &vars)?;
        if solutions.is_empty() {
            return Err(EngineError::NoSolution("system has no solution".to_string()).into());
        }

        let mut steps: Vec<String> = equations
            .iter()
            .enumerate()
            .map(|(i, eq)| format!("Equation {}: {} = {}", i + 1, self.show(&eq.lhs), self.show(&eq.rhs)))
            .collect();
        steps.push(format!("Solve for {}", vars.join(", ")));

        let answer = solutions
            .iter()
            .map(|s| self.show_solution(s))
            .collect::<Vec<_>>()
            .join("; ");
        let latex = solutions
            .iter()
            .map(|s| self.latex_solution(s))
            .collect::<Vec<_>>()
            .join(";\\quad ");
        Ok(SymbolicAnswer {
            explanation: format!(
                "Solving the {} equations simultaneously gives {answer}.",
                equations.len()
            ),
            final_answer: ResolvedAnswer::new(answer, latex),
            steps,
        })
    }

    fn optimization(&self, text: &str) -> Result<SymbolicAnswer, DispatchError> {
        let objective = self.objective(text)?;
        let vars = self.sorted_variables(&[&objective])?;
        let kind = Extremum::detect(text);

        let stationary: Vec<Equation> = vars
            .iter()
            .map(|v| {
                let partial = self.engine.simplify(&self.engine.differentiate(&objective, v));
                Equation::new(partial, Expr::num(0.0))
            })
            .collect();
        let critical = self.engine.solve_system(&stationary, &vars)?;

        let mut best: Option<(f64, BTreeMap<String, f64>)> = None;
        let mut candidates = Vec::new();
        for solution in &critical {
            let Some(point) = numeric_point(solution, &vars) else {
                continue;
            };
            let value = self.engine.evaluate(&objective, &point)?;
            if !value.is_finite() {
                continue;
            }
            candidates.push(format!(
                "f({}) = {}",
                self.show_bindings(&point),
                self.show(&Expr::num(value))
            ));
            if best.as_ref().is_none_or(|(current, _)| kind.improves(value, *current)) {
                best = Some((value, point));
            }
        }
        let (value, point) = best.ok_or_else(|| {
            EngineError::NoSolution(format!("no critical points of {}", self.show(&objective)))
        })?;

        let value_expr = Expr::num(value);
        let at = self.show_bindings(&point);
        let latex_at = point
            .iter()
            .map(|(var, v)| format!("{var} = {}", self.engine.to_latex(&Expr::num(*v))))
            .collect::<Vec<_>>()
            .join(",\\ ");
        let answer = format!("{} of {} at {at}", kind.label(), self.show(&value_expr));
        let latex = format!(
            "\\text{{{} of }} {} \\text{{ at }} {latex_at}",
            kind.label(),
            self.engine.to_latex(&value_expr)
        );

        let mut steps: Vec<String> = stationary
            .iter()
            .map(|eq| format!("Set {} = 0", self.show(&eq.lhs)))
            .collect();
        steps.push(format!("Critical points: {}", candidates.join("; ")));
        steps.push(format!("Select the {}", kind.label().to_lowercase()));

        Ok(SymbolicAnswer {
            explanation: format!(
                "{} value of {} is {} at {at}.",
                kind.label(),
                self.show(&objective),
                self.show(&value_expr)
            ),
            final_answer: ResolvedAnswer::new(answer, latex),
            steps,
        })
    }
}

/// Numeric coordinates of a solution, when every variable is bound to a number.
fn numeric_point(solution: &Solution, vars: &[String]) -> Option<BTreeMap<String, f64>> {
    vars.iter()
        .map(|var| Some((var.clone(), solution.get(var)?.as_num()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::splitter::parse_problem;
    use crate::symbolic::NativeEngine;
    use test_case::test_case;

    fn dispatch() -> SymbolicDispatch {
        SymbolicDispatch::new(Arc::new(NativeEngine::new()))
    }

    fn answer(text: &str) -> String {
        dispatch()
            .dispatch(&parse_problem(text))
            .map(|a| a.final_answer.text)
            .unwrap_or_else(|e| panic!("{text}: {e}"))
    }

    #[test_case("derivative of x^2", "2*x"; "square")]
    #[test_case("Find the derivative of f(x) = x^3 at x = 2", "12"; "at point")]
    #[test_case("Find the derivative of x^3 at (2)", "12"; "positional point")]
    #[test_case("partial derivative of x^2*y with respect to y", "x^2"; "explicit variable")]
    #[test_case("d/dy (x*y)", "x"; "operator variable")]
    #[test_case("differentiate 3x + 2", "3"; "linear")]
    fn test_derivative(text: &str, expected: &str) {
        assert_eq!(answer(text), expected);
    }

    #[test]
    fn test_derivative_picks_last_variable_when_configured() {
        let dispatch = dispatch().with_selection(VariableSelection::Last);
        let result = dispatch.dispatch(&parse_problem("derivative of x*y^2")).unwrap();
        assert_eq!(result.final_answer.text, "2*x*y");
    }

    #[test]
    fn test_gradient_single_variable_is_scalar() {
        assert_eq!(answer("gradient of 3*x + 2"), "3");
    }

    #[test]
    fn test_gradient_vector() {
        assert_eq!(answer("gradient of x^2 + y^2"), "[2*x, 2*y]");
        assert_eq!(answer("gradient of x^2 + y^2 at (1, 2)"), "[2, 4]");
    }

    #[test]
    fn test_jacobian() {
        let result = dispatch().dispatch(&parse_problem("jacobian of [x*y, x+y]")).unwrap();
        assert_eq!(result.final_answer.text, "[[y, x], [1, 1]]");
        assert!(result.final_answer.latex.contains("bmatrix"));
    }

    #[test]
    fn test_jacobian_without_brackets() {
        let err = dispatch().dispatch(&parse_problem("jacobian of x*y, x+y")).unwrap_err();
        assert_eq!(err, DispatchError::Extraction(ExtractionError::MissingBracketList));
    }

    #[test]
    fn test_hessian() {
        assert_eq!(answer("hessian of x^2*y + y^3"), "[[2*y, 2*x], [2*x, 6*y]]");
    }

    #[test]
    fn test_system() {
        assert_eq!(answer("Solve x + y = 3, x - y = 1"), "x = 2, y = 1");
    }

    #[test]
    fn test_inconsistent_system() {
        let err = dispatch()
            .dispatch(&parse_problem("x + y = 1 and x + y = 2"))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Engine(EngineError::NoSolution(_))));
    }

    #[test_case("Maximize -x^2 + x", "Maximum of 1/4 at x = 1/2"; "maximum")]
    #[test_case("Find the minimum of x^2 - 4x + 1", "Minimum of -3 at x = 2"; "minimum")]
    #[test_case("find the critical points of x^2 + y^2", "Minimum of 0 at x = 0, y = 0"; "default minimum")]
    fn test_optimization(text: &str, expected: &str) {
        assert_eq!(answer(text), expected);
    }

    #[test]
    fn test_optimization_without_critical_points() {
        let err = dispatch().dispatch(&parse_problem("maximize 3x + 2")).unwrap_err();
        assert!(matches!(err, DispatchError::Engine(EngineError::NoSolution(_))));
    }

    #[test]
    fn test_unsupported_route() {
        let err = dispatch().dispatch(&parse_problem("integrate x^2 from 0 to 1")).unwrap_err();
        assert_eq!(err, DispatchError::Unsupported(Route::Unsupported));
    }

    #[test]
    fn test_parse_failure_is_extraction_error() {
        let err = dispatch().dispatch(&parse_problem("derivative of (x^2")).unwrap_err();
        assert!(matches!(err, DispatchError::Extraction(ExtractionError::Parse(_))));
    }

    #[test]
    fn test_steps_are_recorded() {
        let result = dispatch().dispatch(&parse_problem("derivative of x^2")).unwrap();
        assert_eq!(result.steps[0], "Differentiate x^2 with respect to x");
        assert!(result.explanation.contains("2*x"));
    }
}
