//! Intent routing.

use crate::models::{Route, SubProblem};

/// Selects the symbolic handler for a sub-problem.
///
/// Total and pure: a sub-problem with no recognised operation routes to
/// [`Route::Unsupported`].
///
/// # Examples
///
/// ```
/// use quantix::services::{classify_route, parse_problem};
/// use quantix::Route;
///
/// assert_eq!(classify_route(&parse_problem("gradient of x*y")), Route::Gradient);
/// assert_eq!(classify_route(&parse_problem("tell me a story")), Route::Unsupported);
/// ```
#[must_use]
pub const fn classify_route(problem: &SubProblem) -> Route {
    Route::from_operation(problem.operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, Topic};
    use std::collections::BTreeSet;

    #[test]
    fn test_classify_route_follows_operation() {
        for operation in Operation::all() {
            let problem = SubProblem::new("some problem text", Some(*operation), Topic::Unknown, BTreeSet::new());
            assert_eq!(classify_route(&problem).as_str(), operation.as_str());
        }
    }

    #[test]
    fn test_classify_route_ignores_stale_route() {
        let mut problem = SubProblem::new("some problem text", None, Topic::Unknown, BTreeSet::new());
        problem.route = Route::Hessian;
        assert_eq!(classify_route(&problem), Route::Unsupported);
    }
}
