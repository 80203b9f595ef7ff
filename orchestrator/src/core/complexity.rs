//! Additive complexity score used by the strategy router.

use crate::core::classifier::classify;
use crate::core::types::{ProblemCategory, ProblemInstance, Route};

/// Upper bound of the score.
pub const MAX_SCORE: u8 = 10;
/// Statements longer than this many characters count as long.
pub const LONG_STATEMENT_CHARS: usize = 1000;
/// More failing tests than this counts as a wide change.
pub const MANY_TESTS: usize = 5;

/// Score `instance` on a `0..=10` scale.
///
/// | factor                                   | points |
/// |------------------------------------------|--------|
/// | statement longer than 1000 characters    | +2     |
/// | more than 5 fail-to-pass tests           | +3     |
/// | classified as feature or refactor        | +2     |
/// | statement mentions "multiple"            | +2     |
pub fn score(instance: &ProblemInstance) -> u8 {
    let statement = &instance.problem_statement;
    let mut total = 0u8;

    if statement.chars().count() > LONG_STATEMENT_CHARS {
        total += 2;
    }
    if instance.fail_to_pass.len() > MANY_TESTS {
        total += 3;
    }
    if matches!(
        classify(statement),
        ProblemCategory::Feature | ProblemCategory::Refactor
    ) {
        total += 2;
    }
    if statement.to_lowercase().contains("multiple") {
        total += 2;
    }

    total.min(MAX_SCORE)
}

/// Routes reachable from a score. Custom workflows are never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoredRoute {
    Minimal,
    ToolChain,
    Phased,
}

impl From<ScoredRoute> for Route {
    fn from(route: ScoredRoute) -> Self {
        match route {
            ScoredRoute::Minimal => Route::Minimal,
            ScoredRoute::ToolChain => Route::ToolChain,
            ScoredRoute::Phased => Route::Phased,
        }
    }
}

/// Map a score onto the workflow shape the hybrid strategy runs.
pub fn route_for_score(score: u8) -> ScoredRoute {
    match score {
        0..=2 => ScoredRoute::Minimal,
        3..=6 => ScoredRoute::ToolChain,
        _ => ScoredRoute::Phased,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::instance;

    fn tests(count: usize) -> Vec<String> {
        (0..count)
            .map(|idx| format!("tests/test_mod.py::test_case_{idx}"))
            .collect()
    }

    #[test]
    fn long_feature_with_many_tests_scores_seven() {
        let statement = format!("Implement {}", "x".repeat(1490));
        assert_eq!(statement.len(), 1500);
        let inst = instance("feat", &statement, tests(6));
        assert_eq!(score(&inst), 7);
        assert_eq!(route_for_score(score(&inst)), ScoredRoute::Phased);
    }

    #[test]
    fn short_plain_statement_scores_zero() {
        let inst = instance("plain", "it crashes", Vec::new());
        assert_eq!(score(&inst), 0);
        assert_eq!(route_for_score(0), ScoredRoute::Minimal);
    }

    #[test]
    fn all_factors_reach_nine_and_never_exceed_max() {
        let statement = format!("Add MULTIPLE handlers {}", "y".repeat(1200));
        let inst = instance("all", &statement, tests(40));
        assert_eq!(score(&inst), 9);
        assert!(score(&inst) <= MAX_SCORE);
    }

    #[test]
    fn each_factor_is_monotonic() {
        let base = instance("base", "the output looks odd", tests(1));
        let base_score = score(&base);

        let longer = instance(
            "long",
            &format!("the output looks odd {}", "z".repeat(1100)),
            tests(1),
        );
        assert!(score(&longer) >= base_score);

        let more_tests = instance("tests", "the output looks odd", tests(9));
        assert!(score(&more_tests) >= base_score);

        let multiple = instance("multi", "the output looks odd in multiple places", tests(1));
        assert!(score(&multiple) >= base_score);

        let refactor = instance("refactor", "refactor: the output looks odd", tests(1));
        assert!(score(&refactor) >= base_score);
    }

    #[test]
    fn thresholds_are_strict() {
        let exact_length = instance("edge", &"q".repeat(LONG_STATEMENT_CHARS), tests(MANY_TESTS));
        assert_eq!(score(&exact_length), 0);
    }

    #[test]
    fn routes_split_at_three_and_seven() {
        assert_eq!(route_for_score(2), ScoredRoute::Minimal);
        assert_eq!(route_for_score(3), ScoredRoute::ToolChain);
        assert_eq!(route_for_score(6), ScoredRoute::ToolChain);
        assert_eq!(route_for_score(7), ScoredRoute::Phased);
        assert_eq!(route_for_score(10), ScoredRoute::Phased);
    }
}
