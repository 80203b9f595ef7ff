//! Deterministic classification of problem statements.

use crate::core::types::ProblemCategory;

/// Keyword sets in priority order. The first set with a substring hit wins.
///
/// Sets are disjoint; `optimize` counts as a refactor signal only.
const KEYWORDS: [(ProblemCategory, &[&str]); 6] = [
    (
        ProblemCategory::BugFix,
        &["error", "exception", "fail", "crash", "bug", "broken"],
    ),
    (
        ProblemCategory::Feature,
        &["add", "implement", "support", "feature", "new"],
    ),
    (
        ProblemCategory::Refactor,
        &["refactor", "improve", "optimize", "cleanup"],
    ),
    (
        ProblemCategory::TestFix,
        &["test", "coverage", "assert", "mock"],
    ),
    (
        ProblemCategory::Documentation,
        &["document", "docstring", "comment", "readme"],
    ),
    (
        ProblemCategory::Performance,
        &["performance", "speed", "slow"],
    ),
];

/// Classify a problem statement into a [`ProblemCategory`].
///
/// - Matching is case-insensitive substring search.
/// - Keyword sets are checked in priority order (bug fix first).
/// - Text without any keyword defaults to `BugFix`.
pub fn classify(problem_text: &str) -> ProblemCategory {
    let lowered = problem_text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| lowered.contains(word)))
        .map(|(category, _)| *category)
        .unwrap_or(ProblemCategory::BugFix)
}

/// Keywords registered for `category`.
pub fn keywords_for(category: ProblemCategory) -> &'static [&'static str] {
    KEYWORDS
        .iter()
        .find(|(candidate, _)| *candidate == category)
        .map(|(_, words)| *words)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_only_keywords_classify_as_feature() {
        for word in keywords_for(ProblemCategory::Feature) {
            let text = format!("Please {word} this");
            assert_eq!(classify(&text), ProblemCategory::Feature, "{text}");
        }
        assert_eq!(
            classify("Implement SUPPORT for a NEW feature"),
            ProblemCategory::Feature
        );
    }

    #[test]
    fn text_without_keywords_defaults_to_bug_fix() {
        assert_eq!(classify(""), ProblemCategory::BugFix);
        assert_eq!(
            classify("The widget looks odd on Tuesdays"),
            ProblemCategory::BugFix
        );
    }

    #[test]
    fn priority_order_prefers_earlier_sets() {
        assert_eq!(
            classify("Add a flag; currently it raises an exception"),
            ProblemCategory::BugFix
        );
        assert_eq!(
            classify("Refactor the parser and mock the lexer"),
            ProblemCategory::Refactor
        );
    }

    #[test]
    fn each_category_is_reachable() {
        assert_eq!(classify("cleanup the module"), ProblemCategory::Refactor);
        assert_eq!(classify("raise coverage"), ProblemCategory::TestFix);
        assert_eq!(classify("update the readme"), ProblemCategory::Documentation);
        assert_eq!(classify("this is too slow"), ProblemCategory::Performance);
    }

    #[test]
    fn keyword_sets_are_disjoint() {
        for (left_idx, (_, left)) in KEYWORDS.iter().enumerate() {
            for (_, right) in KEYWORDS.iter().skip(left_idx + 1) {
                for word in *left {
                    assert!(!right.contains(word), "{word} appears twice");
                }
            }
        }
    }
}
