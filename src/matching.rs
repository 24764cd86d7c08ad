//! Answer text matching
//!
//! Decides whether a question's stored answer names the target word, and
//! normalizes option text so "B) Candid " and "candid" compare equal.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::AnswerPolicy;

/// Leading or trailing punctuation, quotes, and whitespace
static EDGE_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^[\p{P}\s"“”‘’]+|[\p{P}\s"“”‘’]+$"#).unwrap());

/// Option markers such as "A.", "b)", "C:"
static OPTION_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?i)[a-d][.):]\s*").unwrap());

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, collapse whitespace, strip edge punctuation and quotes
pub fn normalized_comparable(s: &str) -> String {
    let collapsed = collapse_whitespace(&s.trim().to_lowercase());
    EDGE_PUNCTUATION.replace_all(&collapsed, "").into_owned()
}

/// Option text with any leading "A." style markers removed
pub fn normalized_option_text(s: &str) -> String {
    let mut text = s.trim();
    while let Some(marker) = OPTION_MARKER.find(text) {
        if marker.end() == text.len() {
            break;
        }
        text = text[marker.end()..].trim_start();
    }
    collapse_whitespace(&text.to_lowercase())
}

/// Whether `answer` names `target` under the given policy.
///
/// Blank input on either side never matches.
pub fn answer_matches_target_word(answer: &str, target: &str, policy: AnswerPolicy) -> bool {
    let answer = normalized_comparable(answer);
    let target = normalized_comparable(target);
    if answer.is_empty() || target.is_empty() {
        return false;
    }
    if answer == target {
        return true;
    }

    match policy {
        AnswerPolicy::Exact => false,
        AnswerPolicy::WholeWord if target.contains(' ') => answer.contains(&target),
        AnswerPolicy::WholeWord => {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(&target));
            Regex::new(&pattern)
                .map(|re| re.is_match(&answer))
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalized_comparable("  Indeed, "), "indeed");
        assert_eq!(normalized_comparable("“Scathing”"), "scathing");
        assert_eq!(normalized_comparable("'well   known.'"), "well known");
        assert_eq!(normalized_comparable("self-evident"), "self-evident");
        assert_eq!(normalized_comparable("..."), "");
    }

    #[test]
    fn test_whole_word_policy() {
        let p = AnswerPolicy::WholeWord;
        assert!(answer_matches_target_word("Candid.", "candid", p));
        assert!(answer_matches_target_word("a candid remark", "candid", p));
        assert!(!answer_matches_target_word("candidate", "candid", p));
        assert!(answer_matches_target_word("it was well known by all", "well known", p));
        assert!(!answer_matches_target_word("", "candid", p));
        assert!(!answer_matches_target_word("candid", "  ", p));
    }

    #[test]
    fn test_exact_policy() {
        let p = AnswerPolicy::Exact;
        assert!(answer_matches_target_word(" \"CANDID\" ", "candid", p));
        assert!(!answer_matches_target_word("a candid remark", "candid", p));
    }

    #[test]
    fn test_target_with_regex_metacharacters() {
        assert!(!answer_matches_target_word("use c++ daily", "c++", AnswerPolicy::WholeWord));
        assert!(answer_matches_target_word("c++", "c++", AnswerPolicy::WholeWord));
    }

    #[test]
    fn test_option_markers_are_dropped() {
        assert_eq!(normalized_option_text("B)  Candid   remark"), "candid remark");
        assert_eq!(normalized_option_text("a. tepid"), "tepid");
        assert_eq!(normalized_option_text("C"), "c");
        assert_eq!(normalized_option_text("D:"), "d:");
    }
}
