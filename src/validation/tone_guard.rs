//! Tone guard: deterministic rewriting of forbidden terms to their neutral
//! alternatives in already-generated prose (§4.4 Synthesizer, §4.6).
//!
//! Unlike [`super::vocab_guard::VocabGuard::apply_constraints`], which steers the
//! model away from forbidden words before generation, this operates after the
//! fact on text the model already produced, so it never relies on the model
//! having honored the constraint.

use regex::Regex;

use super::vocab_guard::VocabGuard;

/// A term that was rewritten, for manifest/telemetry recording.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneRewrite {
    pub word: String,
    pub replacement: String,
    pub occurrences: usize,
}

/// Scan `text` for forbidden terms and rewrite each whole-word, case-insensitive
/// occurrence to its alternative (or drop it if no alternative is registered).
/// Returns the rewritten text plus a record of what changed.
pub fn apply_tone_guard(text: &str, guard: &VocabGuard) -> (String, Vec<ToneRewrite>) {
    if guard.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let mut rewritten = text.to_string();
    let mut rewrites = Vec::new();

    for (word, alternative) in guard.alternatives() {
        let pattern = match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&word))) {
            Ok(pattern) => pattern,
            Err(_) => continue,
        };
        let occurrences = pattern.find_iter(&rewritten).count();
        if occurrences == 0 {
            continue;
        }

        let replacement = if alternative.is_empty() {
            first_alternative_fallback(&word)
        } else {
            alternative.clone()
        };
        rewritten = pattern.replace_all(&rewritten, replacement.as_str()).into_owned();
        rewrites.push(ToneRewrite { word, replacement, occurrences });
    }

    (rewritten, rewrites)
}

/// When the vocabulary entry has no registered alternative, fall back to a
/// generic neutral placeholder rather than leaving the forbidden word in place.
fn first_alternative_fallback(word: &str) -> String {
    format!("[{word} removed]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with(yaml: &str) -> VocabGuard {
        VocabGuard::from_yaml(yaml)
    }

    #[test]
    fn rewrites_whole_word_matches() {
        let guard = guard_with("forbidden_words:\n  - word: delve\n    alternative: explore\n");
        let (rewritten, rewrites) = apply_tone_guard("Let's delve into the evidence.", &guard);
        assert_eq!(rewritten, "Let's explore into the evidence.");
        assert_eq!(rewrites.len(), 1);
        assert_eq!(rewrites[0].occurrences, 1);
    }

    #[test]
    fn is_case_insensitive_and_preserves_non_matches() {
        let guard = guard_with("forbidden_words:\n  - word: tapestry\n    alternative: structure\n");
        let (rewritten, _) = apply_tone_guard("A rich Tapestry of tapestry threads.", &guard);
        assert_eq!(rewritten, "A rich structure of structure threads.");
    }

    #[test]
    fn does_not_match_substrings_inside_other_words() {
        let guard = guard_with("forbidden_words:\n  - word: rich\n    alternative: substantial\n");
        let (rewritten, rewrites) = apply_tone_guard("enrichment is not the same word", &guard);
        assert_eq!(rewritten, "enrichment is not the same word");
        assert!(rewrites.is_empty());
    }

    #[test]
    fn missing_alternative_falls_back_to_placeholder() {
        let guard = guard_with("forbidden_words:\n  - word: boilerplate\n");
        let (rewritten, _) = apply_tone_guard("this is boilerplate text", &guard);
        assert_eq!(rewritten, "this is [boilerplate removed] text");
    }

    #[test]
    fn empty_guard_is_noop() {
        let guard = VocabGuard::default();
        let (rewritten, rewrites) = apply_tone_guard("delve into this", &guard);
        assert_eq!(rewritten, "delve into this");
        assert!(rewrites.is_empty());
    }
}
