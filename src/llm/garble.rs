//! Garble detector for low-precision (fp4) expert output (§4.2 "Garble detection").
//!
//! Quantized workers occasionally emit degenerate text: a word tripled in
//! immediate succession, or a flood of non-alphanumeric/special characters.
//! None of this requires an LLM to catch, and structured JSON responses are
//! exempt since compact payloads naturally skew non-alphanumeric.

const MIN_LENGTH: usize = 10;
const ALPHANUMERIC_FLOOR: f64 = 0.3;
const SPECIAL_CHAR_CEILING: f64 = 0.5;

/// Returns true if `text` looks like degenerate fp4 output rather than a real response.
pub fn is_garbled(text: &str) -> bool {
    if text.is_empty() || text.chars().count() < MIN_LENGTH {
        return false;
    }

    let stripped = text.trim_start();
    if stripped.starts_with('{') || stripped.starts_with('[') {
        return false;
    }

    if has_word_tripled(text) {
        return true;
    }

    let total = text.chars().count() as f64;
    let alphanumeric = text.chars().filter(|c| c.is_alphanumeric()).count() as f64;
    if alphanumeric / total < ALPHANUMERIC_FLOOR {
        return true;
    }

    let special = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count() as f64;
    if special / total > SPECIAL_CHAR_CEILING {
        return true;
    }

    false
}

/// Three identical words in immediate succession, e.g. `"the the the"`.
fn has_word_tripled(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 3 {
        return false;
    }
    words.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_never_garbled() {
        assert!(!is_garbled(""));
        assert!(!is_garbled("too short"));
    }

    #[test]
    fn structured_json_is_exempt_even_if_dense() {
        let json = r#"{"triples":[{"subject":"#{%^&*"}]}"#;
        assert!(!is_garbled(json));
    }

    #[test]
    fn normal_prose_is_not_garbled() {
        let text = "The extracted claim states that input validation mitigates injection attacks, \
                     with supporting evidence drawn from page 4 of the source document.";
        assert!(!is_garbled(text));
    }

    #[test]
    fn tripled_word_is_garbled() {
        assert!(is_garbled("the the the the the the the the the the"));
    }

    #[test]
    fn low_alphanumeric_ratio_is_garbled() {
        let text = "!!! @@@ ### $$$ %%% ^^^ &&& *** ((( )))";
        assert!(is_garbled(text));
    }

    #[test]
    fn short_legitimate_repetition_is_not_garbled() {
        let text = "Yes, yes, that is correct; the committee agreed unanimously on the final report.";
        assert!(!is_garbled(text));
    }
}
