//! Vocabulary guardrail: forbidden-word YAML loading, negative-constraint prompt
//! injection, and forbidden-word detection (§4.6 "Tone/vocabulary guard").

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

/// One raw entry in the forbidden-words YAML, in its "list of objects" form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Word(String),
    WithAlternative { word: String, #[serde(default)] alternative: RawAlternative },
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum RawAlternative {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize, Default)]
struct RawVocabFile {
    #[serde(default)]
    forbidden_words: RawForbiddenWords,
}

#[derive(Debug, Deserialize, Default)]
#[serde(untagged)]
enum RawForbiddenWords {
    #[default]
    Empty,
    List(Vec<RawEntry>),
    Map(BTreeMap<String, String>),
}

/// Forbidden vocabulary with alternatives, loaded from a YAML asset (§4.6).
#[derive(Debug, Clone, Default)]
pub struct VocabGuard {
    forbidden_words: BTreeMap<String, String>,
}

impl VocabGuard {
    /// Parse a vocabulary guard from raw YAML text (list-of-objects, list-of-strings,
    /// or flat-map format are all accepted, mirroring the asset's historical shapes).
    pub fn from_yaml(yaml: &str) -> Self {
        let parsed: RawVocabFile = match serde_yaml::from_str(yaml) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, "failed to parse forbidden vocabulary YAML, using empty vocabulary");
                return Self::default();
            }
        };

        let forbidden_words = match parsed.forbidden_words {
            RawForbiddenWords::Empty => BTreeMap::new(),
            RawForbiddenWords::Map(map) => map
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
                .collect(),
            RawForbiddenWords::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    RawEntry::Word(word) => {
                        let word = word.trim().to_lowercase();
                        (!word.is_empty()).then(|| (word, String::new()))
                    }
                    RawEntry::WithAlternative { word, alternative } => {
                        let word = word.trim().to_lowercase();
                        if word.is_empty() {
                            return None;
                        }
                        let alt = match alternative {
                            RawAlternative::None => String::new(),
                            RawAlternative::One(s) => s.trim().to_string(),
                            RawAlternative::Many(parts) => parts
                                .iter()
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect::<Vec<_>>()
                                .join(" or "),
                        };
                        Some((word, alt))
                    }
                })
                .collect(),
        };

        info!(count = forbidden_words.len(), "loaded forbidden vocabulary");
        Self { forbidden_words }
    }

    /// Load from a file path, falling back to an empty (no-op) guard if the
    /// file is absent or unreadable.
    pub fn from_path(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(yaml) => Self::from_yaml(&yaml),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "forbidden vocabulary file not found, using empty vocabulary");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forbidden_words.is_empty()
    }

    /// Append a NEGATIVE CONSTRAINT block listing forbidden words and their
    /// alternatives; a no-op when the vocabulary is empty.
    pub fn apply_constraints(&self, prompt: &str) -> String {
        if self.forbidden_words.is_empty() {
            return prompt.to_string();
        }

        let words_str = self
            .forbidden_words
            .keys()
            .map(|w| format!("\"{w}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let alternatives_str = self
            .forbidden_words
            .iter()
            .map(|(word, alt)| {
                if alt.is_empty() {
                    format!("\"{word}\" -> (use appropriate alternative)")
                } else {
                    format!("\"{word}\" -> \"{alt}\"")
                }
            })
            .collect::<Vec<_>>()
            .join("\n  ");

        format!(
            "{prompt}\n\n---\nNEGATIVE CONSTRAINT:\nDO NOT use the following words: [{words_str}]\n\n\
Use these alternatives instead:\n  {alternatives_str}\n\n\
If you encounter any of these words in your response, replace them with the suggested \
alternatives or appropriate synonyms that maintain the professional tone.\n---\n"
        )
    }

    pub fn forbidden_words(&self) -> Vec<String> {
        self.forbidden_words.keys().cloned().collect()
    }

    pub fn alternatives(&self) -> BTreeMap<String, String> {
        self.forbidden_words.clone()
    }

    /// First forbidden word found in `text` (case-insensitive substring check), if any.
    pub fn check_forbidden(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        self.forbidden_words.keys().find(|word| lower.contains(word.as_str())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_of_objects_format_is_parsed() {
        let yaml = r#"
forbidden_words:
  - word: "delve"
    alternative: "explore"
  - word: "tapestry"
"#;
        let guard = VocabGuard::from_yaml(yaml);
        assert_eq!(guard.forbidden_words(), vec!["delve", "tapestry"]);
        assert_eq!(guard.alternatives().get("delve"), Some(&"explore".to_string()));
    }

    #[test]
    fn flat_map_format_is_parsed() {
        let yaml = "forbidden_words:\n  delve: explore\n  tapestry: \"\"\n";
        let guard = VocabGuard::from_yaml(yaml);
        assert_eq!(guard.forbidden_words().len(), 2);
    }

    #[test]
    fn missing_file_yields_empty_guard() {
        let guard = VocabGuard::from_path(Path::new("/nonexistent/forbidden_vocab.yaml"));
        assert!(guard.is_empty());
    }

    #[test]
    fn apply_constraints_is_noop_when_empty() {
        let guard = VocabGuard::default();
        assert_eq!(guard.apply_constraints("write a summary"), "write a summary");
    }

    #[test]
    fn apply_constraints_appends_negative_block() {
        let yaml = "forbidden_words:\n  - word: delve\n    alternative: explore\n";
        let guard = VocabGuard::from_yaml(yaml);
        let result = guard.apply_constraints("write a summary");
        assert!(result.contains("NEGATIVE CONSTRAINT"));
        assert!(result.contains("\"delve\""));
    }

    #[test]
    fn check_forbidden_is_case_insensitive() {
        let yaml = "forbidden_words:\n  - word: delve\n";
        let guard = VocabGuard::from_yaml(yaml);
        assert_eq!(guard.check_forbidden("Let's DELVE into this."), Some("delve".to_string()));
        assert_eq!(guard.check_forbidden("no match here"), None);
    }
}
