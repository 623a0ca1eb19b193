//! Project context and the prompt-wrapping seam nodes use to inject it (§3.2, §4.7).

use serde::{Deserialize, Serialize};

use crate::workflow::RigorLevel;

/// The project-level framing a node prepends to its base prompt (§3.2 `project_context`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: String,
    pub title: String,
    pub thesis: Option<String>,
    pub research_questions: Vec<String>,
    pub anti_scope: Vec<String>,
    pub rigor_level: RigorLevel,
    pub target_journal: Option<String>,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>, rigor_level: RigorLevel) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            thesis: None,
            research_questions: Vec::new(),
            anti_scope: Vec::new(),
            rigor_level,
            target_journal: None,
        }
    }

    pub fn with_thesis(mut self, thesis: impl Into<String>) -> Self {
        self.thesis = Some(thesis.into());
        self
    }

    pub fn with_research_questions(mut self, questions: Vec<String>) -> Self {
        self.research_questions = questions;
        self
    }

    pub fn with_anti_scope(mut self, anti_scope: Vec<String>) -> Self {
        self.anti_scope = anti_scope;
        self
    }
}

/// Append the project's thesis, research questions, and anti-scope (plus a hard
/// constraint block under conservative rigor) to `base_prompt` (§4.7).
///
/// Retrieval must happen before this wrap so the prompt-registry cache key stays
/// stable across projects: callers resolve the template first, then wrap.
pub fn wrap_prompt_with_context(context: Option<&ProjectContext>, base_prompt: &str) -> String {
    let Some(context) = context else {
        return base_prompt.to_string();
    };

    let mut wrapped = base_prompt.to_string();

    if let Some(thesis) = &context.thesis {
        wrapped.push_str(&format!("\n\nThesis:\n{thesis}"));
    }

    if !context.research_questions.is_empty() {
        let bulleted = context
            .research_questions
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n");
        wrapped.push_str(&format!("\n\nResearch Questions:\n{bulleted}"));
    }

    if !context.anti_scope.is_empty() {
        let bulleted = context.anti_scope.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n");
        wrapped.push_str(&format!("\n\nAnti-Scope:\n{bulleted}"));

        if context.rigor_level == RigorLevel::Conservative {
            wrapped.push_str(&format!(
                "\n\nSTRICT CONSTRAINT: do not extract or assert anything within the anti-scope topics listed above:\n{bulleted}"
            ));
        }
    }

    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_leaves_prompt_unchanged() {
        assert_eq!(wrap_prompt_with_context(None, "base prompt"), "base prompt");
    }

    #[test]
    fn appends_thesis_and_research_questions() {
        let context = ProjectContext::new("p1", "Title", RigorLevel::Exploratory)
            .with_thesis("X causes Y")
            .with_research_questions(vec!["RQ1: does X cause Y?".into()]);
        let wrapped = wrap_prompt_with_context(Some(&context), "base");
        assert!(wrapped.contains("Thesis:\nX causes Y"));
        assert!(wrapped.contains("- RQ1: does X cause Y?"));
    }

    #[test]
    fn conservative_rigor_appends_strict_constraint_for_anti_scope() {
        let context = ProjectContext::new("p1", "Title", RigorLevel::Conservative)
            .with_anti_scope(vec!["off-topic area".into()]);
        let wrapped = wrap_prompt_with_context(Some(&context), "base");
        assert!(wrapped.contains("STRICT CONSTRAINT"));
    }

    #[test]
    fn exploratory_rigor_skips_strict_constraint() {
        let context = ProjectContext::new("p1", "Title", RigorLevel::Exploratory)
            .with_anti_scope(vec!["off-topic area".into()]);
        let wrapped = wrap_prompt_with_context(Some(&context), "base");
        assert!(wrapped.contains("Anti-Scope"));
        assert!(!wrapped.contains("STRICT CONSTRAINT"));
    }
}
