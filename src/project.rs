//! Project records: thesis/scope metadata, seed files, and bibliography (§3.2
//! `project_context`, §6.2 `project_bibliography`, supplemented from the original
//! project kernel).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ProjectContext;
use crate::workflow::RigorLevel;

/// One bibliography entry a manuscript block's `citation_key` must resolve against
/// (the Saver's "Librarian Key-Guard", §4.4 Saver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BibliographyEntry {
    pub citation_key: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<u32>,
}

/// A research project: thesis, research questions, anti-scope, rigor policy, seed
/// documents, and bibliography.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub thesis: String,
    pub research_questions: Vec<String>,
    pub anti_scope: Vec<String>,
    pub target_journal: Option<String>,
    pub seed_files: Vec<String>,
    pub rigor_level: RigorLevel,
    pub bibliography: Vec<BibliographyEntry>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>, thesis: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            thesis: thesis.into(),
            research_questions: Vec::new(),
            anti_scope: Vec::new(),
            target_journal: None,
            seed_files: Vec::new(),
            rigor_level: RigorLevel::Exploratory,
            bibliography: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_research_questions(mut self, questions: Vec<String>) -> Self {
        self.research_questions = questions;
        self
    }

    pub fn with_anti_scope(mut self, anti_scope: Vec<String>) -> Self {
        self.anti_scope = anti_scope;
        self
    }

    pub fn with_rigor_level(mut self, rigor_level: RigorLevel) -> Self {
        self.rigor_level = rigor_level;
        self
    }

    /// Add a seed filename; a name already present is a no-op (§8 "dedup via set-push").
    pub fn add_seed_file(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        if !self.seed_files.contains(&filename) {
            self.seed_files.push(filename);
        }
    }

    pub fn add_bibliography_entry(&mut self, entry: BibliographyEntry) {
        if !self.bibliography.iter().any(|e| e.citation_key == entry.citation_key) {
            self.bibliography.push(entry);
        }
    }

    /// True when every key in `citation_keys` resolves to a bibliography entry
    /// (the Saver's Librarian Key-Guard, §4.4 Saver).
    pub fn has_all_citation_keys(&self, citation_keys: &[String]) -> bool {
        citation_keys
            .iter()
            .all(|key| self.bibliography.iter().any(|entry| &entry.citation_key == key))
    }

    /// Which requested keys are missing from the bibliography.
    pub fn missing_citation_keys(&self, citation_keys: &[String]) -> Vec<String> {
        citation_keys
            .iter()
            .filter(|key| !self.bibliography.iter().any(|entry| &entry.citation_key == *key))
            .cloned()
            .collect()
    }

    /// Project the framing a node needs out of the full project record
    /// (§4.4 Cartographer step 1 "Hydrate project context").
    pub fn to_context(&self) -> ProjectContext {
        let mut context = ProjectContext::new(self.id.clone(), self.title.clone(), self.rigor_level)
            .with_thesis(self.thesis.clone())
            .with_research_questions(self.research_questions.clone())
            .with_anti_scope(self.anti_scope.clone());
        context.target_journal = self.target_journal.clone();
        context
    }
}
