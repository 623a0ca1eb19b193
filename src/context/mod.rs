//! Project context: research questions, anti-scope, rigor level, and
//! bibliography, wrapped into prompts before they reach an expert (§4.7).

mod project_context;

pub use project_context::{wrap_prompt_with_context, ProjectContext};
