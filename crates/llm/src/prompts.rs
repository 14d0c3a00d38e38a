//! System prompts and user-message templates for both evaluation phases.
//!
//! System prompts live in files so they can be tuned without a rebuild.
//! They are read once at startup; a missing or empty file is fatal.

use std::path::{Path, PathBuf};

use minijinja::Environment;

use crate::error::EvaluationError;

pub const PHASE1: &str = "phase1";
pub const PHASE2: &str = "phase2";

const PHASE1_USER: &str = "Title: {{ incident.title }}

Description:
{{ incident.description }}";

const PHASE2_USER: &str = "Description assessment (phase 1):
{{ phase1 }}

Incident conclusion:
{{ incident.conclusion }}";

/// System prompts for the description and conclusion phases.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub phase1: String,
    pub phase2: String,
}

impl PromptSet {
    pub fn load(phase1: &Path, phase2: &Path) -> Result<Self, EvaluationError> {
        Ok(Self {
            phase1: read_prompt(phase1)?,
            phase2: read_prompt(phase2)?,
        })
    }
}

fn read_prompt(path: &Path) -> Result<String, EvaluationError> {
    let content = std::fs::read_to_string(path).map_err(|source| EvaluationError::Prompt {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Err(EvaluationError::EmptyPrompt(PathBuf::from(path)));
    }
    Ok(content)
}

/// Environment holding the user-message templates for both phases.
pub fn user_templates() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template(PHASE1, PHASE1_USER)?;
    env.add_template(PHASE2, PHASE2_USER)?;
    Ok(env)
}
