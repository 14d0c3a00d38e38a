use std::path::PathBuf;

use relay_core::SyncError;

use crate::provider::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("failed to read prompt {path}: {source}")]
    Prompt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt {0} is empty")]
    EmptyPrompt(PathBuf),
    #[error("{phase}: {source}")]
    Llm {
        phase: &'static str,
        #[source]
        source: LlmError,
    },
    #[error("failed to render {phase} message: {source}")]
    Template {
        phase: &'static str,
        #[source]
        source: minijinja::Error,
    },
    #[error("{phase}: invalid JSON answer ({detail}): {answer:?}")]
    InvalidAnswer {
        phase: &'static str,
        detail: String,
        answer: String,
    },
}

impl From<EvaluationError> for SyncError {
    fn from(e: EvaluationError) -> Self {
        SyncError::Evaluation(e.to_string())
    }
}
