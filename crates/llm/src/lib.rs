//! LLM-backed incident evaluation.
//!
//! [`TwoPhaseEvaluator`] grades an incident's description and, when one
//! exists, its conclusion, through any [`LlmProvider`]. Gemini is the only
//! bundled provider.

pub mod error;
pub mod evaluator;
pub mod json;
pub mod prompts;
pub mod provider;
pub mod providers;

pub use error::EvaluationError;
pub use evaluator::TwoPhaseEvaluator;
pub use prompts::PromptSet;
pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::gemini::GeminiProvider;
