//! Error types for the reading core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookClimbError {
    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown difficulty tier: {0}")]
    UnknownTier(String),

    #[error("Unknown debate side: {0}")]
    UnknownSide(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Nothing to give feedback on: the essay is empty")]
    EmptyEssay,

    #[error("Sequence violation: {0}")]
    SequenceViolation(String),

    #[error("Unanswered questions: {missing:?}")]
    IncompleteAnswers { missing: Vec<usize> },
}
