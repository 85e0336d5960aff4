//! BookClimb Core Library
//!
//! Reading-comprehension core: quiz validation, debate topic normalization
//! and the debate engine, plus the generation adapter they share.

pub mod config;
pub mod debate_format;
pub mod error;
pub mod essay;
pub mod events;
pub mod generator;
pub mod mock;
pub mod orchestrator;
pub mod participant;
pub mod prompts;
pub mod quiz;
pub mod safety;
pub mod session;
pub mod tier;
pub mod topic;

pub use config::{Config, default_config};
pub use debate_format::{DebateRound, Stage};
pub use error::BookClimbError;
pub use essay::request_essay_feedback;
pub use events::{EventCategory, EventSink, JsonLinesSink, LearningEvent, TracingSink};
pub use generator::{ChatMessage, ChatRole, GeneratorSettings, OpenAiGenerator, TextGenerator};
pub use orchestrator::{
    DebateCallback, DebateEngine, DebateEvent, DebateOutcome, DebateSession, DebateState,
    ScoreResult, TurnOutcome, Winner,
};
pub use participant::{Side, Speaker};
pub use quiz::{QuizAttempt, QuizDraft, QuizItem, QuizRejection, QuizSet};
pub use safety::{LexiconFilter, SafetyFilter};
pub use session::ReadingSession;
pub use tier::DifficultyTier;
pub use topic::DebateTopic;
