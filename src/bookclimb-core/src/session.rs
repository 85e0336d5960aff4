//! Per-student reading session.
//!
//! The session is an explicit value owned by whoever serves the student.
//! Nothing in the core keeps it in ambient state.

use crate::error::BookClimbError;
use crate::orchestrator::DebateSession;
use crate::quiz::{QuizAttempt, QuizSet};
use crate::tier::DifficultyTier;
use crate::topic::DebateTopic;

/// Book chosen for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub title: String,
    pub synopsis: String,
}

#[derive(Debug, Clone)]
pub struct ReadingSession {
    student_id: String,
    tier: DifficultyTier,
    book: Option<Book>,
    quiz: Option<QuizAttempt>,
    topics: Vec<DebateTopic>,
    debate: Option<DebateSession>,
}

impl ReadingSession {
    pub fn new(student_id: impl Into<String>, tier: DifficultyTier) -> Self {
        Self {
            student_id: student_id.into(),
            tier,
            book: None,
            quiz: None,
            topics: Vec::new(),
            debate: None,
        }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn tier(&self) -> DifficultyTier {
        self.tier
    }

    /// Change the tier. Takes effect for the next quiz or debate.
    pub fn set_tier(&mut self, tier: DifficultyTier) {
        self.tier = tier;
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    /// Select a book. Anything built on the previous book is discarded.
    pub fn select_book(&mut self, title: impl Into<String>, synopsis: impl Into<String>) {
        self.book = Some(Book {
            title: title.into(),
            synopsis: synopsis.into(),
        });
        self.reset_quiz();
        self.reset_debate();
        self.topics.clear();
    }

    /// Start a fresh attempt on a validated quiz.
    pub fn install_quiz(&mut self, quiz: QuizSet) -> Result<&mut QuizAttempt, BookClimbError> {
        self.require_book()?;
        Ok(self.quiz.insert(QuizAttempt::new(quiz)))
    }

    pub fn quiz(&self) -> Option<&QuizAttempt> {
        self.quiz.as_ref()
    }

    pub fn quiz_mut(&mut self) -> Option<&mut QuizAttempt> {
        self.quiz.as_mut()
    }

    /// Drop the quiz and its answers.
    pub fn reset_quiz(&mut self) {
        self.quiz = None;
    }

    pub fn topics(&self) -> &[DebateTopic] {
        &self.topics
    }

    /// Remember recommended topics so later requests can avoid them.
    pub fn add_topics(&mut self, topics: impl IntoIterator<Item = DebateTopic>) {
        for topic in topics {
            if !self.topics.contains(&topic) {
                self.topics.push(topic);
            }
        }
    }

    pub fn install_debate(
        &mut self,
        debate: DebateSession,
    ) -> Result<&mut DebateSession, BookClimbError> {
        self.require_book()?;
        Ok(self.debate.insert(debate))
    }

    pub fn debate(&self) -> Option<&DebateSession> {
        self.debate.as_ref()
    }

    pub fn debate_mut(&mut self) -> Option<&mut DebateSession> {
        self.debate.as_mut()
    }

    /// Discard topic, rounds, transcript and outcome of the current debate.
    pub fn reset_debate(&mut self) {
        self.debate = None;
    }

    /// Back to a fresh session for the same student and tier.
    pub fn reset(&mut self) {
        self.book = None;
        self.quiz = None;
        self.topics.clear();
        self.debate = None;
    }

    fn require_book(&self) -> Result<&Book, BookClimbError> {
        self.book.as_ref().ok_or_else(|| {
            BookClimbError::SequenceViolation("no book has been selected".to_string())
        })
    }
}
