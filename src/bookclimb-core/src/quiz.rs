//! Reading quizzes assembled from generated text.
//!
//! The generator is asked for five four-option questions as JSON, but what
//! comes back is only text. [`validate`] turns that text into a [`QuizSet`]
//! or refuses it outright: a quiz either has exactly five well-formed items
//! or it does not exist.
//!
//! Options are shuffled before a quiz is shown, so the generator's answer
//! number cannot be trusted afterwards. The answer key is recomputed from the
//! literal text of the correct option.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::Config;
use crate::error::BookClimbError;
use crate::generator::{TextGenerator, strip_fence};
use crate::prompts;
use crate::tier::DifficultyTier;

/// Number of questions in every quiz.
pub const QUIZ_LEN: usize = 5;
/// Number of options per question.
pub const OPTION_COUNT: usize = 4;
/// Points awarded per correct answer.
pub const POINTS_PER_QUESTION: u32 = 20;

/// A four-option multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizItem {
    question: String,
    options: [String; OPTION_COUNT],
    /// 1-based position of the correct option.
    correct_answer: u8,
}

impl QuizItem {
    /// Returns `None` when `correct_answer` is outside `1..=4`.
    pub fn new(
        question: impl Into<String>,
        options: [String; OPTION_COUNT],
        correct_answer: u8,
    ) -> Option<Self> {
        if !(1..=OPTION_COUNT as u8).contains(&correct_answer) {
            return None;
        }
        Some(Self {
            question: question.into(),
            options,
            correct_answer,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String; OPTION_COUNT] {
        &self.options
    }

    pub fn correct_answer(&self) -> u8 {
        self.correct_answer
    }

    /// Text of the correct option.
    pub fn correct_text(&self) -> &str {
        &self.options[usize::from(self.correct_answer) - 1]
    }
}

/// Exactly [`QUIZ_LEN`] validated items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuizSet {
    items: Vec<QuizItem>,
}

impl QuizSet {
    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&QuizItem> {
        self.items.get(index)
    }
}

impl TryFrom<Vec<QuizItem>> for QuizSet {
    type Error = QuizRejection;

    fn try_from(items: Vec<QuizItem>) -> Result<Self, Self::Error> {
        if items.len() != QUIZ_LEN {
            return Err(QuizRejection::WrongCount(items.len()));
        }
        Ok(Self { items })
    }
}

/// Why generated text did not become a quiz.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuizRejection {
    #[error("no bracketed array found in generated text")]
    NoArray,

    #[error("generated array is not valid JSON: {0}")]
    Malformed(String),

    #[error("expected 5 valid questions, found {0}")]
    WrongCount(usize),
}

/// Validate generated quiz text using the thread-local RNG for shuffling.
pub fn validate(raw_text: &str) -> Result<QuizSet, QuizRejection> {
    validate_with_rng(raw_text, &mut rand::thread_rng())
}

/// Validate generated quiz text, shuffling options with `rng`.
pub fn validate_with_rng<R: Rng + ?Sized>(
    raw_text: &str,
    rng: &mut R,
) -> Result<QuizSet, QuizRejection> {
    let unfenced = strip_fence(raw_text);
    let array_text = bracketed_array(&unfenced).ok_or(QuizRejection::NoArray)?;

    let elements: Vec<Value> = serde_json::from_str(array_text)
        .map_err(|e| QuizRejection::Malformed(e.to_string()))?;

    let total = elements.len();
    let items: Vec<QuizItem> = elements
        .into_iter()
        .filter_map(|element| assemble_item(element, rng))
        .collect();

    if items.len() != total {
        tracing::debug!(total, kept = items.len(), "Dropped malformed quiz elements");
    }

    QuizSet::try_from(items)
}

/// Greedy span from the first `[` to the last `]`.
fn bracketed_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

fn assemble_item<R: Rng + ?Sized>(element: Value, rng: &mut R) -> Option<QuizItem> {
    let element = match element {
        Value::String(nested) => serde_json::from_str::<Value>(&nested).ok()?,
        other => other,
    };
    let Value::Object(mut fields) = element else {
        return None;
    };

    if !fields.contains_key("correct_answer") {
        if let Some(answer) = fields.remove("answer") {
            fields.insert("correct_answer".to_string(), answer);
        }
    }

    let question = value_text(fields.get("question")?);
    let raw_options = fields.get("options")?.as_array()?;
    let answer = fields.get("correct_answer")?;

    if raw_options.len() != OPTION_COUNT {
        return None;
    }
    let mut options: Vec<String> = raw_options.iter().map(value_text).collect();
    let correct = correct_literal(answer, &options)?;

    options.shuffle(rng);
    if !options.contains(&correct) {
        options[0] = correct.clone();
    }
    let position = options.iter().position(|o| *o == correct)?;
    let options: [String; OPTION_COUNT] = options.try_into().ok()?;

    QuizItem::new(question, options, (position + 1) as u8)
}

/// Resolve the literal text of the intended answer.
///
/// Integers index the options (1-based). Strings are the answer text itself,
/// unless they match no option but read as an option number.
fn correct_literal(answer: &Value, options: &[String]) -> Option<String> {
    match answer {
        Value::Number(n) => {
            let index = usize::try_from(n.as_u64()?).ok()?;
            index
                .checked_sub(1)
                .and_then(|i| options.get(i))
                .cloned()
        }
        Value::String(text) => {
            let text = text.trim();
            if options.iter().any(|o| o == text) {
                return Some(text.to_string());
            }
            match text.parse::<usize>() {
                Ok(index) if (1..=options.len()).contains(&index) => {
                    Some(options[index - 1].clone())
                }
                _ => Some(text.to_string()),
            }
        }
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Chosen option numbers keyed by 0-based question index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerRecord {
    picks: BTreeMap<usize, u8>,
}

impl AnswerRecord {
    pub fn choose(&mut self, index: usize, option: u8) -> Result<(), BookClimbError> {
        check_index(index)?;
        if !(1..=OPTION_COUNT as u8).contains(&option) {
            return Err(BookClimbError::SequenceViolation(format!(
                "option {} is outside 1..={}",
                option, OPTION_COUNT
            )));
        }
        self.picks.insert(index, option);
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<(), BookClimbError> {
        check_index(index)?;
        self.picks.remove(&index);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.picks.get(&index).copied()
    }

    /// 0-based indices without an answer.
    pub fn missing(&self) -> Vec<usize> {
        (0..QUIZ_LEN).filter(|i| !self.picks.contains_key(i)).collect()
    }
}

fn check_index(index: usize) -> Result<(), BookClimbError> {
    if index >= QUIZ_LEN {
        return Err(BookClimbError::SequenceViolation(format!(
            "question index {} is outside 0..{}",
            index, QUIZ_LEN
        )));
    }
    Ok(())
}

/// A quiz together with the answers given to it.
///
/// Answers live inside the attempt so they are dropped with the quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    quiz: QuizSet,
    answers: AnswerRecord,
}

/// Outcome of grading a fully answered quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizGrade {
    pub correct: Vec<bool>,
    pub score: u32,
}

impl QuizAttempt {
    pub fn new(quiz: QuizSet) -> Self {
        Self {
            quiz,
            answers: AnswerRecord::default(),
        }
    }

    pub fn quiz(&self) -> &QuizSet {
        &self.quiz
    }

    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    pub fn choose(&mut self, index: usize, option: u8) -> Result<(), BookClimbError> {
        self.answers.choose(index, option)
    }

    pub fn clear(&mut self, index: usize) -> Result<(), BookClimbError> {
        self.answers.clear(index)
    }

    /// Grade the attempt. Every question must be answered.
    pub fn grade(&self) -> Result<QuizGrade, BookClimbError> {
        let missing = self.answers.missing();
        if !missing.is_empty() {
            return Err(BookClimbError::IncompleteAnswers { missing });
        }

        let correct: Vec<bool> = self
            .quiz
            .items()
            .iter()
            .enumerate()
            .map(|(i, item)| self.answers.get(i) == Some(item.correct_answer()))
            .collect();
        let score = correct.iter().filter(|ok| **ok).count() as u32 * POINTS_PER_QUESTION;

        Ok(QuizGrade { correct, score })
    }
}

/// Result of asking the generator for a quiz.
#[derive(Debug, Clone)]
pub enum QuizDraft {
    Ready(QuizSet),
    /// The raw text is kept so it can be shown for diagnosis.
    Rejected { reason: QuizRejection, raw: String },
}

/// Request a quiz about a book and validate the reply.
pub async fn generate_quiz(
    generator: &dyn TextGenerator,
    title: &str,
    synopsis: &str,
    tier: DifficultyTier,
    config: &Config,
) -> Result<QuizDraft, BookClimbError> {
    let params = config.tier(tier);
    let prompt = prompts::render(
        prompts::QUIZ_REQUEST,
        &[
            ("title", title),
            ("level", tier.label()),
            ("style", &params.quiz_style),
            ("synopsis", synopsis),
        ],
    );

    let raw = generator
        .ask(&prompt, params.temperature, config.generator.quiz_max_tokens)
        .await?;

    match validate(&raw) {
        Ok(quiz) => Ok(QuizDraft::Ready(quiz)),
        Err(reason) => {
            tracing::warn!(%reason, "Generated quiz rejected");
            Ok(QuizDraft::Rejected { reason, raw })
        }
    }
}

#[derive(Serialize)]
struct ExplanationPayload<'a> {
    quiz: &'a [QuizItem],
    student_answers: &'a AnswerRecord,
}

/// Ask the generator to explain each question and the student's answers.
pub async fn explain_attempt(
    generator: &dyn TextGenerator,
    attempt: &QuizAttempt,
    tier: DifficultyTier,
    config: &Config,
) -> Result<String, BookClimbError> {
    let params = config.tier(tier);
    let payload = serde_json::to_string(&ExplanationPayload {
        quiz: attempt.quiz().items(),
        student_answers: attempt.answers(),
    })
    .map_err(|e| BookClimbError::Generation(format!("Failed to encode quiz: {}", e)))?;

    let prompt = prompts::render(
        prompts::QUIZ_EXPLANATION,
        &[
            ("level", tier.label()),
            ("guide", &params.explain_guide),
            ("payload", &payload),
        ],
    );

    generator
        .ask(&prompt, params.temperature, params.explain_length)
        .await
}
