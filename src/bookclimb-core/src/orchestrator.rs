//! Debate orchestration logic.
//!
//! A [`DebateSession`] is a plain value owned by the caller. The
//! [`DebateEngine`] advances it one round at a time: participant rounds wait
//! for submitted text and pass it through the safety filter, opponent rounds
//! are generated. Once every round has been played the session is scored
//! exactly once and the result is cached on the session.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::debate_format::{self, DebateRound};
use crate::error::BookClimbError;
use crate::generator::{ChatMessage, TextGenerator, strip_fence};
use crate::participant::{Side, Speaker};
use crate::prompts;
use crate::safety::{self, SafetyFilter};
use crate::tier::DifficultyTier;
use crate::topic::DebateTopic;

/// Number of scoring criteria per side.
pub const CRITERIA_COUNT: usize = 5;
/// Upper bound of a single criterion score.
pub const MAX_CRITERION_SCORE: u8 = 20;

const MAX_FEEDBACK_LINES: usize = 50;
const FEEDBACK_FALLBACK: &str = "피드백을 만들지 못했어요. 잠시 후 다시 확인해 주세요.";

/// A message in the debate transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    /// Round index (1-based) this was spoken in.
    pub round: u8,
    pub round_label: String,
    pub text: String,
}

/// Scores awarded to one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideScore {
    pub criterion_scores: [u8; CRITERIA_COUNT],
    pub total: u32,
}

impl SideScore {
    fn zero() -> Self {
        Self {
            criterion_scores: [0; CRITERIA_COUNT],
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    For,
    Against,
    Undetermined,
}

impl Winner {
    pub fn display_name(&self) -> &'static str {
        match self {
            Winner::For => Side::For.display_name(),
            Winner::Against => Side::Against.display_name(),
            Winner::Undetermined => "-",
        }
    }

    fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "찬성" | "찬성측" | "for" | "pro" => Winner::For,
            "반대" | "반대측" | "against" | "con" => Winner::Against,
            _ => Winner::Undetermined,
        }
    }
}

/// Structured evaluation of a finished debate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub for_side: SideScore,
    pub against_side: SideScore,
    pub winner: Winner,
}

#[derive(Deserialize)]
struct RawScore {
    #[serde(alias = "for", alias = "for_side")]
    pro: RawSideScore,
    #[serde(alias = "against", alias = "against_side")]
    con: RawSideScore,
    #[serde(default)]
    winner: Option<String>,
}

#[derive(Deserialize)]
struct RawSideScore {
    #[serde(default, alias = "criterion_scores")]
    criteria_scores: Vec<i64>,
    #[serde(default)]
    total: Option<i64>,
}

impl RawSideScore {
    fn into_side_score(self) -> Option<SideScore> {
        let scores: Vec<u8> = self
            .criteria_scores
            .into_iter()
            .map(|s| u8::try_from(s).ok().filter(|s| *s <= MAX_CRITERION_SCORE))
            .collect::<Option<_>>()?;
        let criterion_scores: [u8; CRITERIA_COUNT] = scores.try_into().ok()?;
        let total = match self.total {
            Some(total) => u32::try_from(total).ok()?,
            None => criterion_scores.iter().map(|s| u32::from(*s)).sum(),
        };
        Some(SideScore {
            criterion_scores,
            total,
        })
    }
}

impl ScoreResult {
    /// Value used whenever the generated score cannot be read.
    pub fn fallback() -> Self {
        Self {
            for_side: SideScore::zero(),
            against_side: SideScore::zero(),
            winner: Winner::Undetermined,
        }
    }

    /// Parse a generated score object. Any schema mismatch yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let text = strip_fence(raw);
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end < start {
            return None;
        }
        let parsed: RawScore = serde_json::from_str(&text[start..=end]).ok()?;

        Some(Self {
            for_side: parsed.pro.into_side_score()?,
            against_side: parsed.con.into_side_score()?,
            winner: parsed
                .winner
                .as_deref()
                .map(Winner::from_label)
                .unwrap_or(Winner::Undetermined),
        })
    }

    pub fn side(&self, side: Side) -> &SideScore {
        match side {
            Side::For => &self.for_side,
            Side::Against => &self.against_side,
        }
    }
}

/// Score and feedback computed once a debate ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateOutcome {
    pub score: ScoreResult,
    /// Narrative feedback about the participant's own turns.
    pub feedback: String,
}

/// Where a session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateState {
    InProgress { round: usize, slot: DebateRound },
    /// All rounds played, score not yet computed.
    Scoring,
    Complete,
}

/// One debate between the student and the generated opponent.
#[derive(Debug, Clone)]
pub struct DebateSession {
    topic: DebateTopic,
    tier: DifficultyTier,
    participant_side: Side,
    opponent_side: Side,
    round_order: Vec<u8>,
    /// 1-based position in `round_order`.
    current_round: usize,
    framing: String,
    synopsis_excerpt: String,
    transcript: Vec<Turn>,
    outcome: Option<DebateOutcome>,
}

impl DebateSession {
    pub fn topic(&self) -> &DebateTopic {
        &self.topic
    }

    pub fn tier(&self) -> DifficultyTier {
        self.tier
    }

    pub fn participant_side(&self) -> Side {
        self.participant_side
    }

    pub fn opponent_side(&self) -> Side {
        self.opponent_side
    }

    pub fn round_order(&self) -> &[u8] {
        &self.round_order
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    /// The framing message that opens every generation request.
    pub fn framing(&self) -> &str {
        &self.framing
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Cached score and feedback, present once the session is complete.
    pub fn outcome(&self) -> Option<&DebateOutcome> {
        self.outcome.as_ref()
    }

    /// Round to be played next, if any.
    pub fn current_slot(&self) -> Option<DebateRound> {
        self.current_round
            .checked_sub(1)
            .and_then(|i| self.round_order.get(i))
            .and_then(|index| DebateRound::new(*index))
    }

    /// Whose turn it is, or `None` once every round is played.
    pub fn next_speaker(&self) -> Option<Speaker> {
        self.current_slot().map(|slot| self.speaker_for(slot.side))
    }

    pub fn rounds_finished(&self) -> bool {
        self.current_round > self.round_order.len()
    }

    pub fn state(&self) -> DebateState {
        if self.outcome.is_some() {
            return DebateState::Complete;
        }
        match self.current_slot() {
            Some(slot) => DebateState::InProgress {
                round: self.current_round,
                slot,
            },
            None => DebateState::Scoring,
        }
    }

    fn speaker_for(&self, side: Side) -> Speaker {
        if side == self.participant_side {
            Speaker::Participant
        } else {
            Speaker::Opponent
        }
    }

    /// Framing message followed by every turn, as chat messages.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.framing.clone()))
            .chain(self.transcript.iter().map(|turn| match turn.speaker {
                Speaker::Participant => {
                    ChatMessage::user(format!("[{}] {}", turn.round_label, turn.text))
                }
                Speaker::Opponent => ChatMessage::assistant(turn.text.clone()),
            }))
            .collect()
    }

    /// Transcript lines tagged with each speaker's side.
    pub fn labeled_transcript(&self, participant_tag: &str, opponent_tag: &str) -> Vec<String> {
        self.transcript
            .iter()
            .map(|turn| match turn.speaker {
                Speaker::Participant => format!(
                    "{}({}): [{}] {}",
                    participant_tag, self.participant_side, turn.round_label, turn.text
                ),
                Speaker::Opponent => {
                    format!("{}({}): {}", opponent_tag, self.opponent_side, turn.text)
                }
            })
            .collect()
    }

    /// Plain-text record of the debate for download or archiving.
    pub fn record_text(&self, title: &str) -> String {
        let mut txt = String::from("독서토론 기록\n\n");
        txt.push_str(&format!(
            "[책] {}\n[주제] {}\n[학생 입장] {}\n\n",
            title, self.topic, self.participant_side
        ));

        let feedback = match &self.outcome {
            Some(outcome) => {
                txt.push_str(&format!(
                    "[점수] 찬성 {}점 / 반대 {}점, 승리: {}\n\n",
                    outcome.score.for_side.total,
                    outcome.score.against_side.total,
                    outcome.score.winner.display_name()
                ));
                outcome.feedback.as_str()
            }
            None => "",
        };

        txt.push_str("[총평]\n");
        txt.push_str(feedback);
        txt.push_str("\n\n[토론 로그]\n");
        txt.push_str(
            &self
                .labeled_transcript(Speaker::Participant.display_name(), Speaker::Opponent.display_name())
                .join("\n"),
        );
        txt
    }
}

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted while a debate runs.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// A new round is starting.
    RoundStart {
        index: u8,
        label: String,
        speaker: Speaker,
    },
    /// A turn was appended to the transcript.
    SpeakerMessage {
        speaker: Speaker,
        label: String,
        content: String,
    },
    /// The participant's text failed the safety check.
    TurnRejected { suggestion: String },
    /// Rounds are over and the outcome is cached.
    DebateEnd,
}

/// Result of submitting participant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Accepted,
    /// Nothing was recorded; the same round must be resubmitted.
    Rejected { suggestion: String },
}

/// Drives debate sessions.
pub struct DebateEngine {
    generator: Arc<dyn TextGenerator>,
    safety: Arc<dyn SafetyFilter>,
    config: Config,
    callback: Option<DebateCallback>,
}

impl DebateEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        safety: Arc<dyn SafetyFilter>,
        config: Config,
    ) -> Self {
        Self {
            generator,
            safety,
            config,
            callback: None,
        }
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Create a session positioned at its first round.
    pub fn start(
        &self,
        topic: DebateTopic,
        tier: DifficultyTier,
        participant_side: Side,
        synopsis: &str,
    ) -> DebateSession {
        let round_order = debate_format::round_order(tier);
        let synopsis_excerpt =
            prompts::excerpt(synopsis, self.config.generator.synopsis_excerpt_chars).to_string();
        let framing = debate_format::framing_message(
            &topic,
            tier,
            self.config.tier(tier),
            &round_order,
            &synopsis_excerpt,
        );

        tracing::info!(
            topic = %topic,
            tier = %tier,
            side = %participant_side,
            rounds = round_order.len(),
            "Debate started"
        );

        let session = DebateSession {
            topic,
            tier,
            participant_side,
            opponent_side: participant_side.opposite(),
            round_order,
            current_round: 1,
            framing,
            synopsis_excerpt,
            transcript: Vec::new(),
            outcome: None,
        };
        self.announce_round(&session);
        session
    }

    /// Submit the participant's text for the current round.
    pub async fn submit_turn(
        &self,
        session: &mut DebateSession,
        text: &str,
    ) -> Result<TurnOutcome, BookClimbError> {
        let slot = self.expect_turn(session, Speaker::Participant)?;

        if self.safety.contains_violation(text) {
            tracing::info!(round = slot.index, "Participant turn failed safety check");
            let suggestion = safety::rewrite_politely(
                self.generator.as_ref(),
                text,
                &self.config.generator,
                &self.config.safety.rewrite_fallback,
            )
            .await;
            self.emit_event(DebateEvent::TurnRejected {
                suggestion: suggestion.clone(),
            });
            return Ok(TurnOutcome::Rejected { suggestion });
        }

        self.record_turn(session, slot, Speaker::Participant, text.trim().to_string());
        Ok(TurnOutcome::Accepted)
    }

    /// Generate and record the opponent's speech for the current round.
    ///
    /// Whatever text comes back is recorded, empty or not. A transport
    /// failure leaves the session untouched.
    pub async fn opponent_turn(&self, session: &mut DebateSession) -> Result<(), BookClimbError> {
        let slot = self.expect_turn(session, Speaker::Opponent)?;
        let label = slot.label();

        let mut messages = session.conversation();
        messages.push(ChatMessage::user(format!("[{}]", label)));

        let reply = self
            .generator
            .complete(
                &messages,
                self.config.tier(session.tier).temperature,
                self.config.generator.opponent_max_tokens,
            )
            .await?;

        if reply.trim().is_empty() {
            tracing::warn!(round = slot.index, "Opponent produced an empty turn");
        }

        self.record_turn(session, slot, Speaker::Opponent, reply);
        Ok(())
    }

    /// Score the finished debate and produce feedback, once.
    ///
    /// Later calls return the cached outcome without contacting the
    /// generator.
    pub async fn conclude<'s>(
        &self,
        session: &'s mut DebateSession,
    ) -> Result<&'s DebateOutcome, BookClimbError> {
        if session.outcome.is_none() {
            if !session.rounds_finished() {
                return Err(BookClimbError::SequenceViolation(format!(
                    "debate cannot be scored before round {} of {} is played",
                    session.current_round,
                    session.round_order.len()
                )));
            }

            let score = self.request_score(session).await;
            let feedback = self.request_feedback(session).await;
            tracing::info!(
                for_total = score.for_side.total,
                against_total = score.against_side.total,
                winner = score.winner.display_name(),
                "Debate scored"
            );
            session.outcome = Some(DebateOutcome { score, feedback });
            self.emit_event(DebateEvent::DebateEnd);
        }

        session.outcome.as_ref().ok_or_else(|| {
            BookClimbError::SequenceViolation("debate outcome was not recorded".to_string())
        })
    }

    fn expect_turn(
        &self,
        session: &DebateSession,
        speaker: Speaker,
    ) -> Result<DebateRound, BookClimbError> {
        let slot = session.current_slot().ok_or_else(|| {
            BookClimbError::SequenceViolation("all debate rounds have been played".to_string())
        })?;
        if session.speaker_for(slot.side) != speaker {
            return Err(BookClimbError::SequenceViolation(format!(
                "round {} ({}) is not the {}'s turn",
                slot.index,
                slot.label(),
                speaker.display_name()
            )));
        }
        Ok(slot)
    }

    fn record_turn(
        &self,
        session: &mut DebateSession,
        slot: DebateRound,
        speaker: Speaker,
        text: String,
    ) {
        let label = slot.label();
        session.transcript.push(Turn {
            speaker,
            round: slot.index,
            round_label: label.clone(),
            text: text.clone(),
        });
        self.emit_event(DebateEvent::SpeakerMessage {
            speaker,
            label,
            content: text,
        });

        session.current_round += 1;
        tracing::debug!(current_round = session.current_round, "Debate advanced");
        self.announce_round(session);
    }

    fn announce_round(&self, session: &DebateSession) {
        if let Some(slot) = session.current_slot() {
            self.emit_event(DebateEvent::RoundStart {
                index: slot.index,
                label: slot.label(),
                speaker: session.speaker_for(slot.side),
            });
        }
    }

    async fn request_score(&self, session: &DebateSession) -> ScoreResult {
        let prompt = format!(
            "{}\n\n{}",
            session.labeled_transcript("STUDENT", "BOT").join("\n"),
            prompts::render(
                prompts::DEBATE_SCORING,
                &[
                    ("student_side", session.participant_side.display_name()),
                    ("bot_side", session.opponent_side.display_name()),
                ],
            )
        );

        match self
            .generator
            .ask(&prompt, 0.2, self.config.generator.score_max_tokens)
            .await
        {
            Ok(raw) => ScoreResult::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Debate score was not valid JSON, using fallback score");
                ScoreResult::fallback()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Debate score request failed, using fallback score");
                ScoreResult::fallback()
            }
        }
    }

    async fn request_feedback(&self, session: &DebateSession) -> String {
        let student_lines: Vec<String> = session
            .transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Participant)
            .take(MAX_FEEDBACK_LINES)
            .map(|t| format!("[{}] {}", t.round_label, t.text))
            .collect();
        let opponent_lines: Vec<&str> = session
            .transcript
            .iter()
            .filter(|t| t.speaker == Speaker::Opponent)
            .take(MAX_FEEDBACK_LINES)
            .map(|t| t.text.as_str())
            .collect();

        let prompt = prompts::render(
            prompts::DEBATE_FEEDBACK,
            &[
                ("student_side", session.participant_side.display_name()),
                ("student_lines", &student_lines.join("\n")),
                ("opponent_lines", &opponent_lines.join("\n")),
                ("synopsis", &session.synopsis_excerpt),
            ],
        );

        match self
            .generator
            .ask(&prompt, 0.3, self.config.generator.feedback_max_tokens)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("Debate feedback was empty, using fallback text");
                FEEDBACK_FALLBACK.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Debate feedback request failed, using fallback text");
                FEEDBACK_FALLBACK.to_string()
            }
        }
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
