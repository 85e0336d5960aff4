//! Learning events recorded for a student.
//!
//! Recording is fire-and-forget: [`record_event`] logs a sink failure and
//! moves on, it is never retried and never reaches the student.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

use crate::error::BookClimbError;
use crate::orchestrator::DebateSession;
use crate::quiz::QuizGrade;
use crate::tier::DifficultyTier;

/// Kind of activity an event describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Quiz,
    Debate,
    Essay,
}

/// One stored event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningEvent {
    pub subject_id: String,
    pub category: EventCategory,
    pub recorded_at: DateTime<Utc>,
    pub payload: Value,
}

impl LearningEvent {
    pub fn new(subject_id: &str, category: EventCategory, payload: Value) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            category,
            recorded_at: Utc::now(),
            payload,
        }
    }
}

/// Destination for learning events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: LearningEvent) -> Result<(), BookClimbError>;
}

/// Record an event, logging instead of failing.
pub async fn record_event(
    sink: &dyn EventSink,
    subject_id: &str,
    category: EventCategory,
    payload: Value,
) {
    let event = LearningEvent::new(subject_id, category, payload);
    if let Err(e) = sink.record(event).await {
        tracing::warn!(subject_id, ?category, error = %e, "Failed to record learning event");
    }
}

/// Payload for a graded quiz.
pub fn quiz_payload(title: &str, grade: &QuizGrade, tier: DifficultyTier) -> Value {
    json!({
        "title": title,
        "score": grade.score,
        "correct": grade.correct,
        "level": tier.label(),
    })
}

/// Payload for a debate. Totals are zero and the winner is "-" until the
/// debate has been scored.
pub fn debate_payload(title: &str, session: &DebateSession) -> Value {
    let (pro_total, con_total, winner, feedback) = match session.outcome() {
        Some(outcome) => (
            outcome.score.for_side.total,
            outcome.score.against_side.total,
            outcome.score.winner.display_name(),
            outcome.feedback.as_str(),
        ),
        None => (0, 0, "-", ""),
    };

    json!({
        "title": title,
        "topic": session.topic().as_str(),
        "pro_total": pro_total,
        "con_total": con_total,
        "winner": winner,
        "transcript": session.labeled_transcript("STUDENT", "BOT"),
        "feedback": feedback,
    })
}

/// Payload for essay feedback.
pub fn essay_payload(title: &str, essay: &str, feedback: &str, tier: DifficultyTier) -> Value {
    json!({
        "title": title,
        "essay": essay,
        "feedback": feedback,
        "level": tier.label(),
    })
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn record(&self, event: LearningEvent) -> Result<(), BookClimbError> {
        tracing::info!(
            subject_id = %event.subject_id,
            category = ?event.category,
            payload = %event.payload,
            "Learning event"
        );
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LearningEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<LearningEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn record(&self, event: LearningEvent) -> Result<(), BookClimbError> {
        self.events
            .lock()
            .map_err(|_| BookClimbError::Storage("event store lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Appends events to a file, one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn record(&self, event: LearningEvent) -> Result<(), BookClimbError> {
        let mut line = serde_json::to_string(&event)
            .map_err(|e| BookClimbError::Storage(format!("Failed to encode event: {}", e)))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                BookClimbError::Storage(format!(
                    "Failed to open event log {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BookClimbError::Storage(format!("Failed to write event: {}", e)))?;
        // The write runs on a blocking task; it is only done once flushed.
        file.flush()
            .await
            .map_err(|e| BookClimbError::Storage(format!("Failed to flush event log: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mock::ScriptedGenerator;
    use crate::orchestrator::DebateEngine;
    use crate::participant::Side;
    use crate::safety::LexiconFilter;
    use crate::topic::DebateTopic;
    use std::sync::Arc;

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn record(&self, _event: LearningEvent) -> Result<(), BookClimbError> {
            Err(BookClimbError::Storage("disk full".to_string()))
        }
    }

    #[test]
    fn test_quiz_payload_fields() {
        let grade = QuizGrade {
            correct: vec![true, false, true, true, false],
            score: 60,
        };
        let payload = quiz_payload("어린 왕자", &grade, DifficultyTier::Advanced);
        assert_eq!(payload["title"], "어린 왕자");
        assert_eq!(payload["score"], 60);
        assert_eq!(payload["correct"][1], false);
        assert_eq!(payload["level"], "심화");
    }

    #[tokio::test]
    async fn test_debate_payload_after_scoring() {
        let generator = Arc::new(ScriptedGenerator::new([
            "상대1",
            "상대2",
            r#"{"pro":{"criteria_scores":[10,10,10,10,10],"total":50},"con":{"criteria_scores":[8,8,8,8,8],"total":40},"winner":"찬성"}"#,
            "좋았어요",
        ]));
        let engine = DebateEngine::new(
            generator,
            Arc::new(LexiconFilter::new(Vec::<String>::new()).unwrap()),
            default_config(),
        );
        let mut session = engine.start(
            DebateTopic::new("약속을 지켜야 한다.", false),
            DifficultyTier::Easy,
            Side::For,
            "줄거리",
        );

        let pending = debate_payload("책", &session);
        assert_eq!(pending["winner"], "-");
        assert_eq!(pending["pro_total"], 0);

        engine.submit_turn(&mut session, "첫 발언").await.unwrap();
        engine.opponent_turn(&mut session).await.unwrap();
        engine.submit_turn(&mut session, "두 번째 발언").await.unwrap();
        engine.opponent_turn(&mut session).await.unwrap();
        engine.conclude(&mut session).await.unwrap();

        let payload = debate_payload("책", &session);
        assert_eq!(payload["topic"], "약속을 지켜야 한다.");
        assert_eq!(payload["pro_total"], 50);
        assert_eq!(payload["con_total"], 40);
        assert_eq!(payload["winner"], "찬성");
        assert_eq!(payload["feedback"], "좋았어요");
        assert_eq!(payload["transcript"][0], "STUDENT(찬성): [찬성측 입론] 첫 발언");
        assert_eq!(payload["transcript"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_essay_payload_fields() {
        let payload = essay_payload("어린 왕자", "감상문", "피드백", DifficultyTier::Easy);
        assert_eq!(payload["essay"], "감상문");
        assert_eq!(payload["feedback"], "피드백");
        assert_eq!(payload["level"], "쉬움");
    }

    #[test]
    fn test_recorded_at_serializes_as_rfc3339() {
        let event = LearningEvent::new("s1", EventCategory::Essay, json!({}));
        let encoded = serde_json::to_value(&event).unwrap();
        let stamp = encoded["recorded_at"].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), event.recorded_at);
        assert_eq!(encoded["category"], "essay");
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_events() {
        let sink = MemorySink::default();
        record_event(&sink, "s1", EventCategory::Quiz, json!({"score": 100})).await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject_id, "s1");
        assert_eq!(events[0].category, EventCategory::Quiz);
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        record_event(&FailingSink, "s1", EventCategory::Debate, json!({})).await;
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let path = std::env::temp_dir().join(format!(
            "bookclimb-events-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let sink = JsonLinesSink::new(&path);

        record_event(&sink, "s1", EventCategory::Quiz, json!({"score": 80})).await;
        record_event(&sink, "s1", EventCategory::Debate, json!({"winner": "-"})).await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LearningEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.payload["score"], 80);
        assert!(lines[1].contains("\"category\":\"debate\""));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unwritable_event_log_is_storage_error() {
        let sink = JsonLinesSink::new(std::env::temp_dir());
        let err = sink
            .record(LearningEvent::new("s1", EventCategory::Quiz, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, BookClimbError::Storage(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_json_lines_record_is_on_disk_when_it_returns() {
        let path = std::env::temp_dir().join(format!(
            "bookclimb-events-durable-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let sink = JsonLinesSink::new(&path);

        for i in 1..=50 {
            sink.record(LearningEvent::new("s1", EventCategory::Quiz, json!({ "n": i })))
                .await
                .unwrap();
            let content = std::fs::read_to_string(&path).unwrap();
            let lines: Vec<&str> = content.lines().collect();
            assert_eq!(lines.len(), i);
            let last: LearningEvent = serde_json::from_str(lines[i - 1]).unwrap();
            assert_eq!(last.payload["n"], i);
        }
        let _ = std::fs::remove_file(&path);
    }
}
