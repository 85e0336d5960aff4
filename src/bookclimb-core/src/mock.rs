//! Scripted text generator for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::BookClimbError;
use crate::generator::{ChatMessage, TextGenerator};

/// A reply queued on a [`ScriptedGenerator`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Failure(String),
}

/// A request the generator received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_length: u32,
}

impl RecordedRequest {
    /// Content of the final message, usually the instruction.
    pub fn last_content(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// Returns queued replies in order and records every request.
///
/// Once the queue is empty every call returns `fallback`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    fallback: String,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| ScriptedReply::Text(r.into()))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            fallback: String::new(),
        }
    }

    /// Always answer with the same text.
    pub fn constant(response: &str) -> Self {
        Self {
            fallback: response.to_string(),
            ..Self::default()
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(reply);
        }
    }

    /// Snapshot of the requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_length: u32,
    ) -> Result<String, BookClimbError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(RecordedRequest {
                messages: messages.to_vec(),
                temperature,
                max_length,
            });
        }

        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Failure(reason)) => Err(BookClimbError::Generation(reason)),
            None => Ok(self.fallback.clone()),
        }
    }
}
