//! Text generation seam.
//!
//! Every activity talks to the language model through [`TextGenerator`].
//! A call returns text and nothing about that text is guaranteed. Structure
//! is imposed by the callers.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::BookClimbError;

/// Who authored a message in a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Produces natural-language text for a conversation.
///
/// Implementations return `Err` only for transport-level failures. Malformed
/// or off-schema output is returned as `Ok` and handled by the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_length: u32,
    ) -> Result<String, BookClimbError>;

    /// Single user prompt convenience.
    async fn ask(
        &self,
        prompt: &str,
        temperature: f32,
        max_length: u32,
    ) -> Result<String, BookClimbError> {
        self.complete(&[ChatMessage::user(prompt)], temperature, max_length)
            .await
    }
}

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// OpenAI-compatible API base URL.
    pub api_base: String,
    /// API key for authentication.
    pub api_key: String,
    /// Chat model name.
    pub model: String,
}

impl GeneratorSettings {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

/// [`TextGenerator`] backed by an OpenAI-compatible chat completion API.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, BookClimbError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                BookClimbError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = OpenAIConfig::new()
            .with_api_key(&settings.api_key)
            .with_api_base(&settings.api_base);

        Ok(Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: settings.model,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_length: u32,
    ) -> Result<String, BookClimbError> {
        let history: Vec<ChatCompletionRequestMessage> =
            messages.iter().map(to_request_message).collect();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .max_completion_tokens(max_length)
            .messages(history)
            .build()?;

        tracing::debug!(model = %self.model, messages = messages.len(), "Requesting completion");
        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(sanitize_response(&content))
    }
}

fn to_request_message(message: &ChatMessage) -> ChatCompletionRequestMessage {
    let content = message.content.clone();
    match message.role {
        ChatRole::System => {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: content.into(),
                name: None,
            })
        }
        ChatRole::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: content.into(),
            name: None,
        }),
        ChatRole::Assistant => {
            ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                content: Some(content.into()),
                name: None,
                tool_calls: None,
                refusal: None,
                audio: None,
                function_call: None,
            })
        }
    }
}

/// Strip reasoning blocks such as `<thinking>...</thinking>` from model output.
///
/// Line structure is preserved since quiz and score replies are parsed as JSON
/// afterwards.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reasoning",
        "thought",
        "scratchpad",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    result.trim().to_string()
}

/// Remove markdown code fences around generated JSON.
pub fn strip_fence(text: &str) -> String {
    match regex::Regex::new(r"(?m)^```(json)?|```$") {
        Ok(re) => re.replace_all(text.trim(), "").to_string(),
        Err(_) => text.trim().to_string(),
    }
}

/// Remove HTML tags from text returned by search APIs or the generator.
pub fn clean_html(text: &str) -> String {
    match regex::Regex::new(r"<.*?>") {
        Ok(re) => re.replace_all(text, "").to_string(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>The answer is 42.";
        assert_eq!(sanitize_response(input), "The answer is 42.");
    }

    #[test]
    fn test_sanitize_response_keeps_json_lines() {
        let input = "<think>\nplan\n</think>\n[\n  {\"question\": \"Q\"}\n]";
        assert_eq!(sanitize_response(input), "[\n  {\"question\": \"Q\"}\n]");
    }

    #[test]
    fn test_sanitize_response_no_tags() {
        let input = "  No tags here, just text. ";
        assert_eq!(sanitize_response(input), "No tags here, just text.");
    }

    #[test]
    fn test_strip_fence_json_block() {
        let input = "```json\n[1, 2]\n```";
        assert_eq!(strip_fence(input).trim(), "[1, 2]");
    }

    #[test]
    fn test_strip_fence_without_fence() {
        assert_eq!(strip_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_html_strips_markup() {
        assert_eq!(clean_html("<b>어린 왕자</b> 이야기"), "어린 왕자 이야기");
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").content, "a");
    }
}
