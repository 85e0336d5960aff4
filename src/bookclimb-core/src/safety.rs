//! Content checks for text typed by students.

use regex::{Regex, RegexBuilder};

use crate::config::{GeneratorConfig, SafetyConfig};
use crate::error::BookClimbError;
use crate::generator::TextGenerator;
use crate::prompts;

/// Decides whether a piece of student text may be accepted.
pub trait SafetyFilter: Send + Sync {
    fn contains_violation(&self, text: &str) -> bool;
}

/// Case-insensitive banned-term matcher.
#[derive(Debug, Clone)]
pub struct LexiconFilter {
    pattern: Option<Regex>,
}

impl LexiconFilter {
    pub fn new<I, S>(terms: I) -> Result<Self, BookClimbError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternation = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| regex::escape(&t))
            .collect::<Vec<_>>()
            .join("|");

        if alternation.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .map_err(|e| BookClimbError::ConfigError(format!("Invalid banned term list: {}", e)))?;

        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn from_config(config: &SafetyConfig) -> Result<Self, BookClimbError> {
        Self::new(&config.banned_terms)
    }
}

impl SafetyFilter for LexiconFilter {
    fn contains_violation(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// Ask the generator for a polite version of a rejected sentence.
///
/// Never fails: a generation error or an empty reply yields `fallback`.
pub async fn rewrite_politely(
    generator: &dyn TextGenerator,
    text: &str,
    settings: &GeneratorConfig,
    fallback: &str,
) -> String {
    let prompt = prompts::render(prompts::POLITE_REWRITE, &[("text", text)]);
    match generator.ask(&prompt, 0.2, settings.rewrite_max_tokens).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => fallback.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Polite rewrite failed, using fallback suggestion");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mock::{ScriptedGenerator, ScriptedReply};

    #[test]
    fn test_default_lexicon_flags_banned_terms() {
        let filter = LexiconFilter::from_config(&default_config().safety).unwrap();
        assert!(filter.contains_violation("너 진짜 병신이야"));
        assert!(filter.contains_violation("SEX"));
        assert!(!filter.contains_violation("주인공은 용기를 냈어요."));
    }

    #[test]
    fn test_terms_are_matched_literally() {
        let filter = LexiconFilter::new(["a.b"]).unwrap();
        assert!(filter.contains_violation("xa.bx"));
        assert!(!filter.contains_violation("axb"));
    }

    #[test]
    fn test_empty_lexicon_allows_everything() {
        let filter = LexiconFilter::new(Vec::<String>::new()).unwrap();
        assert!(!filter.contains_violation("아무 말"));
    }

    #[tokio::test]
    async fn test_rewrite_uses_generator_reply() {
        let generator = ScriptedGenerator::new(["  고운 말로 바꾼 문장  "]);
        let config = default_config();
        let out = rewrite_politely(&generator, "나쁜 말", &config.generator, "fallback").await;
        assert_eq!(out, "고운 말로 바꾼 문장");
        assert!(generator.requests()[0].last_content().contains("나쁜 말"));
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_on_failure() {
        let generator = ScriptedGenerator::default();
        generator.push(ScriptedReply::Failure("down".to_string()));
        let config = default_config();
        let out = rewrite_politely(&generator, "나쁜 말", &config.generator, "fallback").await;
        assert_eq!(out, "fallback");
    }
}
