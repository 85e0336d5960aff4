//! Feedback on a student's book report.
//!
//! The essay is compared against the synopsis of the selected book. How
//! detailed the revision examples are depends on the tier.

use crate::config::Config;
use crate::error::BookClimbError;
use crate::generator::TextGenerator;
use crate::prompts;
use crate::tier::DifficultyTier;

/// Title used when no book has been selected.
pub const UNTITLED: &str = "제목 없음";

/// Ask the generator for praise and revision suggestions on an essay.
///
/// A blank essay is refused before any request is made. Transport
/// failures are returned to the caller.
pub async fn request_essay_feedback(
    generator: &dyn TextGenerator,
    title: &str,
    synopsis: &str,
    essay: &str,
    tier: DifficultyTier,
    config: &Config,
) -> Result<String, BookClimbError> {
    let essay = essay.trim();
    if essay.is_empty() {
        return Err(BookClimbError::EmptyEssay);
    }

    let params = config.tier(tier);
    let title = if title.trim().is_empty() { UNTITLED } else { title };
    let prompt = prompts::render(
        prompts::ESSAY_FEEDBACK,
        &[
            ("depth", &params.essay_depth),
            ("title", title),
            ("synopsis", synopsis),
            ("essay", essay),
        ],
    );

    let feedback = generator
        .ask(&prompt, params.temperature, config.generator.essay_max_tokens)
        .await?;

    if feedback.trim().is_empty() {
        tracing::warn!(%tier, "Essay feedback came back empty");
    }
    Ok(feedback.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::mock::{ScriptedGenerator, ScriptedReply};

    #[tokio::test]
    async fn test_feedback_request_uses_tier_settings() {
        let generator = ScriptedGenerator::new(["  잘 썼어요. 근거를 더 넣어 봐요.  "]);
        let config = default_config();
        let feedback = request_essay_feedback(
            &generator,
            "어린 왕자",
            "여우와 왕자의 이야기",
            "왕자가 여우와 친구가 되어서 좋았다.",
            DifficultyTier::Advanced,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(feedback, "잘 썼어요. 근거를 더 넣어 봐요.");
        let request = &generator.requests()[0];
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.max_length, 2300);
        let prompt = request.last_content();
        assert!(prompt.contains("수정 예시(구체적 근거와 함께)"));
        assert!(prompt.contains("선택 책: 어린 왕자"));
        assert!(prompt.contains("줄거리:\n여우와 왕자의 이야기"));
        assert!(prompt.contains("학생 감상문:\n왕자가 여우와 친구가 되어서 좋았다."));
    }

    #[tokio::test]
    async fn test_easy_tier_asks_for_brief_examples() {
        let generator = ScriptedGenerator::constant("피드백");
        let config = default_config();
        request_essay_feedback(&generator, "", "", "재미있었다.", DifficultyTier::Easy, &config)
            .await
            .unwrap();

        let prompt = generator.requests()[0].last_content().to_string();
        assert!(prompt.contains("수정 예시(간단히)"));
        assert!(prompt.contains(&format!("선택 책: {}", UNTITLED)));
    }

    #[tokio::test]
    async fn test_blank_essay_is_refused_without_request() {
        let generator = ScriptedGenerator::constant("피드백");
        let config = default_config();
        let err = request_essay_feedback(
            &generator,
            "책",
            "줄거리",
            "   \n ",
            DifficultyTier::Standard,
            &config,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, BookClimbError::EmptyEssay));
        assert_eq!(generator.request_count(), 0);
    }

    #[tokio::test]
    async fn test_essay_text_is_not_treated_as_template() {
        let generator = ScriptedGenerator::constant("피드백");
        let config = default_config();
        request_essay_feedback(
            &generator,
            "책",
            "숨은 줄거리",
            "내 감상문 {synopsis}",
            DifficultyTier::Standard,
            &config,
        )
        .await
        .unwrap();

        let prompt = generator.requests()[0].last_content().to_string();
        assert!(prompt.ends_with("내 감상문 {synopsis}"));
        assert_eq!(prompt.matches("숨은 줄거리").count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let generator = ScriptedGenerator::default();
        generator.push(ScriptedReply::Failure("timeout".to_string()));
        let config = default_config();
        let result = request_essay_feedback(
            &generator,
            "책",
            "줄거리",
            "감상문",
            DifficultyTier::Standard,
            &config,
        )
        .await;
        assert!(matches!(result, Err(BookClimbError::Generation(_))));
    }
}
