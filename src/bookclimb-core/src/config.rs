//! Configuration module for loading TOML config files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::BookClimbError;
use crate::tier::DifficultyTier;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub tiers: TiersConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Model selection and per-request budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    /// Characters of synopsis quoted into debate and feedback prompts.
    pub synopsis_excerpt_chars: usize,
    /// Characters of synopsis quoted into topic recommendation prompts.
    pub topic_excerpt_chars: usize,
    pub quiz_max_tokens: u32,
    pub opponent_max_tokens: u32,
    pub score_max_tokens: u32,
    pub feedback_max_tokens: u32,
    pub topic_max_tokens: u32,
    pub rewrite_max_tokens: u32,
    pub essay_max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            synopsis_excerpt_chars: 1200,
            topic_excerpt_chars: 1600,
            quiz_max_tokens: 900,
            opponent_max_tokens: 420,
            score_max_tokens: 800,
            feedback_max_tokens: 1200,
            topic_max_tokens: 360,
            rewrite_max_tokens: 120,
            essay_max_tokens: 2300,
        }
    }
}

/// Parameters applied to every generation made at a given tier.
#[derive(Debug, Clone, Deserialize)]
pub struct TierParams {
    pub temperature: f32,
    /// Token budget for quiz explanations.
    pub explain_length: u32,
    /// How the generator should speak to the student.
    pub register: String,
    pub quiz_style: String,
    pub explain_guide: String,
    /// How detailed essay revision examples should be.
    pub essay_depth: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiersConfig {
    pub easy: TierParams,
    pub standard: TierParams,
    pub advanced: TierParams,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            easy: TierParams {
                temperature: 0.25,
                explain_length: 900,
                register: "아주 쉬운 말".to_string(),
                quiz_style: "쉽고 명확, 지문 그대로".to_string(),
                explain_guide: "아주 쉽게".to_string(),
                essay_depth: "간단히".to_string(),
            },
            standard: TierParams {
                temperature: 0.35,
                explain_length: 1300,
                register: "친절한 말".to_string(),
                quiz_style: "핵심 사건 이해".to_string(),
                explain_guide: "핵심 이유 중심".to_string(),
                essay_depth: "충분히 자세히".to_string(),
            },
            advanced: TierParams {
                temperature: 0.5,
                explain_length: 1700,
                register: "정확하고 논리적인 말".to_string(),
                quiz_style: "추론/관계".to_string(),
                explain_guide: "근거 인용과 함께".to_string(),
                essay_depth: "구체적 근거와 함께".to_string(),
            },
        }
    }
}

/// Terms rejected in anything a student types.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub banned_terms: Vec<String>,
    pub rewrite_fallback: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            banned_terms: DEFAULT_BANNED_TERMS.iter().map(|t| t.to_string()).collect(),
            rewrite_fallback: "바르고 고운말을 사용해 다시 표현해 보세요.".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BookClimbError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| BookClimbError::ConfigError(format!("Failed to read config: {}", e)))?;

        content.parse()
    }

    /// Parameters for a tier.
    pub fn tier(&self, tier: DifficultyTier) -> &TierParams {
        match tier {
            DifficultyTier::Easy => &self.tiers.easy,
            DifficultyTier::Standard => &self.tiers.standard,
            DifficultyTier::Advanced => &self.tiers.advanced,
        }
    }
}

impl FromStr for Config {
    type Err = BookClimbError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        toml::from_str(content)
            .map_err(|e| BookClimbError::ConfigError(format!("Failed to parse config: {}", e)))
    }
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        generator: GeneratorConfig::default(),
        tiers: TiersConfig::default(),
        safety: SafetyConfig::default(),
    }
}

const DEFAULT_BANNED_TERMS: &[&str] = &[
    "씨발", "시발", "병신", "ㅄ", "ㅂㅅ", "좆", "개새끼", "새끼", "좆같", "ㅈ같", "니애미", "느금",
    "개같", "꺼져", "죽어", "염병", "씹", "sex", "porn",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_follow_reading_levels() {
        let config = default_config();
        assert_eq!(config.tier(DifficultyTier::Easy).temperature, 0.25);
        assert_eq!(config.tier(DifficultyTier::Standard).explain_length, 1300);
        assert_eq!(config.tier(DifficultyTier::Advanced).register, "정확하고 논리적인 말");
        assert_eq!(config.tier(DifficultyTier::Easy).essay_depth, "간단히");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = r#"
            [generator]
            model = "gpt-4o-mini"

            [safety]
            banned_terms = ["바보"]
        "#
        .parse()
        .unwrap();

        assert_eq!(config.generator.model, "gpt-4o-mini");
        assert_eq!(config.generator.opponent_max_tokens, 420);
        assert_eq!(config.generator.essay_max_tokens, 2300);
        assert_eq!(config.safety.banned_terms, vec!["바보".to_string()]);
        assert!(!config.safety.rewrite_fallback.is_empty());
        assert_eq!(config.tier(DifficultyTier::Easy).explain_length, 900);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = "[generator\nmodel=".parse::<Config>().unwrap_err();
        assert!(matches!(err, BookClimbError::ConfigError(_)));
    }
}
