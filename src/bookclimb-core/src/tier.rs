//! Difficulty tiers shared by every activity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BookClimbError;

/// Reading level chosen once per session and applied to all activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    /// 쉬움
    Easy,
    /// 기본
    #[default]
    Standard,
    /// 심화
    Advanced,
}

impl DifficultyTier {
    /// Korean label shown to students and written into prompts.
    pub fn label(&self) -> &'static str {
        match self {
            DifficultyTier::Easy => "쉬움",
            DifficultyTier::Standard => "기본",
            DifficultyTier::Advanced => "심화",
        }
    }

    /// Number of debate rounds played at this tier.
    pub fn debate_rounds(&self) -> usize {
        match self {
            DifficultyTier::Easy => 4,
            DifficultyTier::Standard | DifficultyTier::Advanced => 6,
        }
    }

    pub fn all() -> [DifficultyTier; 3] {
        [
            DifficultyTier::Easy,
            DifficultyTier::Standard,
            DifficultyTier::Advanced,
        ]
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DifficultyTier {
    type Err = BookClimbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "쉬움" => Ok(DifficultyTier::Easy),
            "standard" | "basic" | "기본" => Ok(DifficultyTier::Standard),
            "advanced" | "hard" | "심화" => Ok(DifficultyTier::Advanced),
            other => Err(BookClimbError::UnknownTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_english_and_korean_names() {
        assert_eq!("easy".parse::<DifficultyTier>().unwrap(), DifficultyTier::Easy);
        assert_eq!("쉬움".parse::<DifficultyTier>().unwrap(), DifficultyTier::Easy);
        assert_eq!(" Standard ".parse::<DifficultyTier>().unwrap(), DifficultyTier::Standard);
        assert_eq!("심화".parse::<DifficultyTier>().unwrap(), DifficultyTier::Advanced);
    }

    #[test]
    fn test_parse_unknown_tier() {
        let err = "expert".parse::<DifficultyTier>().unwrap_err();
        assert!(matches!(err, BookClimbError::UnknownTier(name) if name == "expert"));
    }

    #[test]
    fn test_only_easy_has_short_debates() {
        assert_eq!(DifficultyTier::Easy.debate_rounds(), 4);
        assert_eq!(DifficultyTier::Standard.debate_rounds(), 6);
        assert_eq!(DifficultyTier::Advanced.debate_rounds(), 6);
    }
}
