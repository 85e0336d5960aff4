//! Debate sides and speakers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BookClimbError;

/// Stance taken on the debate topic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Arguing in favor of the topic (찬성).
    For,
    /// Arguing against the topic (반대).
    Against,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::For => Side::Against,
            Side::Against => Side::For,
        }
    }

    /// Korean name used in prompts and records.
    pub fn display_name(&self) -> &'static str {
        match self {
            Side::For => "찬성",
            Side::Against => "반대",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Side {
    type Err = BookClimbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "for" | "pro" | "찬성" => Ok(Side::For),
            "against" | "con" | "반대" => Ok(Side::Against),
            other => Err(BookClimbError::UnknownSide(other.to_string())),
        }
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human student.
    Participant,
    /// The generated opponent.
    Opponent,
}

impl Speaker {
    pub fn display_name(&self) -> &'static str {
        match self {
            Speaker::Participant => "학생",
            Speaker::Opponent => "챗봇",
        }
    }
}
