//! Round structure of a reading debate.
//!
//! Rounds are numbered from 1. Odd rounds belong to the "for" side and even
//! rounds to the "against" side, in pairs: opening statements, rebuttals and,
//! above the easy tier, closing statements.

use serde::{Deserialize, Serialize};

use crate::config::TierParams;
use crate::participant::Side;
use crate::prompts;
use crate::tier::DifficultyTier;
use crate::topic::DebateTopic;

/// Kind of speech made in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// 입론
    Opening,
    /// 반론
    Rebuttal,
    /// 최후 변론
    Closing,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Opening => "입론",
            Stage::Rebuttal => "반론",
            Stage::Closing => "최후 변론",
        }
    }
}

/// One slot in the round order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebateRound {
    pub index: u8,
    pub side: Side,
    pub stage: Stage,
}

impl DebateRound {
    /// Rounds 1..=6. Other indices do not exist.
    pub fn new(index: u8) -> Option<Self> {
        let stage = match index {
            1 | 2 => Stage::Opening,
            3 | 4 => Stage::Rebuttal,
            5 | 6 => Stage::Closing,
            _ => return None,
        };
        Some(Self {
            index,
            side: side_of_round(index),
            stage,
        })
    }

    /// Label announced for the round, e.g. "찬성측 입론".
    pub fn label(&self) -> String {
        format!("{}측 {}", self.side.display_name(), self.stage.display_name())
    }
}

/// Side that speaks in a round: odd → for, even → against.
pub fn side_of_round(index: u8) -> Side {
    if index % 2 == 1 { Side::For } else { Side::Against }
}

/// Fixed round order for a tier.
pub fn round_order(tier: DifficultyTier) -> Vec<u8> {
    (1..=tier.debate_rounds() as u8).collect()
}

/// Opening system message establishing topic, rounds and grounding rules.
pub fn framing_message(
    topic: &DebateTopic,
    tier: DifficultyTier,
    params: &TierParams,
    order: &[u8],
    synopsis_excerpt: &str,
) -> String {
    let rounds = order
        .iter()
        .filter_map(|i| DebateRound::new(*i))
        .map(|r| format!("{}{}", r.index, r.label().replace(' ', "")))
        .collect::<Vec<_>>()
        .join(" ");

    prompts::render(
        prompts::DEBATE_FRAMING,
        &[
            ("level", tier.label()),
            ("register", &params.register),
            ("topic", topic.as_str()),
            ("rounds", &rounds),
            ("synopsis", synopsis_excerpt),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_easy_has_four_rounds() {
        assert_eq!(round_order(DifficultyTier::Easy), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_other_tiers_have_six_rounds() {
        assert_eq!(round_order(DifficultyTier::Standard), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(round_order(DifficultyTier::Advanced), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_odd_rounds_are_for_even_against() {
        for tier in DifficultyTier::all() {
            for index in round_order(tier) {
                let expected = if index % 2 == 1 { Side::For } else { Side::Against };
                assert_eq!(side_of_round(index), expected);
                assert_eq!(DebateRound::new(index).unwrap().side, expected);
            }
        }
    }

    #[test]
    fn test_round_labels() {
        assert_eq!(DebateRound::new(1).unwrap().label(), "찬성측 입론");
        assert_eq!(DebateRound::new(4).unwrap().label(), "반대측 반론");
        assert_eq!(DebateRound::new(6).unwrap().label(), "반대측 최후 변론");
        assert!(DebateRound::new(0).is_none());
        assert!(DebateRound::new(7).is_none());
    }

    #[test]
    fn test_framing_lists_rounds_and_grounding() {
        let config = default_config();
        let topic = DebateTopic::new("약속을 지켜야 한다.", false);
        let order = round_order(DifficultyTier::Easy);
        let text = framing_message(
            &topic,
            DifficultyTier::Easy,
            config.tier(DifficultyTier::Easy),
            &order,
            "여우와 왕자의 이야기",
        );

        assert!(text.contains("주제 '약속을 지켜야 한다.'"));
        assert!(text.contains("1찬성측입론 2반대측입론 3찬성측반론 4반대측반론"));
        assert!(!text.contains("최후"));
        assert!(text.contains("여우와 왕자의 이야기"));
        assert!(text.contains("아주 쉬운 말"));
    }
}
