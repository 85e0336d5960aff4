//! Debate topic sentences.
//!
//! A debate topic must be a statement, never a question, and must end in
//! one of two terminal forms: the obligation form ("…야 한다.") or the
//! correctness form ("…옳다."). [`normalize`] forces any candidate sentence
//! into one of them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::GeneratorConfig;
use crate::generator::{TextGenerator, clean_html, strip_fence};
use crate::prompts;

/// Terminal form of the obligation ending.
pub const MUST_ENDING: &str = "야 한다.";
/// Terminal form of the correctness ending.
pub const RIGHT_ENDING: &str = "옳다.";

const MUST_SUFFIX: &str = "해야 한다.";
const RIGHT_SUFFIX: &str = "하는 것이 옳다.";
const CORRECTNESS_MARKER: char = '옳';

// Longest first: the first matching entry is stripped.
const SOFTENING_SUFFIXES: &[&str] = &[
    "맞을까요", "좋을까요", "인가요", "일까요", "될까요", "할까요", "하나요", "될까", "할까", "까요",
    "나요", "해요", "요",
];

const FALLBACK_TOPICS: [&str; 2] = ["약속을 지켜야 한다.", "힘들 때는 도움을 요청하는 것이 옳다."];

/// A topic sentence in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebateTopic(String);

impl DebateTopic {
    /// Normalize a candidate sentence into a topic.
    pub fn new(candidate: &str, prefer_alternate_form: bool) -> Self {
        normalize(candidate, prefer_alternate_form)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DebateTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DebateTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a candidate topic sentence.
///
/// `prefer_alternate_form` picks the correctness ending when an ending has
/// to be appended. A sentence that mentions correctness (`옳`) always takes
/// the correctness ending, cut at the last mention.
pub fn normalize(candidate: &str, prefer_alternate_form: bool) -> DebateTopic {
    let unquestioned: String = candidate
        .trim()
        .chars()
        .filter(|c| !matches!(c, '?' | '？'))
        .collect();
    let sentence = strip_softening_suffix(unquestioned.trim());

    if let Some(idx) = sentence.rfind(CORRECTNESS_MARKER) {
        return DebateTopic(format!("{}{}", &sentence[..idx], RIGHT_ENDING));
    }

    let stem = sentence.trim_end_matches('.').trim_end();
    if stem.ends_with("야 한다") {
        return DebateTopic(format!("{}.", stem));
    }

    let topic = if stem.is_empty() {
        if prefer_alternate_form {
            RIGHT_SUFFIX.to_string()
        } else {
            MUST_SUFFIX.to_string()
        }
    } else if stem.ends_with('야') && !prefer_alternate_form {
        // "지켜야" already carries the obligation, only the verb is missing.
        format!("{} 한다.", stem)
    } else if prefer_alternate_form {
        format!("{} {}", stem, RIGHT_SUFFIX)
    } else {
        format!("{} {}", stem, MUST_SUFFIX)
    };

    DebateTopic(topic)
}

fn strip_softening_suffix(sentence: &str) -> &str {
    let body = sentence.trim_end_matches('.').trim_end();
    SOFTENING_SUFFIXES
        .iter()
        .find_map(|suffix| body.strip_suffix(suffix))
        .map(str::trim_end)
        .unwrap_or(sentence)
}

/// Ask the generator for two debate topics about a book.
///
/// Makes up to `attempts` requests. The first topic takes the obligation
/// ending and the second the correctness ending. When no attempt yields two
/// usable sentences a fixed pair of general topics is returned.
pub async fn recommend_topics(
    generator: &dyn TextGenerator,
    title: &str,
    synopsis: &str,
    avoid: &[DebateTopic],
    settings: &GeneratorConfig,
    attempts: usize,
) -> [DebateTopic; 2] {
    let mut prompt = prompts::render(
        prompts::TOPIC_REQUEST,
        &[
            ("title", title),
            ("synopsis", prompts::excerpt(synopsis, settings.topic_excerpt_chars)),
        ],
    );
    if !avoid.is_empty() {
        let used: Vec<&str> = avoid.iter().map(DebateTopic::as_str).collect();
        prompt.push_str("\n\n이미 나온 주제는 피해서 추천해줘:\n");
        prompt.push_str(&used.join("\n"));
    }

    for attempt in 1..=attempts {
        let raw = match generator.ask(&prompt, 0.5, settings.topic_max_tokens).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Topic recommendation request failed");
                continue;
            }
        };

        let candidates = parse_topic_list(&raw);
        if candidates.len() >= 2 {
            return [
                normalize(&candidates[0], false),
                normalize(&candidates[1], true),
            ];
        }
        tracing::warn!(attempt, "Topic recommendation did not contain two topics");
    }

    [
        normalize(FALLBACK_TOPICS[0], false),
        normalize(FALLBACK_TOPICS[1], true),
    ]
}

fn parse_topic_list(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<serde_json::Value>>(&strip_fence(raw))
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| clean_html(s).trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
