//! Prompt templates sent to the text generator.
//!
//! Templates use `{placeholder}` markers that are filled with
//! [`render`]. The wording targets elementary-school readers.

use regex::{Captures, Regex};

/// Fill `{key}` markers in a template.
///
/// Markers are resolved in one pass over the template, so substituted
/// values are never scanned again. Unknown markers are left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    match Regex::new(r"\{(\w+)\}") {
        Ok(re) => re
            .replace_all(template, |caps: &Captures| {
                vars.iter()
                    .find(|(key, _)| *key == &caps[1])
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned(),
        Err(_) => template.to_string(),
    }
}

/// Take at most `limit` characters from the start of `text`.
pub fn excerpt(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub const QUIZ_REQUEST: &str = "책 '{title}' 줄거리 기반 5문항 4지선다 JSON. question/options(4)/correct_answer(1~4). \
난이도:{level}, 스타일:{style}. 정답 번호 분포 고르게.\n\n줄거리:\n{synopsis}";

pub const QUIZ_EXPLANATION: &str =
    "다음 JSON으로 각 문항 해설과 총평을 한국어로 작성. 난이도:{level} {guide}.\n{payload}";

pub const TOPIC_REQUEST: &str = "너는 초등 독서토론 교사야. 아래 책 '{title}'의 줄거리를 바탕으로 \
초등학생이 토론하기 좋은 **일반적인 찬반 토론 주제 2가지**를 추천해줘. \
각 주제는 반드시 **'…해야 한다.'** 또는 **'…하는 것이 옳다.'** 로 끝나는 문장형으로 써. \
질문형(물음표) 금지, 쉬운 말 사용.\n\
출력은 JSON 배열: [\"주제1\", \"주제2\"]\n\n줄거리:\n{synopsis}";

pub const POLITE_REWRITE: &str = "다음 문장을 초등학생에게 어울리는 바르고 고운말로 바꿔줘. \
의미는 유지하고 공격적 표현은 모두 제거:\n{text}";

pub const DEBATE_FRAMING: &str = "초등 독서토론 진행자. 모든 발언은 반드시 책의 줄거리 근거. \
난이도:{level}, 어조:{register}. 주제 '{topic}'. {rounds}. 근거는 다음 줄거리에서만:\n{synopsis}";

pub const DEBATE_SCORING: &str = "아래는 초등학생과 챗봇의 찬반 토론 대화입니다.\n\
각 측에 대해 5가지 기준을 0~20점으로 채점, 총점 100점.\n\
기준: 1줄거리 이해 2생각을 분명히 말함(책과 연결) 3근거 제시 4질문에 답하고 잇기 5새로운 질문/깊이.\n\
학생(STUDENT)은 '{student_side}', BOT은 '{bot_side}'. JSON만:\n\
{\"pro\":{\"criteria_scores\":[..5..],\"total\":정수},\"con\":{\"criteria_scores\":[..5..],\"total\":정수},\"winner\":\"찬성|반대\"}";

pub const DEBATE_FEEDBACK: &str = "너는 초등 토론 코치야. 아래 '학생 발언'만 근거로 서술형 피드백을 써줘. \
챗봇 발언은 참고만.\n\
구성: ① 총평 ② 잘한 점 ③ 더 나아질 점 ④ 다음 토론 팁(행동문장). 쉬운 말 사용.\n\n\
[학생 측:{student_side}] 발언:\n{student_lines}\n\n(참고) 상대 발언:\n{opponent_lines}\n\n\
토론의 근거가 된 줄거리:\n{synopsis}";

pub const ESSAY_FEEDBACK: &str = "너는 초등 글쓰기 코치야. 학생 감상문을 **선택한 책의 줄거리**와 비교하여 \
칭찬과 수정 제안을 해줘. 점수/일치도 말하지 마.\n\
출력: 1) 내용 피드백 2) 표현·구성 피드백 3) 수정 예시({depth})\n\n\
선택 책: {title}\n줄거리:\n{synopsis}\n\n학생 감상문:\n{essay}";
