use std::sync::LazyLock;

use regex::Regex;

use super::{Answer, Question};

static QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Q:\s*(.*)").expect("valid regex"));
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-D])\)\s*(.*)").expect("valid regex"));
static ANSWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*ANSWER:\s*([A-D])").expect("valid regex"));
static EXPLANATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*EXPLANATION:\s*(.*)").expect("valid regex"));

const OPTION_COUNT: usize = 4;

/// Parses the model's `Q:` / `A)`..`D)` / `ANSWER:` / `EXPLANATION:` blocks,
/// separated by `---`. Incomplete blocks are skipped.
pub fn parse_quiz_response(response: &str) -> Vec<Question> {
    response
        .trim()
        .split("---")
        .filter(|block| !block.trim().is_empty())
        .filter_map(|block| {
            let parsed = parse_block(block);
            if parsed.is_none() {
                log::warn!("Skipping invalid question block:\n{}", block.trim());
            }
            parsed
        })
        .collect()
}

fn parse_block(block: &str) -> Option<Question> {
    let mut text = String::new();
    let mut options: Vec<(char, String)> = Vec::new();
    let mut answer: Option<char> = None;
    let mut explanation = String::new();

    for line in block.lines() {
        if let Some(caps) = QUESTION_RE.captures(line) {
            text = caps[1].trim().to_string();
        } else if let Some(caps) = OPTION_RE.captures(line) {
            let letter = caps[1].chars().next()?;
            let option = caps[2].trim().to_string();
            match options.iter_mut().find(|(l, _)| *l == letter) {
                Some(existing) => existing.1 = option,
                None => options.push((letter, option)),
            }
        } else if let Some(caps) = ANSWER_RE.captures(line) {
            answer = caps[1].chars().next();
        } else if let Some(caps) = EXPLANATION_RE.captures(line) {
            explanation = caps[1].trim().to_string();
        }
    }

    let answer = answer?;
    if text.is_empty()
        || explanation.is_empty()
        || options.len() != OPTION_COUNT
        || !options.iter().any(|(letter, _)| *letter == answer)
    {
        return None;
    }

    options.sort_by_key(|(letter, _)| *letter);
    let answers = options
        .into_iter()
        .map(|(letter, option)| Answer::new(option, letter == answer))
        .collect();
    Some(Question::new(text, answers).with_explanation(explanation))
}
