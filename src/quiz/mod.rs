pub mod ai_helper;
pub mod bank;
pub mod parser;

use crate::history::{Difficulty, QuizScoreEntry};

/// One quiz in progress. Lives in the dialogue state and is dropped after
/// scoring; only the resulting `QuizScoreEntry` is kept.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    pub topic: String,
    pub difficulty: Difficulty,
    pub questions: Vec<Question>,
    pub user_answers: Vec<String>,
}

/// What happened to a submitted reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Graded {
    pub correct: bool,
    pub correct_answer: String,
}

impl Quiz {
    pub fn new(topic: impl Into<String>, difficulty: Difficulty, questions: Vec<Question>) -> Self {
        Self {
            topic: topic.into(),
            difficulty,
            questions,
            user_answers: Vec::new(),
        }
    }

    pub fn question_number(&self) -> usize {
        self.user_answers.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.user_answers.len())
    }

    pub fn is_finished(&self) -> bool {
        self.user_answers.len() >= self.questions.len()
    }

    /// Records the reply to the current question. `None` once the quiz is over.
    pub fn answer(&mut self, reply: &str) -> Option<Graded> {
        let question = self.current_question()?;
        let graded = Graded {
            correct: question.is_correct(reply),
            correct_answer: question
                .correct_answer()
                .map(|a| a.text.clone())
                .unwrap_or_default(),
        };
        let reply = question.resolve_reply(reply).unwrap_or(reply.trim()).to_string();
        self.user_answers.push(reply);
        Some(graded)
    }

    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.user_answers)
            .filter(|(question, reply)| question.is_correct(reply))
            .count()
    }

    /// Pairs of (question, given reply) that were answered wrong.
    pub fn mistakes(&self) -> Vec<(&Question, &str)> {
        self.questions
            .iter()
            .zip(&self.user_answers)
            .filter(|(question, reply)| !question.is_correct(reply))
            .map(|(question, reply)| (question, reply.as_str()))
            .collect()
    }

    pub fn score_entry(&self, timestamp: impl Into<String>) -> QuizScoreEntry {
        QuizScoreEntry::from_result(
            self.correct_count(),
            self.questions.len(),
            self.difficulty,
            self.topic.clone(),
            timestamp,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    pub fn new(text: String, answers: Vec<Answer>) -> Self {
        Self {
            text,
            answers,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn correct_answer(&self) -> Option<&Answer> {
        self.answers.iter().find(|a| a.is_correct)
    }

    /// Option label for the answer at `idx`: A, B, C, ...
    pub fn label(idx: usize) -> char {
        (b'A' + (idx % 26) as u8) as char
    }

    /// Maps a reply (an option's text or its letter) onto the option text.
    pub fn resolve_reply(&self, reply: &str) -> Option<&str> {
        let reply = reply.trim();
        if let Some(answer) = self
            .answers
            .iter()
            .find(|a| a.text.trim().eq_ignore_ascii_case(reply))
        {
            return Some(&answer.text);
        }
        let mut chars = reply.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) | (Some(letter), Some(')')) => {
                let letter = letter.to_ascii_uppercase();
                (0..self.answers.len())
                    .find(|idx| Self::label(*idx) == letter)
                    .map(|idx| self.answers[idx].text.as_str())
            }
            _ => None,
        }
    }

    pub fn is_correct(&self, reply: &str) -> bool {
        match (self.resolve_reply(reply), self.correct_answer()) {
            (Some(given), Some(correct)) => given == correct.text,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Answer {
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    pub fn new(text: String, is_correct: bool) -> Self {
        Self { text, is_correct }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, options: &[&str], correct: usize) -> Question {
        Question::new(
            text.to_string(),
            options
                .iter()
                .enumerate()
                .map(|(i, o)| Answer::new(o.to_string(), i == correct))
                .collect(),
        )
    }

    fn sample_quiz() -> Quiz {
        Quiz::new(
            "NCC",
            Difficulty::Medium,
            vec![
                question("Motto?", &["Unity and Discipline", "Honor and Duty"], 0),
                question("Founded?", &["1947", "1948", "1949"], 1),
                question("Wings?", &["Army, Navy, Air Force", "Junior, Senior"], 0),
                question("Aim?", &["Fitness only", "Character building"], 1),
            ],
        )
    }

    #[test]
    fn replies_match_by_text_or_letter() {
        let q = question("Founded?", &["1947", "1948", "1949"], 1);
        assert!(q.is_correct(" 1948 "));
        assert!(q.is_correct("b"));
        assert!(q.is_correct("B)"));
        assert!(!q.is_correct("A"));
        assert!(!q.is_correct("D"));
        assert!(!q.is_correct("nineteen forty eight"));
    }

    #[test]
    fn text_comparison_ignores_case() {
        let q = question("Motto?", &["Unity and Discipline", "Honor and Duty"], 0);
        assert!(q.is_correct("unity and discipline"));
    }

    #[test]
    fn quiz_walks_through_questions_and_scores() {
        let mut quiz = sample_quiz();
        assert_eq!(quiz.current_question().unwrap().text, "Motto?");

        assert!(quiz.answer("Unity and Discipline").unwrap().correct);
        let graded = quiz.answer("1947").unwrap();
        assert!(!graded.correct);
        assert_eq!(graded.correct_answer, "1948");
        assert!(quiz.answer("a").unwrap().correct);
        assert!(!quiz.is_finished());
        assert!(quiz.answer("B").unwrap().correct);

        assert!(quiz.is_finished());
        assert_eq!(quiz.answer("anything"), None);
        assert_eq!(quiz.correct_count(), 3);

        let mistakes = quiz.mistakes();
        assert_eq!(mistakes.len(), 1);
        assert_eq!(mistakes[0].1, "1947");

        let entry = quiz.score_entry("2024-01-01T00:00:00Z");
        assert_eq!(entry.score, 75.0);
        assert_eq!(entry.topic, "NCC");
        assert_eq!(entry.difficulty, Difficulty::Medium);
    }

    #[test]
    fn letter_replies_are_stored_as_option_text() {
        let mut quiz = sample_quiz();
        quiz.answer("a");
        assert_eq!(quiz.user_answers, vec!["Unity and Discipline".to_string()]);
    }
}
