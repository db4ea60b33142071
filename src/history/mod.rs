pub mod difficulty;
pub mod merge;
pub mod remote;
pub mod store;

use std::fmt;

use chrono::{SecondsFormat, Utc};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Upper bound on the number of questions in one quiz of this tier.
    pub fn question_cap(&self) -> usize {
        match self {
            Difficulty::Easy => 3,
            Difficulty::Medium => 5,
            Difficulty::Hard => 8,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Difficulty::Easy => "suitable for beginners with basic knowledge",
            Difficulty::Medium => "moderately challenging for those with some experience",
            Difficulty::Hard => "challenging questions that test in-depth understanding",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finished quiz. Written once and never edited afterwards.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizScoreEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub topic: String,
}

impl QuizScoreEntry {
    /// `correct / total * 100`, frozen at the moment the quiz is scored.
    pub fn from_result(
        correct: usize,
        total: usize,
        difficulty: Difficulty,
        topic: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        let score = if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64 * 100.0
        };
        Self {
            timestamp: timestamp.into(),
            score,
            difficulty,
            topic: topic.into(),
        }
    }
}

/// ISO-8601 UTC timestamp with a fixed width, so string order is time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_a_percentage_of_correct_answers() {
        let entry = QuizScoreEntry::from_result(3, 4, Difficulty::Hard, "Drill", "t");
        assert_eq!(entry.score, 75.0);
        assert_eq!(entry.difficulty, Difficulty::Hard);

        let empty = QuizScoreEntry::from_result(0, 0, Difficulty::Easy, "Drill", "t");
        assert_eq!(empty.score, 0.0);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let entry: QuizScoreEntry = serde_json::from_str(r#"{"topic": "Map Reading"}"#).unwrap();
        assert_eq!(entry.score, 0.0);
        assert_eq!(entry.difficulty, Difficulty::Medium);
        assert_eq!(entry.timestamp, "");
    }

    #[test]
    fn difficulty_is_stored_by_name() {
        let json = serde_json::to_string(&Difficulty::Hard).unwrap();
        assert_eq!(json, "\"Hard\"");
        assert!(serde_json::from_str::<Difficulty>("\"Extreme\"").is_err());
        assert_eq!(Difficulty::Easy.question_cap(), 3);
    }

    #[test]
    fn timestamps_sort_chronologically_as_strings() {
        let first = now_timestamp();
        let second = now_timestamp();
        assert!(first <= second);
        assert!(first.ends_with('Z'));
    }
}
