use super::{Difficulty, QuizScoreEntry};

/// How many of the most recent attempts drive the next tier.
pub const RECENT_WINDOW: usize = 5;
pub const HARD_THRESHOLD: f64 = 80.0;
pub const MEDIUM_THRESHOLD: f64 = 60.0;

/// Picks the tier of the next quiz from the mean of the last few scores.
/// `history` is expected oldest first. Boundary scores go to the higher tier.
pub fn select_difficulty(history: &[QuizScoreEntry]) -> Difficulty {
    match recent_average(history) {
        None => Difficulty::default(),
        Some(avg) if avg >= HARD_THRESHOLD => Difficulty::Hard,
        Some(avg) if avg >= MEDIUM_THRESHOLD => Difficulty::Medium,
        Some(_) => Difficulty::Easy,
    }
}

/// Mean score of the last `RECENT_WINDOW` attempts, `None` for no history.
pub fn recent_average(history: &[QuizScoreEntry]) -> Option<f64> {
    let start = history.len().saturating_sub(RECENT_WINDOW);
    average(&history[start..])
}

pub fn average(entries: &[QuizScoreEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    let total: f64 = entries.iter().map(|e| e.score).sum();
    Some(total / entries.len() as f64)
}

/// Requested quiz length clamped to `1..=10`, then capped by the tier.
pub fn question_count(requested: usize, difficulty: Difficulty) -> usize {
    requested.clamp(1, 10).min(difficulty.question_cap())
}
