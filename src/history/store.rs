use std::path::{Path, PathBuf};

use super::QuizScoreEntry;
use crate::error::StoreError;
use crate::storage;

pub const SCORE_HISTORY_FILE: &str = "quiz_score_history.json";

/// Append-only list of finished quizzes, kept as one JSON file per user.
#[derive(Debug, Clone)]
pub struct ScoreHistoryStore {
    path: PathBuf,
}

impl ScoreHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SCORE_HISTORY_FILE))
    }

    /// Entries that cannot be decoded are skipped, not dropped from the file.
    pub fn load(&self) -> Vec<QuizScoreEntry> {
        storage::read_json_list(&self.path)
    }

    /// Fails without touching the file when its current content is unreadable.
    pub fn append(&self, entry: QuizScoreEntry) -> Result<(), StoreError> {
        storage::append_json_item(&self.path, &entry)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        storage::remove_file(&self.path)
    }
}
