use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{FetchError, StoreError};
use crate::history::remote::RemoteStore;
use crate::history::{now_timestamp, QuizScoreEntry};
use crate::storage;

pub const OFFLINE_QUEUE_FILE: &str = "offline_queue.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemKind {
    ChatMessage,
    QuizResult,
    Feedback,
}

impl fmt::Display for QueueItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueItemKind::ChatMessage => "chat message",
            QueueItemKind::QuizResult => "quiz result",
            QueueItemKind::Feedback => "feedback",
        })
    }
}

/// A cloud write that could not be made at the time. Pending until a sync
/// delivers it, then kept with `synced = true`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OfflineQueueItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: QueueItemKind,
    pub data: Value,
    pub timestamp: String,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_time: Option<String>,
}

#[derive(Debug)]
pub struct OfflineQueue {
    path: PathBuf,
    items: Vec<OfflineQueueItem>,
    // Entries that no longer decode. Never synced, but written back as found.
    unreadable: Vec<Value>,
}

impl OfflineQueue {
    /// Opens the queue file; a missing file gives an empty queue. A file that
    /// is not a JSON array is an error, so it never gets overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = storage::load_json_values(&path)?;
        let (items, unreadable) = storage::decode_list(&path, values);
        Ok(Self {
            path,
            items,
            unreadable,
        })
    }

    pub fn open_in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join(OFFLINE_QUEUE_FILE))
    }

    pub fn items(&self) -> &[OfflineQueueItem] {
        &self.items
    }

    pub fn pending(&self) -> impl Iterator<Item = &OfflineQueueItem> {
        self.items().iter().filter(|item| !item.synced)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn enqueue(&mut self, kind: QueueItemKind, data: Value) -> Result<u64, StoreError> {
        let id = (self.items.len() + self.unreadable.len()) as u64 + 1;
        self.items.push(OfflineQueueItem {
            id,
            kind,
            data,
            timestamp: now_timestamp(),
            synced: false,
            sync_time: None,
        });
        self.save()?;
        log::info!("Queued {} #{} for later sync", kind, id);
        Ok(id)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let mut values = self
            .items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        values.extend(self.unreadable.iter().cloned());
        storage::write_json_list(&self.path, &values)
    }

    /// Sends every pending item, marking the delivered ones as synced. Items
    /// that fail stay pending and are returned. The file is saved after each
    /// delivery; if that save fails the sync stops there, and only the item
    /// just delivered can go out again next time.
    pub async fn sync<R: RemoteStore>(
        &mut self,
        remote: &R,
        user_id: &str,
    ) -> Result<(usize, Vec<OfflineQueueItem>), StoreError> {
        let mut synced = 0;
        let mut failed = Vec::new();

        for idx in 0..self.items.len() {
            if self.items[idx].synced {
                continue;
            }
            match push_item(remote, user_id, &self.items[idx]).await {
                Ok(()) => {
                    let item = &mut self.items[idx];
                    item.synced = true;
                    item.sync_time = Some(now_timestamp());
                    synced += 1;
                    self.save()?;
                }
                Err(e) => {
                    let item = &self.items[idx];
                    log::warn!("Failed to sync {} #{}: {}", item.kind, item.id, e);
                    failed.push(item.clone());
                }
            }
        }

        log::info!("Offline sync: {} delivered, {} still pending", synced, failed.len());
        Ok((synced, failed))
    }
}

async fn push_item<R: RemoteStore>(
    remote: &R,
    user_id: &str,
    item: &OfflineQueueItem,
) -> Result<(), FetchError> {
    match item.kind {
        QueueItemKind::ChatMessage => remote.push_chat_message(user_id, &item.data).await,
        QueueItemKind::Feedback => remote.push_feedback(user_id, &item.data).await,
        QueueItemKind::QuizResult => {
            let entry: QuizScoreEntry = serde_json::from_value(item.data.clone())
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            remote.push_quiz_score(user_id, &entry).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::remote::testing::MemoryRemote;
    use crate::history::remote::{CHAT_HISTORY_COLLECTION, FEEDBACK_COLLECTION};
    use crate::history::Difficulty;
    use serde_json::json;

    fn quiz_result(score_correct: usize) -> Value {
        serde_json::to_value(QuizScoreEntry::from_result(
            score_correct,
            5,
            Difficulty::Medium,
            "Weapon Training",
            "2024-06-01T08:00:00Z",
        ))
        .unwrap()
    }

    fn filled_queue(dir: &Path) -> OfflineQueue {
        let mut queue = OfflineQueue::open_in_dir(dir).unwrap();
        queue
            .enqueue(QueueItemKind::ChatMessage, json!({ "prompt": "drill?", "response": "..." }))
            .unwrap();
        queue.enqueue(QueueItemKind::QuizResult, quiz_result(4)).unwrap();
        queue
            .enqueue(QueueItemKind::Feedback, json!({ "message": "Great quizzes" }))
            .unwrap();
        queue
    }

    #[test]
    fn enqueue_persists_pending_items_with_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let queue = filled_queue(dir.path());
        assert_eq!(queue.pending_count(), 3);

        let reopened = OfflineQueue::open_in_dir(dir.path()).unwrap();
        let ids: Vec<u64> = reopened.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(reopened.items().iter().all(|i| !i.synced));
    }

    #[test]
    fn queue_file_uses_type_tags() {
        let dir = tempfile::tempdir().unwrap();
        filled_queue(dir.path());
        let raw = std::fs::read_to_string(dir.path().join(OFFLINE_QUEUE_FILE)).unwrap();
        assert!(raw.contains("\"type\": \"chat_message\""));
        assert!(raw.contains("\"type\": \"quiz_result\""));
        assert!(raw.contains("\"type\": \"feedback\""));
    }

    #[tokio::test]
    async fn everything_synced_when_remote_accepts() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = filled_queue(dir.path());
        let remote = MemoryRemote::default();

        let (synced, failed) = queue.sync(&remote, "42").await.unwrap();
        assert_eq!(synced, 3);
        assert!(failed.is_empty());
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.items().iter().all(|i| i.sync_time.is_some()));
        assert_eq!(remote.write_count(), 3);

        let reopened = OfflineQueue::open_in_dir(dir.path()).unwrap();
        assert_eq!(reopened.pending_count(), 0);
        assert_eq!(reopened.items().len(), 3);
    }

    #[tokio::test]
    async fn failed_items_stay_queued_and_synced_ones_are_not_resent() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = filled_queue(dir.path());
        let remote = MemoryRemote::default();
        remote.reject(FEEDBACK_COLLECTION);
        remote.reject(CHAT_HISTORY_COLLECTION);

        let (synced, failed) = queue.sync(&remote, "42").await.unwrap();
        assert_eq!(synced, 1);
        let failed_kinds: Vec<QueueItemKind> = failed.iter().map(|i| i.kind).collect();
        assert_eq!(
            failed_kinds,
            vec![QueueItemKind::ChatMessage, QueueItemKind::Feedback]
        );
        assert_eq!(remote.write_count(), 1);

        remote.accept(FEEDBACK_COLLECTION);
        remote.accept(CHAT_HISTORY_COLLECTION);
        let (synced, failed) = queue.sync(&remote, "42").await.unwrap();
        assert_eq!(synced, 2);
        assert!(failed.is_empty());
        // The quiz result went out once, in the first round.
        assert_eq!(remote.scores.lock().unwrap()["42"].len(), 1);
        assert_eq!(remote.write_count(), 3);

        let (synced, failed) = queue.sync(&remote, "42").await.unwrap();
        assert_eq!((synced, failed.len()), (0, 0));
        assert_eq!(remote.write_count(), 3);
    }

    #[tokio::test]
    async fn unreachable_remote_leaves_the_queue_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = filled_queue(dir.path());
        let remote = MemoryRemote::default();
        remote.set_unavailable(true);

        let (synced, failed) = queue.sync(&remote, "42").await.unwrap();
        assert_eq!(synced, 0);
        assert_eq!(failed.len(), 3);
        assert_eq!(queue.pending_count(), 3);
    }

    #[tokio::test]
    async fn undecodable_quiz_result_stays_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = OfflineQueue::open_in_dir(dir.path()).unwrap();
        queue
            .enqueue(QueueItemKind::QuizResult, json!({ "score": "high" }))
            .unwrap();

        let (synced, failed) = queue.sync(&MemoryRemote::default(), "42").await.unwrap();
        assert_eq!(synced, 0);
        assert_eq!(failed.len(), 1);
    }

    #[test]
    fn undecodable_items_survive_an_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OFFLINE_QUEUE_FILE);
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "type": "feedback", "data": {"message": "hi"}, "timestamp": "t", "synced": false},
                {"id": 2, "type": "carrier_pigeon", "data": {}, "timestamp": "t"}
            ]"#,
        )
        .unwrap();

        let mut queue = OfflineQueue::open(&path).unwrap();
        assert_eq!(queue.pending_count(), 1);
        let id = queue.enqueue(QueueItemKind::Feedback, json!({ "message": "again" })).unwrap();
        assert_eq!(id, 3);

        let raw = storage::load_json_values(&path).unwrap();
        assert_eq!(raw.len(), 3);
        assert!(raw.iter().any(|v| v["type"] == "carrier_pigeon"));
        assert_eq!(OfflineQueue::open(&path).unwrap().pending_count(), 2);
    }

    #[test]
    fn malformed_queue_file_is_an_error_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(OFFLINE_QUEUE_FILE);
        std::fs::write(&path, "[{\"id\": 1,").unwrap();

        assert!(OfflineQueue::open(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"id\": 1,");
    }

    #[tokio::test]
    async fn a_failed_save_stops_the_sync_after_the_delivered_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = filled_queue(dir.path());
        let remote = MemoryRemote::default();
        remote.reject(FEEDBACK_COLLECTION);

        queue.sync(&remote, "42").await.unwrap();
        let path = dir.path().join(OFFLINE_QUEUE_FILE);
        assert_eq!(OfflineQueue::open(&path).unwrap().pending_count(), 1);

        // A directory in place of the queue file makes every save fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        remote.accept(FEEDBACK_COLLECTION);
        assert!(queue.sync(&remote, "42").await.is_err());
        assert_eq!(remote.write_count(), 3);
    }
}
