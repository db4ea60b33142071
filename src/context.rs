use std::path::PathBuf;

use serde_json::json;

use crate::chat::{offline_response, ChatExchange, ChatLog};
use crate::config::AppConfig;
use crate::cooldown::{Action, Cooldown, CooldownActive};
use crate::error::StoreError;
use crate::history::difficulty::{
    average, question_count, recent_average, select_difficulty, RECENT_WINDOW,
};
use crate::history::merge::merge_histories;
use crate::history::remote::RemoteStore;
use crate::history::store::ScoreHistoryStore;
use crate::history::{now_timestamp, Difficulty, QuizScoreEntry};
use crate::offline::{OfflineQueue, OfflineQueueItem, QueueItemKind};
use crate::quiz::ai_helper::QuizHelper;
use crate::quiz::{bank, Question, Quiz};

pub const EMPTY_PROMPT_REPLY: &str = "Please provide a valid question or prompt.";

/// Where a cloud-bound record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Synced,
    Queued,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub attempts: usize,
    pub overall_average: Option<f64>,
    pub recent_average: Option<f64>,
    pub next_difficulty: Difficulty,
    pub recent: Vec<QuizScoreEntry>,
    pub pending_sync: usize,
    pub remote_reachable: bool,
}

/// Everything a handler needs, passed explicitly instead of living in a
/// per-session dictionary.
pub struct AppContext<R> {
    pub config: AppConfig,
    pub helper: Option<QuizHelper>,
    pub remote: Option<R>,
    cooldown: Cooldown,
}

impl<R: RemoteStore> AppContext<R> {
    pub fn new(config: AppConfig, helper: Option<QuizHelper>, remote: Option<R>) -> Self {
        Self {
            cooldown: Cooldown::new(config.ai_cooldown),
            config,
            helper,
            remote,
        }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.config.user_dir(user_id)
    }

    pub fn history_store(&self, user_id: &str) -> ScoreHistoryStore {
        ScoreHistoryStore::in_dir(&self.user_dir(user_id))
    }

    pub fn chat_log(&self, user_id: &str) -> ChatLog {
        ChatLog::in_dir(&self.user_dir(user_id))
    }

    pub fn offline_queue(&self, user_id: &str) -> Result<OfflineQueue, StoreError> {
        OfflineQueue::open_in_dir(&self.user_dir(user_id))
    }

    fn pending_sync(&self, user_id: &str) -> usize {
        match self.offline_queue(user_id) {
            Ok(queue) => queue.pending_count(),
            Err(e) => {
                log::warn!("Could not read the offline queue for {}: {}", user_id, e);
                0
            }
        }
    }

    /// The remote store, unless none is configured or offline mode is on.
    pub fn online_remote(&self) -> Option<&R> {
        if self.config.offline_mode {
            return None;
        }
        self.remote.as_ref()
    }

    fn online_helper(&self) -> Option<&QuizHelper> {
        if self.config.offline_mode {
            return None;
        }
        self.helper.as_ref()
    }

    /// Local history merged with the cloud copy. A failing fetch only costs
    /// the cloud half.
    pub async fn merged_history(&self, user_id: &str) -> (Vec<QuizScoreEntry>, bool) {
        let local = self.history_store(user_id).load();
        let Some(remote) = self.online_remote() else {
            return (merge_histories(local, Vec::new()), false);
        };
        match remote.fetch_quiz_scores(user_id).await {
            Ok(cloud) => (merge_histories(local, cloud), true),
            Err(e) => {
                log::warn!("Could not fetch cloud quiz history for {}: {}", user_id, e);
                (merge_histories(local, Vec::new()), false)
            }
        }
    }

    pub async fn next_difficulty(&self, user_id: &str) -> Difficulty {
        let (history, _) = self.merged_history(user_id).await;
        select_difficulty(&history)
    }

    pub async fn progress(&self, user_id: &str) -> ProgressSummary {
        let (history, remote_reachable) = self.merged_history(user_id).await;
        let start = history.len().saturating_sub(RECENT_WINDOW);
        ProgressSummary {
            attempts: history.len(),
            overall_average: average(&history),
            recent_average: recent_average(&history),
            next_difficulty: select_difficulty(&history),
            recent: history[start..].to_vec(),
            pending_sync: self.pending_sync(user_id),
            remote_reachable,
        }
    }

    /// Builds the next quiz at the user's current tier. Model-generated when
    /// possible, otherwise drawn from the built-in bank. Refused while the
    /// user's previous quiz is still inside the cooldown.
    pub async fn build_quiz(
        &self,
        user_id: &str,
        topic: &str,
        requested: usize,
    ) -> Result<Quiz, CooldownActive> {
        self.cooldown.try_start(user_id, Action::Quiz)?;
        let difficulty = self.next_difficulty(user_id).await;
        let count = question_count(requested, difficulty);

        if let Some(helper) = self.online_helper() {
            match helper.generate_questions(topic, count, difficulty).await {
                Ok(questions) => return Ok(Quiz::new(topic, difficulty, questions)),
                Err(e) => log::warn!("Falling back to offline questions: {}", e),
            }
        }

        let questions = bank::offline_questions(count, &mut rand::thread_rng());
        Ok(Quiz::new(topic, difficulty, questions))
    }

    /// Stores the finished quiz locally and sends it to the cloud, queueing
    /// it when that is not possible.
    pub async fn record_quiz_result(
        &self,
        user_id: &str,
        entry: &QuizScoreEntry,
    ) -> Result<Delivery, StoreError> {
        self.history_store(user_id).append(entry.clone())?;

        if let Some(remote) = self.online_remote() {
            match remote.push_quiz_score(user_id, entry).await {
                Ok(()) => return Ok(Delivery::Synced),
                Err(e) => log::warn!("Could not upload quiz result for {}: {}", user_id, e),
            }
        }
        self.offline_queue(user_id)?
            .enqueue(QueueItemKind::QuizResult, serde_json::to_value(entry)?)?;
        Ok(Delivery::Queued)
    }

    /// Answers a chat prompt and logs the exchange. Never fails: the model
    /// falls back to canned answers and logging problems are only reported.
    /// Inside the cooldown the reply says how long to wait.
    pub async fn ask_assistant(&self, user_id: &str, prompt: &str) -> String {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return EMPTY_PROMPT_REPLY.to_string();
        }
        if let Err(cooldown) = self.cooldown.try_start(user_id, Action::Chat) {
            return cooldown.to_string();
        }

        let response = match self.online_helper() {
            Some(helper) => match helper.answer_cadet(prompt).await {
                Ok(answer) if !answer.is_empty() => answer,
                Ok(_) => offline_response(prompt).to_string(),
                Err(e) => {
                    log::error!("Assistant request failed: {}", e);
                    offline_response(prompt).to_string()
                }
            },
            None => offline_response(prompt).to_string(),
        };

        let exchange = ChatExchange {
            timestamp: now_timestamp(),
            prompt: prompt.to_string(),
            response: response.clone(),
        };
        if let Err(e) = self.record_chat(user_id, &exchange).await {
            log::error!("Could not save chat for {}: {}", user_id, e);
        }
        response
    }

    /// Logs the exchange locally and sends it to the cloud. A failed local
    /// write does not stop the upload; it is reported after it.
    async fn record_chat(
        &self,
        user_id: &str,
        exchange: &ChatExchange,
    ) -> Result<Option<Delivery>, StoreError> {
        if exchange.prompt.trim().is_empty() || exchange.response.trim().is_empty() {
            return Ok(None);
        }
        let logged = self.chat_log(user_id).append(exchange);
        let payload = serde_json::to_value(exchange)?;
        let delivery = self
            .deliver(user_id, QueueItemKind::ChatMessage, payload)
            .await?;
        logged?;
        Ok(Some(delivery))
    }

    /// The most recent `limit` exchanges, newest first.
    pub fn chat_history(&self, user_id: &str, limit: usize) -> Vec<ChatExchange> {
        let mut history = self.chat_log(user_id).load();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        history
    }

    pub fn clear_chat_history(&self, user_id: &str) -> Result<(), StoreError> {
        self.chat_log(user_id).clear()
    }

    /// Why the right answer is right: from the model when it is reachable,
    /// otherwise the question's stored explanation, if any.
    pub async fn explain_mistake(&self, question: &Question, given: &str) -> Option<String> {
        if let Some(helper) = self.online_helper() {
            match helper.explain_wrong_answer(question, given).await {
                Ok(explanation) if !explanation.is_empty() => return Some(explanation),
                Ok(_) => {}
                Err(e) => log::warn!("Could not explain the answer: {}", e),
            }
        }
        question.explanation.clone()
    }

    pub async fn submit_feedback(&self, user_id: &str, message: &str) -> Result<Delivery, StoreError> {
        let payload = json!({
            "timestamp": now_timestamp(),
            "message": message.trim(),
        });
        self.deliver(user_id, QueueItemKind::Feedback, payload).await
    }

    async fn deliver(
        &self,
        user_id: &str,
        kind: QueueItemKind,
        payload: serde_json::Value,
    ) -> Result<Delivery, StoreError> {
        if let Some(remote) = self.online_remote() {
            let sent = match kind {
                QueueItemKind::ChatMessage => remote.push_chat_message(user_id, &payload).await,
                QueueItemKind::Feedback => remote.push_feedback(user_id, &payload).await,
                QueueItemKind::QuizResult => {
                    let entry: QuizScoreEntry = serde_json::from_value(payload.clone())?;
                    remote.push_quiz_score(user_id, &entry).await
                }
            };
            match sent {
                Ok(()) => return Ok(Delivery::Synced),
                Err(e) => log::warn!("Could not upload {} for {}: {}", kind, user_id, e),
            }
        }
        self.offline_queue(user_id)?.enqueue(kind, payload)?;
        Ok(Delivery::Queued)
    }

    /// Flushes the user's offline queue. `None` while offline.
    pub async fn sync_now(
        &self,
        user_id: &str,
    ) -> Result<Option<(usize, Vec<OfflineQueueItem>)>, StoreError> {
        let Some(remote) = self.online_remote() else {
            return Ok(None);
        };
        let mut queue = self.offline_queue(user_id)?;
        if queue.pending_count() == 0 {
            return Ok(Some((0, Vec::new())));
        }
        queue.sync(remote, user_id).await.map(Some)
    }

    pub fn clear_history(&self, user_id: &str) -> Result<(), StoreError> {
        self.history_store(user_id).clear()
    }
}
