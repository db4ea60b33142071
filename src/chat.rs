use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::storage;

pub const CHAT_HISTORY_FILE: &str = "chat_history.json";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatExchange {
    pub timestamp: String,
    pub prompt: String,
    pub response: String,
}

/// Local transcript of the assistant conversation.
#[derive(Debug, Clone)]
pub struct ChatLog {
    path: PathBuf,
}

impl ChatLog {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(CHAT_HISTORY_FILE),
        }
    }

    pub fn load(&self) -> Vec<ChatExchange> {
        storage::read_json_list(&self.path)
    }

    /// Blank prompts or responses are not worth keeping; returns whether the
    /// exchange was written.
    pub fn append(&self, exchange: &ChatExchange) -> Result<bool, StoreError> {
        if exchange.prompt.trim().is_empty() || exchange.response.trim().is_empty() {
            return Ok(false);
        }
        storage::append_json_item(&self.path, exchange)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        storage::remove_file(&self.path)
    }
}

const OFFLINE_RESPONSES: [(&str, &str); 4] = [
    ("ncc", "NCC (National Cadet Corps) is a voluntary organization which recruits cadets from high schools, colleges and universities. I'm currently offline, but here's what I can tell you: NCC was established in 1948 with the motto 'Unity and Discipline'."),
    ("drill", "Drill in NCC involves precise, coordinated movements and commands. Basic drill commands include Attention, Stand at Ease, Quick March, Halt, Left Turn, Right Turn, and About Turn. I'm offline, so I can't provide detailed responses right now."),
    ("rank", "NCC has various ranks including Cadet, Lance Corporal, Corporal, Sergeant, Under Officer, and Warrant Officer. I'm currently offline - please connect to internet for detailed information."),
    ("training", "NCC training includes drill, weapon training, map reading, field craft, leadership, and social service. I'm offline right now, so I can only provide basic information."),
];
const OFFLINE_DEFAULT: &str = "I'm currently offline and have limited information available. Please connect to the internet for comprehensive responses about NCC topics.";

/// Canned answer used when the assistant model cannot be reached.
pub fn offline_response(prompt: &str) -> &'static str {
    let prompt = prompt.to_lowercase();
    OFFLINE_RESPONSES
        .iter()
        .find(|(keyword, _)| prompt.contains(*keyword))
        .map(|(_, response)| *response)
        .unwrap_or(OFFLINE_DEFAULT)
}
