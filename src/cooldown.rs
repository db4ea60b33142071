use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Model-backed actions that are rate limited per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quiz,
    Chat,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::Quiz => "generating quizzes",
            Action::Chat => "asking the assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("You are {} too frequently. Please wait {} seconds before trying again.", .action.describe(), .remaining.as_secs().max(1))]
pub struct CooldownActive {
    pub action: Action,
    pub remaining: Duration,
}

/// Remembers when each user last started each action. A zero period turns
/// the limit off.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last_started: Mutex<HashMap<(String, Action), Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_started: Mutex::new(HashMap::new()),
        }
    }

    /// Records the action as started now, unless the previous start was less
    /// than one period ago.
    pub fn try_start(&self, user_id: &str, action: Action) -> Result<(), CooldownActive> {
        self.try_start_at(user_id, action, Instant::now())
    }

    fn try_start_at(&self, user_id: &str, action: Action, now: Instant) -> Result<(), CooldownActive> {
        if self.period.is_zero() {
            return Ok(());
        }

        // The map holds plain timestamps, so a poisoned lock is still usable.
        let mut last_started = self
            .last_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = (user_id.to_string(), action);
        if let Some(previous) = last_started.get(&key) {
            let elapsed = now.saturating_duration_since(*previous);
            if elapsed < self.period {
                return Err(CooldownActive {
                    action,
                    remaining: self.period - elapsed,
                });
            }
        }
        last_started.insert(key, now);
        Ok(())
    }
}
