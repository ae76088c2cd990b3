use arb_bot_core::{BotRecord, BotStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BotEventType {
    StatusChanged,
    Error,
    ExecutionResult,
}

impl BotEventType {
    pub const ALL: [Self; 3] = [Self::StatusChanged, Self::Error, Self::ExecutionResult];
}

impl fmt::Display for BotEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusChanged => write!(f, "status_changed"),
            Self::Error => write!(f, "error"),
            Self::ExecutionResult => write!(f, "execution_result"),
        }
    }
}

/// Ephemeral lifecycle event pushed to observers; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotEvent {
    #[serde(rename = "type")]
    pub event_type: BotEventType,
    #[serde(rename = "botId")]
    pub bot_id: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl BotEvent {
    #[must_use]
    pub fn status_changed(bot: &BotRecord, previous: BotStatus) -> Self {
        Self {
            event_type: BotEventType::StatusChanged,
            bot_id: bot.id.clone(),
            data: serde_json::json!({
                "previousStatus": previous,
                "currentStatus": bot.status,
                "name": bot.name,
            }),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn error(bot_id: &str, message: &str) -> Self {
        Self {
            event_type: BotEventType::Error,
            bot_id: bot_id.to_string(),
            data: serde_json::json!({ "message": message }),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn execution_result(bot_id: &str, data: serde_json::Value) -> Self {
        Self {
            event_type: BotEventType::ExecutionResult,
            bot_id: bot_id.to_string(),
            data,
            timestamp: Utc::now(),
        }
    }
}
