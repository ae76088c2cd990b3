use serde::{Deserialize, Serialize};

/// Orchestrator → worker control messages.
///
/// Wire shape: `{"command": "stop"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ControlMessage {
    Stop,
}

/// Worker → orchestrator messages.
///
/// Wire shapes:
/// `{"type": "result", "botId": ..., "data": ...}`,
/// `{"type": "error", "botId": ..., "error": ...}`,
/// `{"type": "stopped", "botId": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    Result {
        #[serde(rename = "botId")]
        bot_id: String,
        data: serde_json::Value,
    },
    Error {
        #[serde(rename = "botId")]
        bot_id: String,
        error: String,
    },
    Stopped {
        #[serde(rename = "botId")]
        bot_id: String,
    },
}

impl WorkerMessage {
    #[must_use]
    pub fn bot_id(&self) -> &str {
        match self {
            Self::Result { bot_id, .. } | Self::Error { bot_id, .. } | Self::Stopped { bot_id } => {
                bot_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_message_wire_shape() {
        assert_eq!(
            serde_json::to_value(ControlMessage::Stop).unwrap(),
            json!({"command": "stop"})
        );
        assert_eq!(
            serde_json::from_value::<ControlMessage>(json!({"command": "stop"})).unwrap(),
            ControlMessage::Stop
        );
    }

    #[test]
    fn worker_message_wire_shapes() {
        let result = WorkerMessage::Result {
            bot_id: "b1".into(),
            data: json!({"message": "ok"}),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"type": "result", "botId": "b1", "data": {"message": "ok"}})
        );

        let error = WorkerMessage::Error {
            bot_id: "b1".into(),
            error: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"type": "error", "botId": "b1", "error": "boom"})
        );

        let stopped = WorkerMessage::Stopped { bot_id: "b1".into() };
        assert_eq!(
            serde_json::to_value(&stopped).unwrap(),
            json!({"type": "stopped", "botId": "b1"})
        );
    }

    #[test]
    fn bot_id_accessor_covers_all_variants() {
        let stopped = WorkerMessage::Stopped { bot_id: "b9".into() };
        assert_eq!(stopped.bot_id(), "b9");
    }
}
