pub mod arbitrage;
pub mod cache;

pub use arbitrage::{ArbitrageStrategy, StrategyState};
pub use cache::StrategyCache;

use anyhow::Result;
use arb_bot_core::BotRecord;
use async_trait::async_trait;
use serde::Serialize;

/// Outcome of a strategy invocation, reported back over the worker channel.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExecutionReport {
    pub status: String,
    pub message: String,
}

impl ExecutionReport {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Event emitted by a running strategy's tick loop.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyEvent {
    /// Price spread at or above the configured threshold.
    Opportunity {
        block: u64,
        token: String,
        price1: f64,
        price2: f64,
        spread_pct: f64,
    },
    /// The tick loop gave up after repeated consecutive failures.
    TickError { block: u64, message: String },
}

/// Pluggable domain logic run inside a bot worker.
#[async_trait]
pub trait BotStrategy: Send + Sync {
    /// Dispatches on the bot's persisted status: `active` starts the
    /// strategy loop, anything else stops it. Idempotent in both
    /// directions.
    async fn execute(&mut self, bot: &BotRecord) -> Result<ExecutionReport>;

    /// Releases subscriptions and provider handles. Safe to call
    /// repeatedly and on every exit path.
    async fn cleanup(&mut self);
}
