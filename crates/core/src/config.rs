use crate::bot::Network;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bots.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Chain access credentials and polling cadence, keyed by network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Per-network RPC API keys. A bot whose network has no key here fails
    /// worker initialization with an error event, not a crash.
    #[serde(default)]
    pub api_keys: HashMap<Network, String>,
    /// New-block poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            api_keys: HashMap::new(),
            poll_interval_ms: 2_000,
        }
    }
}

/// Parameters handed to every arbitrage strategy at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageConfig {
    /// Minimum relative price difference (percent) to flag an opportunity.
    pub min_profit_pct: f64,
    /// Notional size used when sizing a flagged opportunity.
    pub trade_amount: Decimal,
    pub gas_limit_multiplier: f64,
    pub max_gas_price: Decimal,
    /// Consecutive tick failures tolerated before the strategy stops itself.
    pub max_consecutive_errors: usize,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: 0.5,
            trade_amount: Decimal::from(1000),
            gas_limit_multiplier: 1.2,
            max_gas_price: Decimal::from(200),
            max_consecutive_errors: 10,
        }
    }
}
