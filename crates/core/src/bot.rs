use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted lifecycle status of a bot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Active,
    #[default]
    Stopped,
    Paused,
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Stopped => write!(f, "stopped"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// DEX a bot quotes prices from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Uniswap2,
    Sushiswap,
    Pancake,
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniswap2 => write!(f, "uniswap2"),
            Self::Sushiswap => write!(f, "sushiswap"),
            Self::Pancake => write!(f, "pancake"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Token {
    Usdt,
    Usdc,
    Eth,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usdt => write!(f, "usdt"),
            Self::Usdc => write!(f, "usdc"),
            Self::Eth => write!(f, "eth"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Bnb,
    Base,
    Arb,
    Pol,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bnb => write!(f, "bnb"),
            Self::Base => write!(f, "base"),
            Self::Arb => write!(f, "arb"),
            Self::Pol => write!(f, "pol"),
        }
    }
}

/// A persisted bot configuration row.
///
/// The orchestrator only mutates `status`; everything else is owned by the
/// CRUD layer that created the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecord {
    pub id: String,
    pub name: String,
    pub status: BotStatus,
    pub exchange1: Option<Exchange>,
    pub exchange2: Option<Exchange>,
    pub token1: Option<Token>,
    pub token2: Option<Token>,
    pub network: Option<Network>,
    /// Opaque per-bot configuration blob, untouched by the core.
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BotRecord {
    /// Creates a stopped record with no strategy parameters.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            status: BotStatus::Stopped,
            exchange1: None,
            exchange2: None,
            token1: None,
            token2: None,
            network: None,
            config: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when every parameter the arbitrage strategy needs is present.
    #[must_use]
    pub const fn has_strategy_params(&self) -> bool {
        self.exchange1.is_some()
            && self.exchange2.is_some()
            && self.token1.is_some()
            && self.network.is_some()
    }
}
