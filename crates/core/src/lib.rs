pub mod bot;
pub mod config;
pub mod config_loader;
pub mod error;

pub use bot::{BotRecord, BotStatus, Exchange, Network, Token};
pub use config::{AppConfig, ArbitrageConfig, ChainConfig, DatabaseConfig};
pub use config_loader::ConfigLoader;
pub use error::OrchestratorError;
