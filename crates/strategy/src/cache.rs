use crate::arbitrage::ArbitrageStrategy;
use crate::{BotStrategy, StrategyEvent};
use anyhow::Result;
use arb_bot_core::config::ArbitrageConfig;
use arb_bot_core::BotRecord;
use arb_bot_chain::block_source::BlockSource;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-bot-id strategy arena, owned by one worker.
///
/// Strategies are constructed lazily on first use and live until
/// [`StrategyCache::cleanup`], which is invoked on both normal stop and
/// abnormal worker termination.
pub struct StrategyCache {
    config: ArbitrageConfig,
    block_source: Arc<dyn BlockSource>,
    events: mpsc::UnboundedSender<StrategyEvent>,
    strategies: HashMap<String, Box<dyn BotStrategy>>,
}

impl StrategyCache {
    #[must_use]
    pub fn new(
        config: ArbitrageConfig,
        block_source: Arc<dyn BlockSource>,
        events: mpsc::UnboundedSender<StrategyEvent>,
    ) -> Self {
        Self {
            config,
            block_source,
            events,
            strategies: HashMap::new(),
        }
    }

    /// Returns the cached strategy for the bot, constructing it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns error if strategy construction fails (incomplete record).
    pub fn get_or_create(&mut self, bot: &BotRecord) -> Result<&mut Box<dyn BotStrategy>> {
        match self.strategies.entry(bot.id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let strategy = ArbitrageStrategy::new(
                    bot.clone(),
                    self.config.clone(),
                    self.block_source.clone(),
                    self.events.clone(),
                )?;
                tracing::debug!("Cached new strategy for bot {}", bot.id);
                Ok(entry.insert(Box::new(strategy)))
            }
        }
    }

    /// Drains the cache, running each strategy's cleanup.
    pub async fn cleanup(&mut self) {
        for (bot_id, mut strategy) in self.strategies.drain() {
            strategy.cleanup().await;
            tracing::info!("Stopped strategy for bot {bot_id}");
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
