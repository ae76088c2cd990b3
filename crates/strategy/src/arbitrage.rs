use crate::{BotStrategy, ExecutionReport, StrategyEvent};
use anyhow::{Context, Result};
use arb_bot_core::config::ArbitrageConfig;
use arb_bot_core::{BotRecord, BotStatus, Token};
use arb_bot_chain::block_source::BlockSource;
use arb_bot_chain::dex::{DexProvider, DexProviderFactory};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How long a cancelled tick loop gets to drain before it is aborted.
const TICK_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    Running,
    Stopped,
}

/// Block-driven price-comparison strategy for one bot.
///
/// While running it subscribes to new blocks and on each tick compares the
/// configured token's price on two DEXes, emitting an
/// [`StrategyEvent::Opportunity`] when the relative spread meets the
/// profit threshold. No on-chain action is taken here.
pub struct ArbitrageStrategy {
    bot: BotRecord,
    config: ArbitrageConfig,
    block_source: Arc<dyn BlockSource>,
    events: mpsc::UnboundedSender<StrategyEvent>,
    state: StrategyState,
    cancel_tx: Option<watch::Sender<bool>>,
    tick_task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ArbitrageStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrageStrategy")
            .field("bot", &self.bot)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ArbitrageStrategy {
    /// # Errors
    ///
    /// Fails when the record is missing any parameter the strategy needs
    /// (`exchange1`, `exchange2`, `token1`, `network`).
    pub fn new(
        bot: BotRecord,
        config: ArbitrageConfig,
        block_source: Arc<dyn BlockSource>,
        events: mpsc::UnboundedSender<StrategyEvent>,
    ) -> Result<Self> {
        if !bot.has_strategy_params() {
            anyhow::bail!(
                "Bot configuration is incomplete. Missing exchange1, exchange2, token1, or network."
            );
        }

        tracing::info!(
            "Strategy initialized: {} ({} <-> {})",
            bot.name,
            bot.exchange1.map(|e| e.to_string()).unwrap_or_default(),
            bot.exchange2.map(|e| e.to_string()).unwrap_or_default(),
        );

        Ok(Self {
            bot,
            config,
            block_source,
            events,
            state: StrategyState::Idle,
            cancel_tx: None,
            tick_task: None,
        })
    }

    #[must_use]
    pub const fn state(&self) -> StrategyState {
        self.state
    }

    async fn start(&mut self) -> Result<()> {
        if self.state == StrategyState::Running {
            tracing::info!("Strategy is already running for {}", self.bot.name);
            return Ok(());
        }

        let network = self.bot.network.context("Bot has no network")?;
        let exchange1 = self.bot.exchange1.context("Bot has no exchange1")?;
        let exchange2 = self.bot.exchange2.context("Bot has no exchange2")?;
        let token = self.bot.token1.context("Bot has no token1")?;

        let dex1 = DexProviderFactory::create(exchange1, network);
        let dex2 = DexProviderFactory::create(exchange2, network);
        tracing::info!(
            "DEX providers initialized: {} and {} on network {network}",
            dex1.exchange(),
            dex2.exchange(),
        );

        let blocks = self
            .block_source
            .subscribe()
            .await
            .context("Failed to subscribe to new blocks")?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let worker = TickWorker {
            bot_name: self.bot.name.clone(),
            token,
            dex1,
            dex2,
            min_profit_pct: self.config.min_profit_pct,
            max_consecutive_errors: self.config.max_consecutive_errors,
            events: self.events.clone(),
        };

        self.tick_task = Some(tokio::spawn(worker.run(blocks, cancel_rx)));
        self.cancel_tx = Some(cancel_tx);
        self.state = StrategyState::Running;

        tracing::info!("Strategy started for {}", self.bot.name);
        Ok(())
    }

    async fn stop(&mut self) {
        if self.state != StrategyState::Running {
            tracing::info!("Strategy is not running for {}", self.bot.name);
            self.state = StrategyState::Stopped;
            return;
        }

        if let Some(cancel) = self.cancel_tx.take() {
            let _ = cancel.send(true);
        }

        if let Some(task) = self.tick_task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(TICK_DRAIN_TIMEOUT, task).await.is_err() {
                tracing::warn!(
                    "Tick loop for {} did not drain in time, aborting",
                    self.bot.name
                );
                abort.abort();
            }
        }

        self.state = StrategyState::Stopped;
        tracing::info!("Strategy stopped for {}", self.bot.name);
    }
}

#[async_trait]
impl BotStrategy for ArbitrageStrategy {
    async fn execute(&mut self, bot: &BotRecord) -> Result<ExecutionReport> {
        tracing::debug!("Executing strategy for bot {}", bot.id);
        self.bot = bot.clone();

        match bot.status {
            BotStatus::Active => {
                self.start().await?;
                Ok(ExecutionReport::success("Strategy started"))
            }
            BotStatus::Stopped | BotStatus::Paused => {
                self.stop().await;
                Ok(ExecutionReport::success(format!(
                    "Strategy {}",
                    bot.status
                )))
            }
        }
    }

    async fn cleanup(&mut self) {
        self.stop().await;
        // Drop any leftover handles even if stop already ran.
        self.cancel_tx = None;
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
        tracing::debug!("Cleanup complete for {}", self.bot.name);
    }
}

/// Owns everything the per-block loop touches so the strategy itself holds
/// no state shared with the running task.
struct TickWorker {
    bot_name: String,
    token: Token,
    dex1: Box<dyn DexProvider>,
    dex2: Box<dyn DexProvider>,
    min_profit_pct: f64,
    max_consecutive_errors: usize,
    events: mpsc::UnboundedSender<StrategyEvent>,
}

impl TickWorker {
    async fn run(self, mut blocks: mpsc::Receiver<u64>, mut cancel: watch::Receiver<bool>) {
        let mut consecutive_errors = 0usize;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                block = blocks.recv() => {
                    let Some(block) = block else { break };
                    match self.tick(block).await {
                        Ok(()) => consecutive_errors = 0,
                        Err(e) => {
                            consecutive_errors += 1;
                            tracing::warn!(
                                "Error on block {block} for {} ({consecutive_errors} consecutive): {e:#}",
                                self.bot_name
                            );
                            if consecutive_errors >= self.max_consecutive_errors {
                                let _ = self.events.send(StrategyEvent::TickError {
                                    block,
                                    message: format!(
                                        "Stopping after {consecutive_errors} consecutive tick failures: {e:#}"
                                    ),
                                });
                                break;
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!("Tick loop exited for {}", self.bot_name);
    }

    async fn tick(&self, block: u64) -> Result<()> {
        let token_address = self.dex1.token_address(self.token);
        let base_address = self.dex1.token_address(Token::Usdt);

        let pair1 = self.dex1.is_pair_supported(&token_address, &base_address).await?;
        let pair2 = self.dex2.is_pair_supported(&token_address, &base_address).await?;
        if !pair1 || !pair2 {
            tracing::debug!(
                "Block {block}: pair {} not supported on {} ({pair1}) / {} ({pair2})",
                self.token,
                self.dex1.exchange(),
                self.dex2.exchange(),
            );
            return Ok(());
        }

        let price1 = self.dex1.token_price(&token_address).await?;
        let price2 = self.dex2.token_price(&token_address).await?;

        let difference = (price1 - price2).abs();
        let spread_pct = difference / price1.min(price2) * 100.0;

        tracing::debug!(
            "Block {block}: {} {}: ${price1:.6}, {}: ${price2:.6}, spread {spread_pct:.2}%",
            self.token,
            self.dex1.exchange(),
            self.dex2.exchange(),
        );

        if spread_pct >= self.min_profit_pct {
            tracing::info!(
                "Block {block}: arbitrage opportunity for {} ({spread_pct:.2}%)",
                self.bot_name
            );
            let _ = self.events.send(StrategyEvent::Opportunity {
                block,
                token: self.token.to_string(),
                price1,
                price2,
                spread_pct,
            });
        }

        Ok(())
    }
}
