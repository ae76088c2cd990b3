use crate::protocol::{ControlMessage, WorkerMessage};
use anyhow::{Context, Result};
use arb_bot_core::config::ArbitrageConfig;
use arb_bot_core::BotRecord;
use arb_bot_chain::block_source::BlockSourceFactory;
use arb_bot_strategy::{StrategyCache, StrategyEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Isolated execution unit for one bot.
///
/// Owns its strategy cache and chain subscription; shares nothing with the
/// orchestrator beyond the two message channels. Initialization failures
/// are reported as `error` messages and leave the worker alive, so `stop`
/// is always a well-defined operation against a spawned handle.
pub struct BotWorker {
    bot: BotRecord,
    config: ArbitrageConfig,
    block_factory: Arc<dyn BlockSourceFactory>,
    rx: mpsc::Receiver<ControlMessage>,
    tx: mpsc::Sender<WorkerMessage>,
}

impl BotWorker {
    #[must_use]
    pub fn new(
        bot: BotRecord,
        config: ArbitrageConfig,
        block_factory: Arc<dyn BlockSourceFactory>,
        rx: mpsc::Receiver<ControlMessage>,
        tx: mpsc::Sender<WorkerMessage>,
    ) -> Self {
        Self {
            bot,
            config,
            block_factory,
            rx,
            tx,
        }
    }

    /// Runs the worker until a stop command arrives (or the orchestrator
    /// drops the control channel).
    pub async fn run(mut self) {
        tracing::info!("Worker for bot {} starting", self.bot.id);
        self.send_result(serde_json::json!({ "message": "Worker starting" }))
            .await;

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        // Keep one sender alive so the events channel never closes while
        // the worker loop is still selecting on it.
        let _events_keepalive = events_tx.clone();

        let mut cache = match self.build_cache(events_tx) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::error!("Worker for bot {} failed to initialize: {e:#}", self.bot.id);
                self.send_error(format!("Worker initialization failed: {e:#}"))
                    .await;
                None
            }
        };

        if let Some(cache) = cache.as_mut() {
            match Self::execute_strategy(cache, &self.bot).await {
                Ok(report) => {
                    let data = serde_json::to_value(&report).unwrap_or_default();
                    self.send_result(data).await;
                }
                Err(e) => {
                    tracing::error!("Strategy execution failed for bot {}: {e:#}", self.bot.id);
                    self.send_error(format!("Strategy execution failed: {e:#}"))
                        .await;
                }
            }
        }

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    // A closed control channel means the orchestrator is
                    // gone; treat it like a stop so resources release.
                    match command {
                        Some(ControlMessage::Stop) | None => {
                            tracing::info!("Worker for bot {} stopping", self.bot.id);
                            if let Some(cache) = cache.as_mut() {
                                cache.cleanup().await;
                            }
                            self.send(WorkerMessage::Stopped {
                                bot_id: self.bot.id.clone(),
                            })
                            .await;
                            break;
                        }
                    }
                }
                event = events_rx.recv() => {
                    let Some(event) = event else { continue };
                    self.forward_strategy_event(event).await;
                }
            }
        }

        tracing::info!("Worker for bot {} stopped", self.bot.id);
    }

    fn build_cache(&self, events_tx: mpsc::UnboundedSender<StrategyEvent>) -> Result<StrategyCache> {
        let network = self.bot.network.context("Bot has no network configured")?;
        let block_source = self
            .block_factory
            .create(network)
            .context("Failed to create block source")?;

        Ok(StrategyCache::new(
            self.config.clone(),
            block_source,
            events_tx,
        ))
    }

    async fn execute_strategy(
        cache: &mut StrategyCache,
        bot: &BotRecord,
    ) -> Result<arb_bot_strategy::ExecutionReport> {
        let strategy = cache.get_or_create(bot)?;
        strategy.execute(bot).await
    }

    async fn forward_strategy_event(&self, event: StrategyEvent) {
        match event {
            StrategyEvent::Opportunity { .. } => {
                let data = serde_json::to_value(&event).unwrap_or_default();
                self.send_result(data).await;
            }
            StrategyEvent::TickError { message, .. } => {
                self.send_error(message).await;
            }
        }
    }

    async fn send_result(&self, data: serde_json::Value) {
        self.send(WorkerMessage::Result {
            bot_id: self.bot.id.clone(),
            data,
        })
        .await;
    }

    async fn send_error(&self, error: String) {
        self.send(WorkerMessage::Error {
            bot_id: self.bot.id.clone(),
            error,
        })
        .await;
    }

    async fn send(&self, message: WorkerMessage) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!("Orchestrator channel closed for bot {}", self.bot.id);
        }
    }
}
