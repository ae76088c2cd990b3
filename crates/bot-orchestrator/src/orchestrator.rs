use crate::event_hub::EventHub;
use crate::handle::WorkerHandle;
use crate::protocol::WorkerMessage;
use crate::worker::BotWorker;
use arb_bot_core::config::ArbitrageConfig;
use arb_bot_core::{BotRecord, BotStatus, OrchestratorError};
use arb_bot_chain::block_source::BlockSourceFactory;
use arb_bot_data::BotRepository;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};

/// Graceful-stop window before a worker is force-terminated.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted status combined with the live registry view.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BotStatusReport {
    pub id: String,
    pub status: BotStatus,
    #[serde(rename = "workerRunning")]
    pub worker_running: bool,
}

/// Owns the `bot id -> worker` registry and the start/stop/status
/// operations over it.
///
/// Explicitly constructed and dependency-injected; hosts hold it in an
/// `Arc` and hand clones of that to the API layer. Operations on the same
/// bot id are serialized through a per-id lock so check-and-spawn and
/// check-and-stop sequences cannot interleave; different ids proceed in
/// parallel.
pub struct BotOrchestrator {
    bots: RwLock<HashMap<String, WorkerHandle>>,
    // Per-id operation locks. Entries are never reclaimed; the map is
    // bounded by the number of distinct bot ids ever operated on.
    op_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    repository: Arc<dyn BotRepository>,
    hub: Arc<EventHub>,
    config: ArbitrageConfig,
    block_factory: Arc<dyn BlockSourceFactory>,
    stop_timeout: Duration,
}

impl BotOrchestrator {
    #[must_use]
    pub fn new(
        repository: Arc<dyn BotRepository>,
        hub: Arc<EventHub>,
        config: ArbitrageConfig,
        block_factory: Arc<dyn BlockSourceFactory>,
    ) -> Self {
        Self {
            bots: RwLock::new(HashMap::new()),
            op_locks: Mutex::new(HashMap::new()),
            repository,
            hub,
            config,
            block_factory,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Overrides the graceful-stop window; tests use a short one.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Resumes workers for every record persisted as `active`.
    ///
    /// Per-bot spawn failures are logged and reported as error events but
    /// never abort the batch. No status writes happen here; persisted
    /// status is trusted from the previous session.
    ///
    /// # Errors
    /// Returns an error only if the repository query itself fails.
    pub async fn initialize(&self) -> Result<(), OrchestratorError> {
        let bots = self
            .repository
            .find_by_status(BotStatus::Active)
            .await
            .map_err(OrchestratorError::Repository)?;

        tracing::info!("Resuming {} active bot(s)", bots.len());
        for bot in bots {
            // Same per-id serialization as start_bot/stop_bot, so a resume
            // racing an API start cannot double-spawn.
            let lock = self.id_lock(&bot.id).await;
            let _guard = lock.lock().await;
            if self.bots.read().await.contains_key(&bot.id) {
                continue;
            }
            match self.spawn_worker(&bot).await {
                Ok(()) => tracing::info!("Resumed bot {}", bot.id),
                Err(e) => {
                    tracing::error!("Failed to resume bot {}: {e}", bot.id);
                    self.hub.emit_error(&bot.id, &e.to_string()).await;
                }
            }
        }

        Ok(())
    }

    /// Starts a bot: persists `active`, spawns its worker, emits
    /// `status_changed`.
    ///
    /// The status write is optimistic; if the spawn then fails the record
    /// stays `active` with no worker. `get_bot_status` surfaces that
    /// inconsistency and the next `initialize()` self-heals it.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyRunning`, `SpawnFailure`, or `Repository`.
    pub async fn start_bot(&self, id: &str) -> Result<BotRecord, OrchestratorError> {
        let lock = self.id_lock(id).await;
        let _guard = lock.lock().await;

        let bot = self.load(id).await?;
        if bot.status == BotStatus::Active {
            let err = OrchestratorError::AlreadyRunning(id.to_string());
            self.hub.emit_error(id, &err.to_string()).await;
            return Err(err);
        }
        let previous = bot.status;

        let updated = self
            .repository
            .update_status(id, BotStatus::Active)
            .await
            .map_err(OrchestratorError::Repository)?
            .ok_or_else(|| OrchestratorError::NotFound(id.to_string()))?;

        if self.bots.read().await.contains_key(id) {
            // A worker survived an earlier partial failure; spawn-if-absent
            // keeps start idempotent at the registry level.
            tracing::warn!("Worker for bot {id} already registered, skipping spawn");
        } else if let Err(e) = self.spawn_worker(&updated).await {
            self.hub.emit_error(id, &e.to_string()).await;
            return Err(e);
        }

        self.hub.emit_status_changed(&updated, previous).await;
        tracing::info!("Bot {id} started ({previous} -> active)");
        Ok(updated)
    }

    /// Stops a bot: signals the worker, waits out the graceful window
    /// (force-terminating on expiry), persists `stopped`, emits
    /// `status_changed`.
    ///
    /// A stop timeout is recovered internally and does not fail the call.
    ///
    /// # Errors
    /// `NotFound`, `NotRunning`, or `Repository`.
    pub async fn stop_bot(&self, id: &str) -> Result<BotRecord, OrchestratorError> {
        let lock = self.id_lock(id).await;
        let _guard = lock.lock().await;

        let bot = self.load(id).await?;
        if bot.status != BotStatus::Active {
            let err = OrchestratorError::NotRunning(id.to_string());
            self.hub.emit_error(id, &err.to_string()).await;
            return Err(err);
        }

        self.stop_worker(id).await;

        let updated = match self.repository.update_status(id, BotStatus::Stopped).await {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                let err = OrchestratorError::NotFound(id.to_string());
                self.hub.emit_error(id, &err.to_string()).await;
                return Err(err);
            }
            Err(e) => {
                let err = OrchestratorError::Repository(e);
                self.hub.emit_error(id, &err.to_string()).await;
                return Err(err);
            }
        };

        self.hub
            .emit_status_changed(&updated, BotStatus::Active)
            .await;
        tracing::info!("Bot {id} stopped");
        Ok(updated)
    }

    /// Returns persisted status plus whether a worker is registered.
    ///
    /// Disagreement between the two is logged, not repaired; repair is
    /// `initialize()`'s job on the next process start.
    ///
    /// # Errors
    /// `NotFound` or `Repository`.
    pub async fn get_bot_status(&self, id: &str) -> Result<BotStatusReport, OrchestratorError> {
        let bot = self.load(id).await?;
        let worker_running = self.bots.read().await.contains_key(id);

        if (bot.status == BotStatus::Active) != worker_running {
            tracing::warn!(
                "Bot {id} inconsistency: persisted status is {} but worker_running={worker_running}",
                bot.status
            );
        }

        Ok(BotStatusReport {
            id: bot.id,
            status: bot.status,
            worker_running,
        })
    }

    /// Ids with a registered worker.
    #[must_use]
    pub async fn running_workers(&self) -> Vec<String> {
        self.bots.read().await.keys().cloned().collect()
    }

    /// Stops every registered worker without touching persisted status,
    /// so the next `initialize()` resumes them.
    pub async fn shutdown(&self) {
        let ids = self.running_workers().await;
        for id in ids {
            self.stop_worker(&id).await;
        }
    }

    async fn load(&self, id: &str) -> Result<BotRecord, OrchestratorError> {
        match self
            .repository
            .get(id)
            .await
            .map_err(OrchestratorError::Repository)?
        {
            Some(bot) => Ok(bot),
            None => {
                let err = OrchestratorError::NotFound(id.to_string());
                self.hub.emit_error(id, &err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn id_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.op_locks
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Spawns the worker task and its message pump, registering the
    /// handle.
    ///
    /// Record-completeness problems fail here as `SpawnFailure`; runtime
    /// problems (missing credentials, chain errors) surface later as
    /// worker error messages.
    async fn spawn_worker(&self, bot: &BotRecord) -> Result<(), OrchestratorError> {
        if !bot.has_strategy_params() {
            return Err(OrchestratorError::SpawnFailure {
                id: bot.id.clone(),
                source: anyhow::anyhow!(
                    "Bot configuration is incomplete. Missing exchange1, exchange2, token1, or network."
                ),
            });
        }

        let (control_tx, control_rx) = mpsc::channel(8);
        let (msg_tx, mut msg_rx) = mpsc::channel(32);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let worker = BotWorker::new(
            bot.clone(),
            self.config.clone(),
            self.block_factory.clone(),
            control_rx,
            msg_tx,
        );
        let task = tokio::spawn(worker.run());

        // Pump worker messages into the event hub and surface the stop
        // acknowledgement to the handle.
        let hub = self.hub.clone();
        let pump_bot_id = bot.id.clone();
        tokio::spawn(async move {
            while let Some(message) = msg_rx.recv().await {
                match message {
                    WorkerMessage::Result { bot_id, data } => {
                        hub.emit_execution_result(&bot_id, data).await;
                    }
                    WorkerMessage::Error { bot_id, error } => {
                        tracing::warn!("Bot {bot_id} worker error: {error}");
                        hub.emit_error(&bot_id, &error).await;
                    }
                    WorkerMessage::Stopped { bot_id } => {
                        tracing::info!("Bot {bot_id} worker confirmed stop");
                        let _ = stopped_tx.send(true);
                    }
                }
            }
            // Channel closed: the worker exited, cleanly or not.
            let _ = stopped_tx.send(true);
            tracing::debug!("Message pump for bot {pump_bot_id} ended");
        });

        self.bots.write().await.insert(
            bot.id.clone(),
            WorkerHandle::new(bot.id.clone(), control_tx, task, stopped_rx),
        );
        tracing::info!("Spawned worker for bot {}", bot.id);
        Ok(())
    }

    /// Removes and winds down the worker for `id`. Idempotent: a missing
    /// handle is a no-op, and the handle is gone from the registry no
    /// matter which way the stop race resolves.
    async fn stop_worker(&self, id: &str) {
        let Some(mut handle) = self.bots.write().await.remove(id) else {
            tracing::debug!("No worker registered for bot {id}");
            return;
        };

        handle.send_stop().await;
        if handle.wait_stopped(self.stop_timeout).await {
            tracing::info!("Bot {id} worker stopped gracefully");
        } else {
            tracing::warn!(
                "Bot {id} worker did not acknowledge stop within {:?}, terminating",
                self.stop_timeout
            );
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_bot_chain::block_source::SimulatedBlockSourceFactory;
    use arb_bot_core::{Exchange, Network, Token};
    use arb_bot_data::InMemoryBotRepository;

    fn complete_bot(id: &str) -> BotRecord {
        let mut bot = BotRecord::new(id, "eth arb");
        bot.exchange1 = Some(Exchange::Uniswap2);
        bot.exchange2 = Some(Exchange::Sushiswap);
        bot.token1 = Some(Token::Eth);
        bot.network = Some(Network::Arb);
        bot
    }

    fn make_orchestrator(
        repo: Arc<InMemoryBotRepository>,
    ) -> (Arc<BotOrchestrator>, Arc<EventHub>) {
        let hub = Arc::new(EventHub::new());
        let orchestrator = BotOrchestrator::new(
            repo,
            hub.clone(),
            ArbitrageConfig::default(),
            Arc::new(SimulatedBlockSourceFactory::new(Duration::from_millis(10))),
        )
        .with_stop_timeout(Duration::from_millis(100));
        (Arc::new(orchestrator), hub)
    }

    #[tokio::test]
    async fn stop_worker_is_idempotent() {
        let repo = Arc::new(InMemoryBotRepository::new());
        repo.create(complete_bot("b1")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo);

        orchestrator.start_bot("b1").await.unwrap();
        orchestrator.stop_worker("b1").await;
        orchestrator.stop_worker("b1").await;
        assert!(orchestrator.running_workers().await.is_empty());
    }

    #[tokio::test]
    async fn unresponsive_worker_is_force_terminated() {
        let repo = Arc::new(InMemoryBotRepository::new());
        let mut bot = complete_bot("b1");
        bot.status = BotStatus::Active;
        repo.create(bot).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo.clone());

        // Register a handle whose worker ignores control messages and
        // never acknowledges.
        let (control_tx, _control_rx) = mpsc::channel(8);
        let (_stopped_tx, stopped_rx) = watch::channel(false);
        let task = tokio::spawn(std::future::pending::<()>());
        orchestrator.bots.write().await.insert(
            "b1".to_string(),
            WorkerHandle::new("b1".to_string(), control_tx, task, stopped_rx),
        );

        let updated = orchestrator.stop_bot("b1").await.unwrap();
        assert_eq!(updated.status, BotStatus::Stopped);
        assert!(orchestrator.running_workers().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_starts_spawn_one_worker() {
        let repo = Arc::new(InMemoryBotRepository::new());
        repo.create(complete_bot("b1")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo);

        let a = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.start_bot("b1").await }
        });
        let b = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.start_bot("b1").await }
        });

        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());
        // The per-id lock serializes them: exactly one wins.
        assert!(ra.is_ok() ^ rb.is_ok());
        assert_eq!(orchestrator.running_workers().await.len(), 1);

        orchestrator.stop_bot("b1").await.unwrap();
    }

    #[tokio::test]
    async fn initialize_skips_bots_with_a_registered_worker() {
        let repo = Arc::new(InMemoryBotRepository::new());
        repo.create(complete_bot("b1")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo);

        orchestrator.start_bot("b1").await.unwrap();
        // b1 is now persisted active; a resume pass must not spawn a
        // second worker over the live one.
        orchestrator.initialize().await.unwrap();
        assert_eq!(orchestrator.running_workers().await.len(), 1);

        orchestrator.stop_bot("b1").await.unwrap();
    }

    #[tokio::test]
    async fn spawn_failure_leaves_status_active_for_self_heal() {
        let repo = Arc::new(InMemoryBotRepository::new());
        // Missing strategy params: the spawn pre-flight rejects it.
        repo.create(BotRecord::new("b1", "incomplete")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo.clone());

        let err = orchestrator.start_bot("b1").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::SpawnFailure { .. }));

        // Decided policy: no rollback; the inconsistency is visible and
        // initialize() repairs it on the next process start.
        let report = orchestrator.get_bot_status("b1").await.unwrap();
        assert_eq!(report.status, BotStatus::Active);
        assert!(!report.worker_running);
    }

    #[tokio::test]
    async fn shutdown_stops_all_workers_without_status_writes() {
        let repo = Arc::new(InMemoryBotRepository::new());
        repo.create(complete_bot("b1")).await.unwrap();
        repo.create(complete_bot("b2")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo.clone());

        orchestrator.start_bot("b1").await.unwrap();
        orchestrator.start_bot("b2").await.unwrap();
        orchestrator.shutdown().await;

        assert!(orchestrator.running_workers().await.is_empty());
        // Status stays active so initialize() resumes them next session.
        assert_eq!(
            repo.get("b1").await.unwrap().unwrap().status,
            BotStatus::Active
        );
    }

    #[tokio::test]
    async fn graceful_stop_skips_forced_termination() {
        let repo = Arc::new(InMemoryBotRepository::new());
        repo.create(complete_bot("b1")).await.unwrap();
        let (orchestrator, _hub) = make_orchestrator(repo);

        orchestrator.start_bot("b1").await.unwrap();
        let started = std::time::Instant::now();
        orchestrator.stop_bot("b1").await.unwrap();
        // A cooperative worker acks well inside the 100ms test window.
        assert!(started.elapsed() < DEFAULT_STOP_TIMEOUT);
    }
}
