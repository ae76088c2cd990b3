use crate::protocol::ControlMessage;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Orchestrator-side handle to one running worker.
///
/// The `stopped` flag is flipped by the orchestrator's message pump when
/// the worker acknowledges a stop or its channel closes, so waiting on it
/// covers both a clean ack and a worker that simply exited.
pub struct WorkerHandle {
    bot_id: String,
    control_tx: mpsc::Sender<ControlMessage>,
    task: JoinHandle<()>,
    stopped_rx: watch::Receiver<bool>,
}

impl WorkerHandle {
    pub(crate) fn new(
        bot_id: String,
        control_tx: mpsc::Sender<ControlMessage>,
        task: JoinHandle<()>,
        stopped_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            bot_id,
            control_tx,
            task,
            stopped_rx,
        }
    }

    #[must_use]
    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Requests a graceful stop. A closed channel means the worker is
    /// already gone, which the stop path treats as success.
    pub async fn send_stop(&self) {
        if self.control_tx.send(ControlMessage::Stop).await.is_err() {
            tracing::debug!("Worker for bot {} already gone", self.bot_id);
        }
    }

    /// Waits for the stop acknowledgement (or worker exit), bounded by
    /// `timeout`. Returns whether the worker stopped in time.
    pub async fn wait_stopped(&mut self, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, self.stopped_rx.wait_for(|stopped| *stopped)).await,
            Ok(Ok(_))
        )
    }

    /// Forced termination; used only after the graceful window elapses.
    pub fn abort(&self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unresponsive_handle() -> (WorkerHandle, mpsc::Receiver<ControlMessage>) {
        let (control_tx, control_rx) = mpsc::channel(8);
        let (_stopped_tx, stopped_rx) = watch::channel(false);
        let task = tokio::spawn(std::future::pending::<()>());
        (
            WorkerHandle::new("b1".to_string(), control_tx, task, stopped_rx),
            control_rx,
        )
    }

    #[tokio::test]
    async fn wait_stopped_times_out_when_never_acked() {
        let (mut handle, _control_rx) = unresponsive_handle();
        assert!(!handle.wait_stopped(Duration::from_millis(20)).await);
        handle.abort();
    }

    #[tokio::test]
    async fn wait_stopped_returns_on_ack() {
        let (control_tx, _control_rx) = mpsc::channel(8);
        let (stopped_tx, stopped_rx) = watch::channel(false);
        let task = tokio::spawn(async {});
        let mut handle = WorkerHandle::new("b1".to_string(), control_tx, task, stopped_rx);

        stopped_tx.send(true).unwrap();
        assert!(handle.wait_stopped(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn send_stop_tolerates_closed_channel() {
        let (handle, control_rx) = unresponsive_handle();
        drop(control_rx);
        handle.send_stop().await;
        handle.abort();
    }
}
