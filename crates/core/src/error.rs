use thiserror::Error;

/// Failures surfaced by the orchestrator's public operations.
///
/// Stop timeouts and per-observer broadcast failures are recovered
/// internally (forced termination, observer pruning) and never reach the
/// caller, so they have no variants here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Bot with ID {0} not found")]
    NotFound(String),

    #[error("Bot {0} is already running")]
    AlreadyRunning(String),

    #[error("Bot {0} is not running")]
    NotRunning(String),

    #[error("Failed to spawn worker for bot {id}")]
    SpawnFailure {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Repository error")]
    Repository(#[source] anyhow::Error),
}

impl OrchestratorError {
    /// Short machine-readable tag used in error events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyRunning(_) => "already_running",
            Self::NotRunning(_) => "not_running",
            Self::SpawnFailure { .. } => "spawn_failure",
            Self::Repository(_) => "repository",
        }
    }
}
