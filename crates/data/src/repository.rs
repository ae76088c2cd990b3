use anyhow::Result;
use arb_bot_core::{BotRecord, BotStatus};
use async_trait::async_trait;

/// Persistence seam consumed by the orchestrator.
///
/// The orchestrator only ever reads records and writes `status`; record
/// creation and deletion belong to the CRUD layer that fronts this trait.
#[async_trait]
pub trait BotRepository: Send + Sync {
    /// Fetches a record by id, `None` when it does not exist.
    async fn get(&self, id: &str) -> Result<Option<BotRecord>>;

    /// Persists a new status for the record, returning the updated record
    /// or `None` when the id is unknown. Implementations bump `updated_at`.
    async fn update_status(&self, id: &str, status: BotStatus) -> Result<Option<BotRecord>>;

    /// Returns every record currently in the given status.
    async fn find_by_status(&self, status: BotStatus) -> Result<Vec<BotRecord>>;

    /// Inserts a record (or replaces one with the same id).
    async fn create(&self, record: BotRecord) -> Result<BotRecord>;

    /// Deletes a record, returning whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Returns all records.
    async fn list(&self) -> Result<Vec<BotRecord>>;
}
