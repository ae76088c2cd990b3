//! Bot orchestration core.
//!
//! Keeps three things mutually consistent under concurrent requests: the
//! persisted bot status, the actually-running worker for that bot, and the
//! observers watching lifecycle events. Workers are isolated tasks talking
//! to the orchestrator exclusively over typed channels.

pub mod event_hub;
pub mod events;
pub mod handle;
pub mod orchestrator;
pub mod protocol;
pub mod worker;

pub use event_hub::EventHub;
pub use events::{BotEvent, BotEventType};
pub use handle::WorkerHandle;
pub use orchestrator::{BotOrchestrator, BotStatusReport};
pub use protocol::{ControlMessage, WorkerMessage};
pub use worker::BotWorker;
