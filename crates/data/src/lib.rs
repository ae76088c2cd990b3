pub mod memory;
pub mod repository;
pub mod sqlite;

pub use memory::InMemoryBotRepository;
pub use repository::BotRepository;
pub use sqlite::SqliteBotRepository;
