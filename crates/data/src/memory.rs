use crate::repository::BotRepository;
use anyhow::Result;
use arb_bot_core::{BotRecord, BotStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory repository for tests and embedded use.
#[derive(Default)]
pub struct InMemoryBotRepository {
    bots: RwLock<HashMap<String, BotRecord>>,
}

impl InMemoryBotRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BotRepository for InMemoryBotRepository {
    async fn get(&self, id: &str) -> Result<Option<BotRecord>> {
        Ok(self.bots.read().await.get(id).cloned())
    }

    async fn update_status(&self, id: &str, status: BotStatus) -> Result<Option<BotRecord>> {
        let mut bots = self.bots.write().await;
        let Some(bot) = bots.get_mut(id) else {
            return Ok(None);
        };
        bot.status = status;
        bot.updated_at = Utc::now();
        Ok(Some(bot.clone()))
    }

    async fn find_by_status(&self, status: BotStatus) -> Result<Vec<BotRecord>> {
        Ok(self
            .bots
            .read()
            .await
            .values()
            .filter(|bot| bot.status == status)
            .cloned()
            .collect())
    }

    async fn create(&self, record: BotRecord) -> Result<BotRecord> {
        self.bots
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.bots.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<BotRecord>> {
        Ok(self.bots.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_unknown_id() {
        let repo = InMemoryBotRepository::new();
        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_bumps_updated_at() {
        let repo = InMemoryBotRepository::new();
        let bot = repo.create(BotRecord::new("b1", "test")).await.unwrap();
        let updated = repo
            .update_status("b1", BotStatus::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, BotStatus::Active);
        assert!(updated.updated_at >= bot.updated_at);
    }

    #[tokio::test]
    async fn find_by_status_filters() {
        let repo = InMemoryBotRepository::new();
        repo.create(BotRecord::new("b1", "one")).await.unwrap();
        repo.create(BotRecord::new("b2", "two")).await.unwrap();
        repo.update_status("b1", BotStatus::Active).await.unwrap();

        let active = repo.find_by_status(BotStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "b1");
    }
}
