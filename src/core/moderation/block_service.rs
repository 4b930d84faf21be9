// Block list: blocked members are ignored by every command and handler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::moderation_models::{BlockEntry, ModerationError};

#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<BlockEntry>, ModerationError>;

    async fn insert(&self, entry: BlockEntry) -> Result<(), ModerationError>;

    async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool, ModerationError>;

    async fn list(&self, guild_id: u64) -> Result<Vec<BlockEntry>, ModerationError>;
}

pub struct BlockService<S: BlockStore> {
    store: S,
}

impl<S: BlockStore> BlockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn block(
        &self,
        guild_id: u64,
        user_id: u64,
        blocked_by: u64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockEntry, ModerationError> {
        if user_id == blocked_by {
            return Err(ModerationError::SelfTarget);
        }
        if self.store.get(guild_id, user_id).await?.is_some() {
            return Err(ModerationError::AlreadyBlocked);
        }
        let entry = BlockEntry {
            guild_id,
            user_id,
            reason: reason.trim().to_string(),
            blocked_by,
            created_at: now,
        };
        self.store.insert(entry.clone()).await?;
        Ok(entry)
    }

    pub async fn unblock(&self, guild_id: u64, user_id: u64) -> Result<(), ModerationError> {
        if self.store.remove(guild_id, user_id).await? {
            Ok(())
        } else {
            Err(ModerationError::NotBlocked)
        }
    }

    pub async fn is_blocked(&self, guild_id: u64, user_id: u64) -> Result<bool, ModerationError> {
        Ok(self.store.get(guild_id, user_id).await?.is_some())
    }

    pub async fn get(&self, guild_id: u64, user_id: u64) -> Result<Option<BlockEntry>, ModerationError> {
        self.store.get(guild_id, user_id).await
    }

    /// Oldest first.
    pub async fn list(&self, guild_id: u64) -> Result<Vec<BlockEntry>, ModerationError> {
        let mut entries = self.store.list(guild_id).await?;
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    struct MockBlockStore {
        entries: DashMap<(u64, u64), BlockEntry>,
    }

    #[async_trait]
    impl BlockStore for MockBlockStore {
        async fn get(
            &self,
            guild_id: u64,
            user_id: u64,
        ) -> Result<Option<BlockEntry>, ModerationError> {
            Ok(self.entries.get(&(guild_id, user_id)).map(|e| e.clone()))
        }

        async fn insert(&self, entry: BlockEntry) -> Result<(), ModerationError> {
            self.entries.insert((entry.guild_id, entry.user_id), entry);
            Ok(())
        }

        async fn remove(&self, guild_id: u64, user_id: u64) -> Result<bool, ModerationError> {
            Ok(self.entries.remove(&(guild_id, user_id)).is_some())
        }

        async fn list(&self, guild_id: u64) -> Result<Vec<BlockEntry>, ModerationError> {
            Ok(self
                .entries
                .iter()
                .filter(|e| e.key().0 == guild_id)
                .map(|e| e.value().clone())
                .collect())
        }
    }

    fn service() -> BlockService<MockBlockStore> {
        BlockService::new(MockBlockStore {
            entries: DashMap::new(),
        })
    }

    #[tokio::test]
    async fn block_and_unblock() {
        let service = service();
        let now = Utc::now();

        service.block(1, 10, 99, " spam ", now).await.unwrap();
        assert!(service.is_blocked(1, 10).await.unwrap());
        assert!(!service.is_blocked(2, 10).await.unwrap());
        assert_eq!(service.list(1).await.unwrap()[0].reason, "spam");

        service.unblock(1, 10).await.unwrap();
        assert!(!service.is_blocked(1, 10).await.unwrap());
        assert_eq!(
            service.unblock(1, 10).await,
            Err(ModerationError::NotBlocked)
        );
    }

    #[tokio::test]
    async fn rejects_self_and_duplicate_blocks() {
        let service = service();
        let now = Utc::now();

        assert_eq!(
            service.block(1, 10, 10, "", now).await,
            Err(ModerationError::SelfTarget)
        );
        service.block(1, 10, 99, "", now).await.unwrap();
        assert_eq!(
            service.block(1, 10, 98, "", now).await,
            Err(ModerationError::AlreadyBlocked)
        );
    }
}
