//! Keyed persistence for the prey's secret.
//!
//! Exactly one record per session. Writes replace (last writer wins) and
//! clearing a missing record is not an error.

pub mod encryption;
pub mod sqlite;

pub use sqlite::SqliteSecretStore;

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zkhunt_game::PreySecret;

/// A prey secret tagged with the round it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    pub round: u32,
    pub secret: PreySecret,
}

impl StoredSecret {
    pub fn new(round: u32, secret: PreySecret) -> Self {
        Self { round, secret }
    }
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn load(&self, session_id: u32) -> Result<Option<StoredSecret>>;

    async fn save(&self, session_id: u32, record: &StoredSecret) -> Result<()>;

    async fn clear(&self, session_id: u32) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    records: RwLock<HashMap<u32, StoredSecret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn load(&self, session_id: u32) -> Result<Option<StoredSecret>> {
        Ok(self.records.read().get(&session_id).cloned())
    }

    async fn save(&self, session_id: u32, record: &StoredSecret) -> Result<()> {
        self.records.write().insert(session_id, record.clone());
        Ok(())
    }

    async fn clear(&self, session_id: u32) -> Result<()> {
        self.records.write().remove(&session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkhunt_game::Position;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySecretStore::new();
        let record = StoredSecret::new(1, PreySecret::new(Position::new(3, 4), u128::MAX));

        assert_eq!(store.load(7).await.unwrap(), None);
        store.save(7, &record).await.unwrap();
        assert_eq!(store.load(7).await.unwrap(), Some(record.clone()));
        assert_eq!(store.load(8).await.unwrap(), None);

        let newer = StoredSecret::new(2, PreySecret::new(Position::new(0, 0), 1));
        store.save(7, &newer).await.unwrap();
        assert_eq!(store.load(7).await.unwrap(), Some(newer));

        store.clear(7).await.unwrap();
        store.clear(7).await.unwrap();
        assert_eq!(store.load(7).await.unwrap(), None);
    }
}
