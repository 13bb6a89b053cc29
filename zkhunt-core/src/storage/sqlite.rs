use super::encryption::{self, SealedPayload};
use super::{SecretStore, StoredSecret};
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use tokio::sync::Mutex;
use zkhunt_game::PreySecret;

/// Prey secrets in a local SQLite file, optionally sealed with a passphrase.
pub struct SqliteSecretStore {
    conn: Mutex<Connection>,
    passphrase: Option<String>,
}

impl SqliteSecretStore {
    pub async fn open(db_path: &Path, passphrase: Option<String>) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            passphrase,
        };

        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS prey_secrets (
                session_id INTEGER PRIMARY KEY,
                round INTEGER NOT NULL,
                payload BLOB NOT NULL,
                encrypted INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    fn encode(&self, secret: &PreySecret) -> Result<(Vec<u8>, bool)> {
        let json = serde_json::to_vec(secret)?;
        match &self.passphrase {
            Some(passphrase) => {
                let sealed = encryption::seal(&json, passphrase)?;
                Ok((serde_json::to_vec(&sealed)?, true))
            }
            None => Ok((json, false)),
        }
    }

    fn decode(&self, payload: &[u8], encrypted: bool) -> Result<PreySecret> {
        if !encrypted {
            return Ok(serde_json::from_slice(payload)?);
        }
        let passphrase = self.passphrase.as_deref().ok_or_else(|| {
            ClientError::crypto("Stored secret is encrypted but no passphrase is configured")
        })?;
        let sealed: SealedPayload = serde_json::from_slice(payload)?;
        let json = encryption::open(&sealed, passphrase)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[async_trait]
impl SecretStore for SqliteSecretStore {
    async fn load(&self, session_id: u32) -> Result<Option<StoredSecret>> {
        let row = {
            let conn = self.conn.lock().await;
            conn.query_row(
                "SELECT round, payload, encrypted FROM prey_secrets WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
        };

        match row {
            Ok((round, payload, encrypted)) => {
                let secret = self.decode(&payload, encrypted)?;
                Ok(Some(StoredSecret { round, secret }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ClientError::Storage(e)),
        }
    }

    async fn save(&self, session_id: u32, record: &StoredSecret) -> Result<()> {
        let (payload, encrypted) = self.encode(&record.secret)?;
        let conn = self.conn.lock().await;

        conn.execute(
            "INSERT OR REPLACE INTO prey_secrets (session_id, round, payload, encrypted, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                record.round,
                payload,
                encrypted,
                Utc::now().timestamp(),
            ],
        )?;

        tracing::debug!(
            "Saved prey secret for session {} (round {}, {})",
            session_id,
            record.round,
            record.secret.commitment().short()
        );
        Ok(())
    }

    async fn clear(&self, session_id: u32) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM prey_secrets WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }
}
