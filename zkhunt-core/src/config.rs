use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    Local,
    Testnet,
    Futurenet,
    Mainnet,
}

impl std::fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NetworkKind::Local => "local",
            NetworkKind::Testnet => "testnet",
            NetworkKind::Futurenet => "futurenet",
            NetworkKind::Mainnet => "mainnet",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for NetworkKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "standalone" => Ok(NetworkKind::Local),
            "testnet" => Ok(NetworkKind::Testnet),
            "futurenet" => Ok(NetworkKind::Futurenet),
            "mainnet" | "public" => Ok(NetworkKind::Mainnet),
            other => Err(ClientError::config(format!("Unknown network: {}", other))),
        }
    }
}

/// Everything a player client needs to reach the authority and keep its
/// prey secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub network: NetworkKind,
    pub rpc_url: String,
    pub network_passphrase: String,
    pub contract_id: String,
    pub poll_interval: Duration,
    /// How long to wait on a single proof before giving up on it.
    pub response_timeout: Duration,
    pub data_dir: PathBuf,
    /// Encrypts stored prey secrets when set.
    pub secret_passphrase: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Local,
            rpc_url: "http://localhost:8000/rpc".to_string(),
            network_passphrase: "Standalone Network ; February 2017".to_string(),
            contract_id: "local".to_string(),
            poll_interval: Duration::from_secs(3),
            response_timeout: Duration::from_secs(120),
            data_dir: default_data_dir(),
            secret_passphrase: None,
        }
    }
}

impl ClientConfig {
    pub fn new(network: NetworkKind) -> Self {
        let mut config = Self::default();
        config.network = network;

        match network {
            NetworkKind::Testnet => {
                config.rpc_url = "https://soroban-testnet.stellar.org:443".to_string();
                config.network_passphrase = "Test SDF Network ; September 2015".to_string();
            }
            NetworkKind::Futurenet => {
                config.rpc_url = "https://rpc-futurenet.stellar.org:443".to_string();
                config.network_passphrase =
                    "Test SDF Future Network ; October 2022".to_string();
            }
            NetworkKind::Mainnet => {
                config.rpc_url = "https://soroban-rpc.mainnet.stellar.org:443".to_string();
                config.network_passphrase =
                    "Public Global Stellar Network ; September 2015".to_string();
            }
            NetworkKind::Local => {
                // keep defaults for local
            }
        }

        config
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = contract_id.into();
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn secret_db_path(&self) -> PathBuf {
        self.data_dir.join("prey_secrets.db")
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(ClientError::config("RPC URL cannot be empty"));
        }

        if self.network_passphrase.is_empty() {
            return Err(ClientError::config("Network passphrase cannot be empty"));
        }

        if self.contract_id.is_empty() {
            return Err(ClientError::config("Contract id cannot be empty"));
        }

        if self.poll_interval.is_zero() {
            return Err(ClientError::config("Poll interval must be greater than 0"));
        }

        if self.response_timeout.is_zero() {
            return Err(ClientError::config("Response timeout must be greater than 0"));
        }

        if matches!(&self.secret_passphrase, Some(p) if p.is_empty()) {
            return Err(ClientError::config("Secret passphrase cannot be empty"));
        }

        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".zkhunt")
}
