use crate::prover::EngineError;
use thiserror::Error;
use zkhunt_game::{HuntError, WireError};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Rejected by authority: {0}")]
    Rejected(#[from] HuntError),

    #[error("Proof engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("An action is already in flight for session {0}")]
    Busy(u32),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("No prey secret stored for session {0}")]
    SecretMissing(u32),

    #[error("Stored prey secret does not open the current commitment")]
    SecretMismatch,

    #[error("Search padding error: {0}")]
    Padding(#[from] WireError),

    /// Network failure reaching a remote authority. The in-process
    /// authority never produces it.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalMove(msg.into())
    }

    /// For `AuthorityClient` implementations talking to a remote authority.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the authority itself refused the operation, as opposed to a
    /// local, engine or network fault.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected(_))
    }

    /// The authority's rejection, if that is what this is.
    pub fn rejection(&self) -> Option<HuntError> {
        match self {
            ClientError::Rejected(err) => Some(*err),
            _ => None,
        }
    }
}
