pub mod scheme;

pub use scheme::CommitmentScheme;

use crate::board::Position;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const COMMITMENT_DOMAIN: &[u8] = b"zkhunt/position-commitment/v1";

/// 32-byte digest binding a hidden position to a nonce.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Stored while the prey is visible.
    pub const ZERO: Commitment = Commitment([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Short hex prefix for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl std::fmt::Debug for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commitment({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Commitment {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The prey's true position and the nonce behind its current commitment.
///
/// Only ever held by the prey's own process; it leaves that process solely as
/// private circuit input.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreySecret {
    pub x: u8,
    pub y: u8,
    #[serde(with = "nonce_string")]
    pub nonce: u128,
}

impl PreySecret {
    pub fn new(position: Position, nonce: u128) -> Self {
        Self {
            x: position.x,
            y: position.y,
            nonce,
        }
    }

    /// Fresh secret at `position` with a newly drawn nonce.
    pub fn fresh(position: Position) -> Self {
        Self::new(position, generate_nonce())
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn commitment(&self) -> Commitment {
        PositionCommitment::commit(self)
    }
}

// Never print the opening.
impl std::fmt::Debug for PreySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreySecret")
            .field("commitment", &self.commitment().short())
            .finish_non_exhaustive()
    }
}

/// SHA-256 over a domain tag and the fixed-width encoding of `(x, y, nonce)`.
pub struct PositionCommitment;

impl CommitmentScheme for PositionCommitment {
    type Opening = PreySecret;
    type Commitment = Commitment;

    fn commit(opening: &PreySecret) -> Commitment {
        commit(opening.x, opening.y, opening.nonce)
    }
}

pub fn commit(x: u8, y: u8, nonce: u128) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(COMMITMENT_DOMAIN);
    hasher.update([x, y]);
    hasher.update(nonce.to_be_bytes());
    Commitment(hasher.finalize().into())
}

/// Random 128-bit nonce
pub fn generate_nonce() -> u128 {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    u128::from_be_bytes(bytes)
}

/// Nonces are persisted as decimal strings.
mod nonce_string {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(nonce: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&nonce.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map_err(D::Error::custom)
    }
}
