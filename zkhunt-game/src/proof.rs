//! Proof blob wire layout and the verifier seam.
//!
//! A proof blob is a 4-byte big-endian public-field count, the public inputs
//! as 32-byte fields, then the proof bytes proper:
//!
//! ```text
//! jungle_move:     [count=3][old_commitment][new_commitment][map_id][proof..]
//! search_response: [count=19][commitment][searched_x; 9][searched_y; 9][proof..]
//! ```
//!
//! Small integers sit in the final byte of their field, the rest zeroed.

use crate::commitment::Commitment;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const HEADER_BYTES: usize = 4;
pub const FIELD_BYTES: usize = 32;
pub const SEARCH_SLOTS: usize = 9;

/// Marks unused searched slots. Never a valid coordinate.
pub const SENTINEL: u8 = 255;

pub const MOVE_PUBLIC_FIELDS: usize = 3;
pub const SEARCH_PUBLIC_FIELDS: usize = 1 + 2 * SEARCH_SLOTS;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("{0} searched tiles exceed the 9 circuit slots")]
    TooManyTiles(usize),

    #[error("proof blob too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("expected {expected} public fields, blob declares {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("public field {0} is not a canonical small integer")]
    NonCanonical(usize),
}

/// Circuits known to both the clients and the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Circuit {
    Commitment,
    JungleMove,
    SearchResponse,
}

impl Circuit {
    pub fn name(&self) -> &'static str {
        match self {
            Circuit::Commitment => "commitment",
            Circuit::JungleMove => "jungle_move",
            Circuit::SearchResponse => "search_response",
        }
    }
}

/// Pad searched coordinates to the fixed circuit width with [`SENTINEL`].
///
/// A full-width input is returned unchanged; a longer one is a caller error.
pub fn pad_searched(values: &[u8]) -> Result<[u8; SEARCH_SLOTS], WireError> {
    if values.len() > SEARCH_SLOTS {
        return Err(WireError::TooManyTiles(values.len()));
    }
    let mut padded = [SENTINEL; SEARCH_SLOTS];
    padded[..values.len()].copy_from_slice(values);
    Ok(padded)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePublicInputs {
    pub old_commitment: Commitment,
    pub new_commitment: Commitment,
    pub map_id: u8,
}

impl MovePublicInputs {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = header(MOVE_PUBLIC_FIELDS);
        out.extend_from_slice(self.old_commitment.as_bytes());
        out.extend_from_slice(self.new_commitment.as_bytes());
        out.extend_from_slice(&small_field(self.map_id));
        out
    }

    pub fn decode(blob: &[u8]) -> Result<Self, WireError> {
        check_header(blob, MOVE_PUBLIC_FIELDS)?;
        Ok(Self {
            old_commitment: read_field(blob, 0),
            new_commitment: read_field(blob, 1),
            map_id: read_small(blob, 2)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPublicInputs {
    pub commitment: Commitment,
    pub searched_x: [u8; SEARCH_SLOTS],
    pub searched_y: [u8; SEARCH_SLOTS],
}

impl SearchPublicInputs {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = header(SEARCH_PUBLIC_FIELDS);
        out.extend_from_slice(self.commitment.as_bytes());
        for v in self.searched_x.iter().chain(self.searched_y.iter()) {
            out.extend_from_slice(&small_field(*v));
        }
        out
    }

    pub fn decode(blob: &[u8]) -> Result<Self, WireError> {
        check_header(blob, SEARCH_PUBLIC_FIELDS)?;
        let mut searched_x = [0u8; SEARCH_SLOTS];
        let mut searched_y = [0u8; SEARCH_SLOTS];
        for i in 0..SEARCH_SLOTS {
            searched_x[i] = read_small(blob, 1 + i)?;
            searched_y[i] = read_small(blob, 1 + SEARCH_SLOTS + i)?;
        }
        Ok(Self {
            commitment: read_field(blob, 0),
            searched_x,
            searched_y,
        })
    }
}

/// Length of the header plus public inputs for a blob.
pub fn public_section_len(fields: usize) -> usize {
    HEADER_BYTES + fields * FIELD_BYTES
}

fn header(fields: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(public_section_len(fields));
    out.extend_from_slice(&(fields as u32).to_be_bytes());
    out
}

fn check_header(blob: &[u8], expected: usize) -> Result<(), WireError> {
    let need = public_section_len(expected);
    if blob.len() < need {
        return Err(WireError::Truncated {
            need,
            have: blob.len(),
        });
    }
    let found = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    if found != expected {
        return Err(WireError::FieldCount { expected, found });
    }
    Ok(())
}

fn small_field(value: u8) -> [u8; FIELD_BYTES] {
    let mut field = [0u8; FIELD_BYTES];
    field[FIELD_BYTES - 1] = value;
    field
}

fn field_at(blob: &[u8], index: usize) -> &[u8] {
    let start = HEADER_BYTES + index * FIELD_BYTES;
    &blob[start..start + FIELD_BYTES]
}

fn read_field(blob: &[u8], index: usize) -> Commitment {
    let mut bytes = [0u8; FIELD_BYTES];
    bytes.copy_from_slice(field_at(blob, index));
    Commitment(bytes)
}

fn read_small(blob: &[u8], index: usize) -> Result<u8, WireError> {
    let field = field_at(blob, index);
    if field[..FIELD_BYTES - 1].iter().any(|&b| b != 0) {
        return Err(WireError::NonCanonical(index));
    }
    Ok(field[FIELD_BYTES - 1])
}

/// Verifies proofs on behalf of the authority.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, circuit: Circuit, proof: &[u8]) -> bool;
}

/// Shared key of the development proving pair.
#[derive(Clone, PartialEq, Eq)]
pub struct DevKey([u8; 32]);

impl DevKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Tag binding a circuit's public section under this key.
    pub fn attest(&self, circuit: Circuit, public_section: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"zkhunt/dev-attestation");
        hasher.update(self.0);
        hasher.update(circuit.name().as_bytes());
        hasher.update(public_section);
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for DevKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DevKey(..)")
    }
}

/// Development verifier: accepts blobs whose trailing 32 bytes attest to the
/// public section under a shared [`DevKey`].
///
/// Only sound while the key stays with the dev prover; it provides no
/// zero-knowledge guarantee and must not guard real stakes.
#[derive(Debug, Clone)]
pub struct DevVerifier {
    key: DevKey,
}

impl DevVerifier {
    pub fn new(key: DevKey) -> Self {
        Self { key }
    }
}

impl ProofVerifier for DevVerifier {
    fn verify(&self, circuit: Circuit, proof: &[u8]) -> bool {
        let fields = match circuit {
            Circuit::JungleMove => MOVE_PUBLIC_FIELDS,
            Circuit::SearchResponse => SEARCH_PUBLIC_FIELDS,
            Circuit::Commitment => return false,
        };
        let split = public_section_len(fields);
        if proof.len() != split + 32 {
            return false;
        }
        let (public, tag) = proof.split_at(split);
        self.key.attest(circuit, public).as_slice() == tag
    }
}
