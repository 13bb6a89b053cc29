//! The proof engine boundary.
//!
//! The client never proves anything itself: it hands circuit inputs to an
//! engine that can either execute a circuit (witness check plus public
//! outputs) or produce a full proof blob in the wire layout the authority
//! expects.

pub mod dev;

pub use dev::DevProofEngine;

use async_trait::async_trait;
use thiserror::Error;
use zkhunt_game::{Circuit, Commitment, PreySecret, SEARCH_SLOTS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("circuit {0} is not supported by this engine")]
    Unsupported(&'static str),

    #[error("constraint failed in {circuit}: {reason}")]
    Unsatisfied {
        circuit: &'static str,
        reason: String,
    },

    /// An out-of-process prover could not be reached.
    #[error("proof engine unavailable: {0}")]
    Unavailable(String),

    #[error("proof generation timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

impl EngineError {
    pub(crate) fn unsatisfied(circuit: Circuit, reason: impl Into<String>) -> Self {
        Self::Unsatisfied {
            circuit: circuit.name(),
            reason: reason.into(),
        }
    }
}

/// Typed inputs for each circuit, public and private together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitInputs {
    Commitment {
        secret: PreySecret,
    },
    JungleMove {
        old_commitment: Commitment,
        new_commitment: Commitment,
        map_id: u8,
        old: PreySecret,
        new: PreySecret,
    },
    SearchResponse {
        commitment: Commitment,
        searched_x: [u8; SEARCH_SLOTS],
        searched_y: [u8; SEARCH_SLOTS],
        secret: PreySecret,
    },
}

impl CircuitInputs {
    pub fn circuit(&self) -> Circuit {
        match self {
            CircuitInputs::Commitment { .. } => Circuit::Commitment,
            CircuitInputs::JungleMove { .. } => Circuit::JungleMove,
            CircuitInputs::SearchResponse { .. } => Circuit::SearchResponse,
        }
    }
}

/// A finished proof: the blob to submit and the public inputs it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOutput {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<[u8; 32]>,
}

#[async_trait]
pub trait ProofEngine: Send + Sync {
    /// Run the circuit without proving; returns its public outputs as
    /// 32-byte fields.
    async fn execute(&self, inputs: &CircuitInputs) -> Result<Vec<[u8; 32]>, EngineError>;

    async fn prove(&self, inputs: &CircuitInputs) -> Result<ProofOutput, EngineError>;
}
