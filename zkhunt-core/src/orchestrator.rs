use crate::error::{ClientError, Result};
use crate::prover::{CircuitInputs, EngineError, ProofEngine, ProofOutput};
use std::sync::Arc;
use std::time::{Duration, Instant};
use zkhunt_game::{Commitment, Game, PreySecret};

/// A jungle move ready for submission.
#[derive(Debug, Clone)]
pub struct MoveProof {
    pub new_commitment: Commitment,
    pub proof: Vec<u8>,
    /// Opening of `new_commitment`; becomes the stored secret once the move
    /// is accepted.
    pub secret: PreySecret,
}

/// How the prey answers a pending search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResponse {
    /// Non-presence proof over the padded searched tiles.
    Proof(Vec<u8>),
    /// The true position was searched; no proof can exist.
    Exposed,
}

impl SearchResponse {
    /// Bytes for `respond_search`; exposure is conceded with an empty proof.
    pub fn into_submission(self) -> Vec<u8> {
        match self {
            SearchResponse::Proof(proof) => proof,
            SearchResponse::Exposed => Vec::new(),
        }
    }

    pub fn is_exposed(&self) -> bool {
        matches!(self, SearchResponse::Exposed)
    }
}

/// Builds circuit inputs from prey secrets and public state and drives the
/// proof engine.
#[derive(Clone)]
pub struct ProofOrchestrator {
    engine: Arc<dyn ProofEngine>,
    timeout: Option<Duration>,
}

impl ProofOrchestrator {
    pub fn new(engine: Arc<dyn ProofEngine>) -> Self {
        Self {
            engine,
            timeout: None,
        }
    }

    /// Abandon any single proof that takes longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Commitment of `secret` as the circuit computes it, cross-checked
    /// against the local scheme.
    pub async fn commitment(&self, secret: &PreySecret) -> Result<Commitment> {
        let outputs = self
            .engine
            .execute(&CircuitInputs::Commitment {
                secret: secret.clone(),
            })
            .await?;
        let digest = outputs
            .first()
            .map(|field| Commitment(*field))
            .ok_or_else(|| ClientError::internal("commitment circuit returned no output"))?;

        if digest != secret.commitment() {
            return Err(ClientError::internal(
                "proof engine and local commitment scheme disagree",
            ));
        }
        Ok(digest)
    }

    /// Prove a step from `old` into the jungle tile held by `new`.
    pub async fn move_proof(
        &self,
        old: &PreySecret,
        new: &PreySecret,
        map_id: u8,
    ) -> Result<MoveProof> {
        let old_commitment = self.commitment(old).await?;
        let new_commitment = self.commitment(new).await?;

        let output = self
            .prove(CircuitInputs::JungleMove {
                old_commitment,
                new_commitment,
                map_id,
                old: old.clone(),
                new: new.clone(),
            })
            .await?;

        Ok(MoveProof {
            new_commitment,
            proof: output.proof,
            secret: new.clone(),
        })
    }

    /// Answer the search pending in `game`, or report that the position is
    /// exposed without asking the engine.
    pub async fn search_response(&self, secret: &PreySecret, game: &Game) -> Result<SearchResponse> {
        let commitment = secret.commitment();
        if commitment != game.prey_commitment {
            return Err(ClientError::SecretMismatch);
        }

        if game.searched_tiles().contains(&secret.position()) {
            tracing::info!(
                "Prey position is among {} searched tile(s), conceding",
                game.searched_tiles_x.len()
            );
            return Ok(SearchResponse::Exposed);
        }

        let (searched_x, searched_y) = game.padded_search()?;
        let output = self
            .prove(CircuitInputs::SearchResponse {
                commitment,
                searched_x,
                searched_y,
                secret: secret.clone(),
            })
            .await?;

        Ok(SearchResponse::Proof(output.proof))
    }

    async fn prove(&self, inputs: CircuitInputs) -> Result<ProofOutput> {
        let circuit = inputs.circuit();
        let started = Instant::now();
        tracing::info!("Generating {} proof", circuit.name());

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.engine.prove(&inputs)).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::TimedOut(limit)),
            },
            None => self.engine.prove(&inputs).await,
        };

        match &result {
            Ok(output) => tracing::info!(
                "{} proof ready: {} bytes in {:?}",
                circuit.name(),
                output.proof.len(),
                started.elapsed()
            ),
            Err(e) => tracing::warn!("{} proof failed: {}", circuit.name(), e),
        }
        Ok(result?)
    }
}
