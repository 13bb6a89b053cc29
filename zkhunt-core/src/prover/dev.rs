use super::{CircuitInputs, EngineError, ProofEngine, ProofOutput};
use async_trait::async_trait;
use std::time::Duration;
use zkhunt_game::proof::{FIELD_BYTES, HEADER_BYTES};
use zkhunt_game::{Board, Circuit, DevKey, MovePublicInputs, SearchPublicInputs, SENTINEL};

/// Development engine paired with [`zkhunt_game::DevVerifier`].
///
/// Checks every circuit constraint natively and attests to the public inputs
/// with the shared key. Gives no zero-knowledge guarantee.
#[derive(Debug, Clone)]
pub struct DevProofEngine {
    key: DevKey,
    latency: Duration,
}

impl DevProofEngine {
    pub fn new(key: DevKey) -> Self {
        Self {
            key,
            latency: Duration::ZERO,
        }
    }

    /// Simulated proving time, applied to every `prove` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Encoded public section of a satisfied circuit.
    fn public_section(&self, inputs: &CircuitInputs) -> Result<Vec<u8>, EngineError> {
        let circuit = inputs.circuit();
        match inputs {
            CircuitInputs::Commitment { .. } => Err(EngineError::Unsupported(circuit.name())),
            CircuitInputs::JungleMove {
                old_commitment,
                new_commitment,
                map_id,
                old,
                new,
            } => {
                if old.commitment() != *old_commitment {
                    return Err(EngineError::unsatisfied(circuit, "old commitment does not open"));
                }
                if new.commitment() != *new_commitment {
                    return Err(EngineError::unsatisfied(circuit, "new commitment does not open"));
                }
                let board = Board::get(*map_id)
                    .ok_or_else(|| EngineError::unsatisfied(circuit, "unknown map id"))?;
                if !board.is_jungle(new.position()) {
                    return Err(EngineError::unsatisfied(circuit, "destination is not jungle"));
                }
                if !new.position().is_step_from(&old.position()) {
                    return Err(EngineError::unsatisfied(circuit, "move is not a single step"));
                }

                Ok(MovePublicInputs {
                    old_commitment: *old_commitment,
                    new_commitment: *new_commitment,
                    map_id: *map_id,
                }
                .encode())
            }
            CircuitInputs::SearchResponse {
                commitment,
                searched_x,
                searched_y,
                secret,
            } => {
                if secret.commitment() != *commitment {
                    return Err(EngineError::unsatisfied(circuit, "commitment does not open"));
                }
                let found = searched_x
                    .iter()
                    .zip(searched_y.iter())
                    .filter(|(x, y)| **x != SENTINEL && **y != SENTINEL)
                    .any(|(x, y)| *x == secret.x && *y == secret.y);
                if found {
                    return Err(EngineError::unsatisfied(circuit, "position is among the searched tiles"));
                }

                Ok(SearchPublicInputs {
                    commitment: *commitment,
                    searched_x: *searched_x,
                    searched_y: *searched_y,
                }
                .encode())
            }
        }
    }
}

#[async_trait]
impl ProofEngine for DevProofEngine {
    async fn execute(&self, inputs: &CircuitInputs) -> Result<Vec<[u8; 32]>, EngineError> {
        if let CircuitInputs::Commitment { secret } = inputs {
            return Ok(vec![secret.commitment().0]);
        }
        let public = self.public_section(inputs)?;
        Ok(split_fields(&public))
    }

    async fn prove(&self, inputs: &CircuitInputs) -> Result<ProofOutput, EngineError> {
        let circuit = inputs.circuit();
        if circuit == Circuit::Commitment {
            return Err(EngineError::Unsupported(circuit.name()));
        }
        let mut proof = self.public_section(inputs)?;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let public_inputs = split_fields(&proof);
        let tag = self.key.attest(circuit, &proof);
        proof.extend_from_slice(&tag);

        Ok(ProofOutput {
            proof,
            public_inputs,
        })
    }
}

fn split_fields(public_section: &[u8]) -> Vec<[u8; 32]> {
    public_section[HEADER_BYTES..]
        .chunks_exact(FIELD_BYTES)
        .map(|chunk| {
            let mut field = [0u8; 32];
            field.copy_from_slice(chunk);
            field
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkhunt_game::{pad_searched, Commitment, DevVerifier, Position, PreySecret, ProofVerifier};

    fn engine() -> (DevProofEngine, DevVerifier) {
        let key = DevKey::random();
        (DevProofEngine::new(key.clone()), DevVerifier::new(key))
    }

    fn jungle_move(old: &PreySecret, new: &PreySecret, map_id: u8) -> CircuitInputs {
        CircuitInputs::JungleMove {
            old_commitment: old.commitment(),
            new_commitment: new.commitment(),
            map_id,
            old: old.clone(),
            new: new.clone(),
        }
    }

    fn search(secret: &PreySecret, xs: &[u8], ys: &[u8]) -> CircuitInputs {
        CircuitInputs::SearchResponse {
            commitment: secret.commitment(),
            searched_x: pad_searched(xs).unwrap(),
            searched_y: pad_searched(ys).unwrap(),
            secret: secret.clone(),
        }
    }

    #[tokio::test]
    async fn test_execute_commitment() {
        let (engine, _) = engine();
        let secret = PreySecret::new(Position::new(2, 5), 77);
        let out = engine
            .execute(&CircuitInputs::Commitment {
                secret: secret.clone(),
            })
            .await
            .unwrap();
        assert_eq!(out, vec![secret.commitment().0]);
    }

    #[tokio::test]
    async fn test_move_proof_verifies() {
        let (engine, verifier) = engine();
        // Map 0: (0,3) plains, (0,4) jungle.
        let old = PreySecret::new(Position::new(0, 3), 1);
        let new = PreySecret::new(Position::new(0, 4), 2);

        let out = engine.prove(&jungle_move(&old, &new, 0)).await.unwrap();
        assert_eq!(out.proof.len(), HEADER_BYTES + 3 * FIELD_BYTES + 32);
        assert_eq!(out.public_inputs[1], new.commitment().0);
        assert!(verifier.verify(Circuit::JungleMove, &out.proof));
    }

    #[tokio::test]
    async fn test_move_constraints() {
        let (engine, _) = engine();
        let old = PreySecret::new(Position::new(0, 3), 1);

        let plains = PreySecret::new(Position::new(0, 3), 2);
        let far = PreySecret::new(Position::new(1, 5), 2);
        let jungle = PreySecret::new(Position::new(0, 4), 2);

        for bad in [jungle_move(&old, &plains, 0), jungle_move(&old, &far, 0)] {
            assert!(matches!(
                engine.prove(&bad).await,
                Err(EngineError::Unsatisfied { .. })
            ));
        }

        let mut forged = jungle_move(&old, &jungle, 0);
        if let CircuitInputs::JungleMove { old_commitment, .. } = &mut forged {
            *old_commitment = Commitment::ZERO;
        }
        assert!(engine.prove(&forged).await.is_err());
        assert!(engine.prove(&jungle_move(&old, &jungle, 42)).await.is_err());
    }

    #[tokio::test]
    async fn test_search_response() {
        let (engine, verifier) = engine();
        let secret = PreySecret::new(Position::new(0, 4), 9);

        let out = engine
            .prove(&search(&secret, &[1, 1, 1], &[3, 2, 4]))
            .await
            .unwrap();
        assert_eq!(out.proof.len(), 612 + 32);
        assert!(verifier.verify(Circuit::SearchResponse, &out.proof));

        // Any searched slot equal to the true position must fail.
        let exposed = engine.prove(&search(&secret, &[1, 0, 1], &[3, 4, 4])).await;
        assert!(matches!(exposed, Err(EngineError::Unsatisfied { .. })));

        // Same x in one slot and same y in another is not a hit.
        assert!(engine.prove(&search(&secret, &[0, 1], &[3, 4])).await.is_ok());
    }

    #[tokio::test]
    async fn test_commitment_circuit_is_execute_only() {
        let (engine, _) = engine();
        let inputs = CircuitInputs::Commitment {
            secret: PreySecret::new(Position::new(0, 0), 0),
        };
        assert_eq!(
            engine.prove(&inputs).await,
            Err(EngineError::Unsupported("commitment"))
        );
    }
}
