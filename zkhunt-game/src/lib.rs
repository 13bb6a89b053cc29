//! ZK Hunt rules engine
//!
//! A two-player pursuit game where the prey can hide in jungle tiles behind a
//! position commitment. This crate holds everything both sides agree on: the
//! map pool, the commitment scheme, the public `Game` record, the proof wire
//! layout and the authoritative phase machine.

pub mod board;
pub mod commitment;
pub mod error;
pub mod game;
pub mod machine;
pub mod proof;

pub use board::{Board, Position, Terrain, GRID_SIZE, MAP_COUNT};
pub use commitment::{commit, generate_nonce, Commitment, CommitmentScheme, PreySecret};
pub use error::{HuntError, Result};
pub use game::{Game, GamePhase, PlayerId, Role, RulesConfig};
pub use machine::{FixedSpawn, GameStateMachine, RandomSpawn, RoundLayout, SpawnPolicy};
pub use proof::{
    pad_searched, Circuit, DevKey, DevVerifier, MovePublicInputs, ProofVerifier,
    SearchPublicInputs, WireError, SEARCH_SLOTS, SENTINEL,
};
