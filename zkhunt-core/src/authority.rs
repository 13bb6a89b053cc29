//! The authority boundary: submit an operation, read public state.
//!
//! Transport only. Implementations neither retry nor queue.

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use zkhunt_game::{Commitment, Game, GameStateMachine, PlayerId};

/// One party's signed view of the authority.
#[async_trait]
pub trait AuthorityClient: Send + Sync {
    /// Identity every operation is submitted as.
    fn player(&self) -> &PlayerId;

    async fn create_game(&self) -> Result<u32>;
    async fn join_game(&self, session_id: u32) -> Result<()>;

    async fn hunter_move(&self, session_id: u32, x: u32, y: u32) -> Result<()>;
    async fn hunter_search(&self, session_id: u32, x: u32, y: u32) -> Result<()>;
    async fn hunter_power_search(&self, session_id: u32) -> Result<()>;
    async fn hunter_emp(&self, session_id: u32) -> Result<()>;

    async fn prey_move_public(&self, session_id: u32, x: u32, y: u32) -> Result<()>;
    async fn prey_dash_public(&self, session_id: u32, x: u32, y: u32) -> Result<()>;
    async fn prey_enter_jungle(
        &self,
        session_id: u32,
        new_commitment: Commitment,
        proof: Vec<u8>,
    ) -> Result<()>;
    async fn prey_move_jungle(
        &self,
        session_id: u32,
        new_commitment: Commitment,
        proof: Vec<u8>,
    ) -> Result<()>;
    async fn prey_exit_jungle(&self, session_id: u32, x: u32, y: u32) -> Result<()>;
    async fn prey_pass_frozen(&self, session_id: u32) -> Result<()>;

    /// An empty proof concedes the search.
    async fn respond_search(&self, session_id: u32, proof: Vec<u8>) -> Result<()>;
    async fn claim_catch(&self, session_id: u32) -> Result<PlayerId>;

    async fn get_game(&self, session_id: u32) -> Result<Game>;
}

pub type SharedMachine = Arc<Mutex<GameStateMachine>>;

/// In-process authority: calls straight into a shared state machine as a
/// fixed player.
#[derive(Clone)]
pub struct LocalAuthority {
    machine: SharedMachine,
    player: PlayerId,
}

impl LocalAuthority {
    pub fn new(machine: SharedMachine, player: PlayerId) -> Self {
        Self { machine, player }
    }

    pub fn shared(machine: GameStateMachine) -> SharedMachine {
        Arc::new(Mutex::new(machine))
    }
}

#[async_trait]
impl AuthorityClient for LocalAuthority {
    fn player(&self) -> &PlayerId {
        &self.player
    }

    async fn create_game(&self) -> Result<u32> {
        Ok(self.machine.lock().create_game(&self.player)?)
    }

    async fn join_game(&self, session_id: u32) -> Result<()> {
        Ok(self.machine.lock().join_game(session_id, &self.player)?)
    }

    async fn hunter_move(&self, session_id: u32, x: u32, y: u32) -> Result<()> {
        Ok(self.machine.lock().hunter_move(session_id, &self.player, x, y)?)
    }

    async fn hunter_search(&self, session_id: u32, x: u32, y: u32) -> Result<()> {
        Ok(self.machine.lock().hunter_search(session_id, &self.player, x, y)?)
    }

    async fn hunter_power_search(&self, session_id: u32) -> Result<()> {
        Ok(self.machine.lock().hunter_power_search(session_id, &self.player)?)
    }

    async fn hunter_emp(&self, session_id: u32) -> Result<()> {
        Ok(self.machine.lock().hunter_emp(session_id, &self.player)?)
    }

    async fn prey_move_public(&self, session_id: u32, x: u32, y: u32) -> Result<()> {
        Ok(self.machine.lock().prey_move_public(session_id, &self.player, x, y)?)
    }

    async fn prey_dash_public(&self, session_id: u32, x: u32, y: u32) -> Result<()> {
        Ok(self.machine.lock().prey_dash_public(session_id, &self.player, x, y)?)
    }

    async fn prey_enter_jungle(
        &self,
        session_id: u32,
        new_commitment: Commitment,
        proof: Vec<u8>,
    ) -> Result<()> {
        Ok(self
            .machine
            .lock()
            .prey_enter_jungle(session_id, &self.player, new_commitment, &proof)?)
    }

    async fn prey_move_jungle(
        &self,
        session_id: u32,
        new_commitment: Commitment,
        proof: Vec<u8>,
    ) -> Result<()> {
        Ok(self
            .machine
            .lock()
            .prey_move_jungle(session_id, &self.player, new_commitment, &proof)?)
    }

    async fn prey_exit_jungle(&self, session_id: u32, x: u32, y: u32) -> Result<()> {
        Ok(self.machine.lock().prey_exit_jungle(session_id, &self.player, x, y)?)
    }

    async fn prey_pass_frozen(&self, session_id: u32) -> Result<()> {
        Ok(self.machine.lock().prey_pass_frozen(session_id, &self.player)?)
    }

    async fn respond_search(&self, session_id: u32, proof: Vec<u8>) -> Result<()> {
        Ok(self
            .machine
            .lock()
            .respond_search(session_id, &self.player, &proof)?)
    }

    async fn claim_catch(&self, session_id: u32) -> Result<PlayerId> {
        Ok(self.machine.lock().claim_catch(session_id, &self.player)?)
    }

    async fn get_game(&self, session_id: u32) -> Result<Game> {
        Ok(self.machine.lock().get_game(session_id)?)
    }
}
