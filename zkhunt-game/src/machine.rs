//! The authoritative session registry and phase machine.
//!
//! Every operation runs against a copy of the session and is written back only
//! on success, so a rejected call never leaves a partial mutation behind.

use crate::board::{Board, Position, MAP_COUNT};
use crate::commitment::Commitment;
use crate::error::{HuntError, Result};
use crate::game::{Game, GamePhase, PlayerId, RulesConfig};
use crate::proof::{Circuit, MovePublicInputs, ProofVerifier, SearchPublicInputs};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

/// Map and spawn points for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundLayout {
    pub map_index: u8,
    pub hunter: Position,
    pub prey: Position,
}

/// Chooses the map and spawn points at the start of each round.
pub trait SpawnPolicy: Send {
    fn layout(&mut self, round: u32) -> Result<RoundLayout>;
}

/// Uniform map choice, then a random pair of distinct plains tiles at least
/// `min_distance` apart (Manhattan).
pub struct RandomSpawn {
    rng: StdRng,
    min_distance: u8,
}

impl RandomSpawn {
    pub fn new(min_distance: u8) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            min_distance,
        }
    }

    pub fn seeded(seed: u64, min_distance: u8) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min_distance,
        }
    }
}

impl SpawnPolicy for RandomSpawn {
    fn layout(&mut self, _round: u32) -> Result<RoundLayout> {
        let map_index = self.rng.gen_range(0..MAP_COUNT) as u8;
        let board = Board::from_index(map_index);
        let plains: Vec<Position> = board.plains().collect();

        let pairs: Vec<(Position, Position)> = plains
            .iter()
            .flat_map(|a| plains.iter().map(move |b| (*a, *b)))
            .filter(|(a, b)| a != b && a.manhattan(b) >= self.min_distance)
            .collect();
        if pairs.is_empty() {
            return Err(HuntError::InvalidRules);
        }

        let (hunter, prey) = pairs[self.rng.gen_range(0..pairs.len())];
        Ok(RoundLayout {
            map_index,
            hunter,
            prey,
        })
    }
}

/// Replays a fixed list of layouts, one per round, wrapping around.
#[derive(Debug, Clone)]
pub struct FixedSpawn {
    layouts: Vec<RoundLayout>,
}

impl FixedSpawn {
    pub fn new(layouts: Vec<RoundLayout>) -> Self {
        Self { layouts }
    }
}

impl SpawnPolicy for FixedSpawn {
    fn layout(&mut self, round: u32) -> Result<RoundLayout> {
        if self.layouts.is_empty() {
            return Err(HuntError::InvalidRules);
        }
        let index = (round.saturating_sub(1) as usize) % self.layouts.len();
        let layout = self.layouts[index];
        if layout.hunter == layout.prey
            || !layout.hunter.in_bounds()
            || !layout.prey.in_bounds()
            || Board::get(layout.map_index).is_none()
        {
            return Err(HuntError::InvalidRules);
        }
        Ok(layout)
    }
}

pub struct GameStateMachine {
    rules: RulesConfig,
    spawn: Box<dyn SpawnPolicy>,
    verifier: Arc<dyn ProofVerifier>,
    games: HashMap<u32, Game>,
    next_session_id: u32,
}

impl GameStateMachine {
    pub fn new(rules: RulesConfig, verifier: Arc<dyn ProofVerifier>) -> Result<Self> {
        let spawn = Box::new(RandomSpawn::new(rules.min_spawn_distance));
        Self::with_spawn(rules, verifier, spawn)
    }

    pub fn with_spawn(
        rules: RulesConfig,
        verifier: Arc<dyn ProofVerifier>,
        spawn: Box<dyn SpawnPolicy>,
    ) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            rules,
            spawn,
            verifier,
            games: HashMap::new(),
            next_session_id: 1,
        })
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn session_count(&self) -> usize {
        self.games.len()
    }

    /// Open a session with the caller as the first hunter.
    pub fn create_game(&mut self, hunter: &PlayerId) -> Result<u32> {
        let layout = self.spawn.layout(1)?;
        let session_id = self.next_session_id;

        let game = Game {
            phase: GamePhase::WaitingForPlayer2,
            player1: hunter.clone(),
            player2: None,
            hunter: hunter.clone(),
            prey: None,
            hunter_x: layout.hunter.x,
            hunter_y: layout.hunter.y,
            prey_x: layout.prey.x,
            prey_y: layout.prey.y,
            prey_commitment: Commitment::ZERO,
            prey_is_hidden: false,
            prey_is_frozen: false,
            prey_dash_remaining: self.rules.prey_dashes,
            power_searches_remaining: self.rules.power_searches,
            emp_uses_remaining: self.rules.emp_uses,
            searched_tiles_x: Vec::new(),
            searched_tiles_y: Vec::new(),
            search_deadline: None,
            round: 1,
            turn_number: 0,
            total_rounds: self.rules.total_rounds(),
            player1_score: 0,
            player2_score: 0,
            winner: None,
            map_index: layout.map_index,
        };

        self.games.insert(session_id, game);
        self.next_session_id += 1;

        tracing::info!(
            "Game {} created by {} on map {}",
            session_id,
            hunter,
            layout.map_index
        );
        Ok(session_id)
    }

    pub fn join_game(&mut self, session_id: u32, prey: &PlayerId) -> Result<()> {
        self.apply(session_id, |_, game| {
            if game.phase != GamePhase::WaitingForPlayer2 {
                return Err(HuntError::WrongPhase);
            }
            if game.player1 == *prey {
                return Err(HuntError::CannotJoinOwnGame);
            }

            game.player2 = Some(prey.clone());
            game.prey = Some(prey.clone());
            game.turn_number = 1;
            game.phase = GamePhase::HunterTurn;

            tracing::info!("{} joined game {} as prey", prey, session_id);
            Ok(())
        })
    }

    /// Step the hunter to an orthogonal neighbour (or stay put). Landing on
    /// the visible prey wins the round.
    pub fn hunter_move(&mut self, session_id: u32, caller: &PlayerId, x: u32, y: u32) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::HunterTurn)?;
            require_hunter(game, caller)?;
            let target = Position::checked(x, y).ok_or(HuntError::OutOfBounds)?;
            if !target.is_step_from(&game.hunter_position()) {
                return Err(HuntError::InvalidMove);
            }

            game.hunter_x = target.x;
            game.hunter_y = target.y;

            if game.visible_prey_position() == Some(target) {
                tracing::info!("Game {}: hunter caught the prey at {}", session_id, target);
                return machine.end_round(session_id, game, true);
            }

            game.phase = GamePhase::PreyTurn;
            Ok(())
        })
    }

    /// Search a single jungle tile within one step (diagonals included).
    pub fn hunter_search(&mut self, session_id: u32, caller: &PlayerId, x: u32, y: u32) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::HunterTurn)?;
            require_hunter(game, caller)?;
            if !game.prey_is_hidden {
                return Err(HuntError::PreyNotHidden);
            }
            let target = Position::checked(x, y).ok_or(HuntError::OutOfBounds)?;
            if target.chebyshev(&game.hunter_position()) > 1 {
                return Err(HuntError::InvalidMove);
            }
            if !game.board().is_jungle(target) {
                return Err(HuntError::NotJungle);
            }

            machine.open_search(session_id, game, vec![target])
        })
    }

    /// Search every jungle tile in the hunter's 3x3 neighbourhood at once.
    pub fn hunter_power_search(&mut self, session_id: u32, caller: &PlayerId) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::HunterTurn)?;
            require_hunter(game, caller)?;
            if !game.prey_is_hidden {
                return Err(HuntError::PreyNotHidden);
            }
            if game.power_searches_remaining == 0 {
                return Err(HuntError::NoPowerSearches);
            }
            let area = game.board().search_area(game.hunter_position());
            if area.is_empty() {
                return Err(HuntError::NotAdjacentJungle);
            }

            game.power_searches_remaining -= 1;
            machine.open_search(session_id, game, area)
        })
    }

    /// Freeze the visible prey for its next turn. The hunter keeps the turn.
    pub fn hunter_emp(&mut self, session_id: u32, caller: &PlayerId) -> Result<()> {
        self.apply(session_id, |_, game| {
            require_phase(game, GamePhase::HunterTurn)?;
            require_hunter(game, caller)?;
            if game.emp_uses_remaining == 0 {
                return Err(HuntError::NoEmp);
            }
            if game.prey_is_hidden {
                return Err(HuntError::EmpTargetHidden);
            }

            game.prey_is_frozen = true;
            game.emp_uses_remaining -= 1;
            tracing::info!("Game {}: prey frozen by EMP", session_id);
            Ok(())
        })
    }

    pub fn prey_move_public(&mut self, session_id: u32, caller: &PlayerId, x: u32, y: u32) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_acting_prey(game, caller)?;
            if game.prey_is_hidden {
                return Err(HuntError::PreyAlreadyHidden);
            }
            let target = Position::checked(x, y).ok_or(HuntError::OutOfBounds)?;
            if game.board().is_jungle(target) {
                return Err(HuntError::IsJungle);
            }
            if !target.is_step_from(&game.last_known_prey_position()) {
                return Err(HuntError::InvalidMove);
            }

            game.prey_x = target.x;
            game.prey_y = target.y;
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Up to two tiles (Manhattan) across plains, limited per round.
    pub fn prey_dash_public(&mut self, session_id: u32, caller: &PlayerId, x: u32, y: u32) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_acting_prey(game, caller)?;
            if game.prey_is_hidden {
                return Err(HuntError::PreyAlreadyHidden);
            }
            if game.prey_dash_remaining == 0 {
                return Err(HuntError::NoDashes);
            }
            let target = Position::checked(x, y).ok_or(HuntError::OutOfBounds)?;
            let board = game.board();
            if board.is_jungle(target) {
                return Err(HuntError::IsJungle);
            }
            let from = game.last_known_prey_position();
            if !board.is_plains(from) || target.manhattan(&from) > 2 {
                return Err(HuntError::InvalidMove);
            }

            game.prey_dash_remaining -= 1;
            game.prey_x = target.x;
            game.prey_y = target.y;
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Go into hiding. The proof's new commitment must match the argument
    /// and its map id the session's map.
    pub fn prey_enter_jungle(
        &mut self,
        session_id: u32,
        caller: &PlayerId,
        new_commitment: Commitment,
        proof: &[u8],
    ) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_acting_prey(game, caller)?;
            if game.prey_is_hidden {
                return Err(HuntError::PreyAlreadyHidden);
            }
            let inputs = MovePublicInputs::decode(proof).map_err(|_| HuntError::ProofFailed)?;
            if inputs.new_commitment != new_commitment || inputs.map_id != game.map_index {
                return Err(HuntError::ProofFailed);
            }
            machine.verify(Circuit::JungleMove, proof)?;

            game.prey_commitment = new_commitment;
            game.prey_is_hidden = true;
            tracing::info!(
                "Game {}: prey entered the jungle ({})",
                session_id,
                new_commitment.short()
            );
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Hidden-to-hidden move; the proof must chain from the stored commitment.
    pub fn prey_move_jungle(
        &mut self,
        session_id: u32,
        caller: &PlayerId,
        new_commitment: Commitment,
        proof: &[u8],
    ) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_acting_prey(game, caller)?;
            if !game.prey_is_hidden {
                return Err(HuntError::PreyNotHidden);
            }
            let inputs = MovePublicInputs::decode(proof).map_err(|_| HuntError::ProofFailed)?;
            if inputs.old_commitment != game.prey_commitment
                || inputs.new_commitment != new_commitment
                || inputs.map_id != game.map_index
            {
                return Err(HuntError::ProofFailed);
            }
            machine.verify(Circuit::JungleMove, proof)?;

            game.prey_commitment = new_commitment;
            tracing::debug!(
                "Game {}: prey moved in the jungle ({})",
                session_id,
                new_commitment.short()
            );
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Reveal the prey on a plains tile. Adjacency to the hidden position
    /// cannot be checked here; clients enforce it.
    pub fn prey_exit_jungle(&mut self, session_id: u32, caller: &PlayerId, x: u32, y: u32) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_acting_prey(game, caller)?;
            if !game.prey_is_hidden {
                return Err(HuntError::PreyNotHidden);
            }
            let target = Position::checked(x, y).ok_or(HuntError::OutOfBounds)?;
            if game.board().is_jungle(target) {
                return Err(HuntError::IsJungle);
            }

            game.prey_x = target.x;
            game.prey_y = target.y;
            game.prey_is_hidden = false;
            game.prey_commitment = Commitment::ZERO;
            tracing::info!("Game {}: prey left the jungle at {}", session_id, target);
            machine.complete_prey_turn(session_id, game)
        })
    }

    pub fn prey_pass_frozen(&mut self, session_id: u32, caller: &PlayerId) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::PreyTurn)?;
            require_prey(game, caller)?;
            if !game.prey_is_frozen {
                return Err(HuntError::WrongPhase);
            }

            game.prey_is_frozen = false;
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Answer a pending search. An empty proof concedes the round to the
    /// hunter; otherwise the proof must bind the stored commitment and the
    /// padded searched tiles exactly.
    pub fn respond_search(&mut self, session_id: u32, caller: &PlayerId, proof: &[u8]) -> Result<()> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::SearchPending)?;
            require_prey(game, caller)?;

            if proof.is_empty() {
                tracing::info!("Game {}: prey conceded the search", session_id);
                return machine.end_round(session_id, game, true);
            }

            let inputs = SearchPublicInputs::decode(proof).map_err(|_| HuntError::ProofFailed)?;
            let (searched_x, searched_y) = game.padded_search().map_err(|_| HuntError::ProofFailed)?;
            if inputs.commitment != game.prey_commitment
                || inputs.searched_x != searched_x
                || inputs.searched_y != searched_y
            {
                return Err(HuntError::ProofFailed);
            }
            machine.verify(Circuit::SearchResponse, proof)?;

            clear_search(game);
            tracing::info!("Game {}: prey proved it was not found", session_id);
            machine.complete_prey_turn(session_id, game)
        })
    }

    /// Award the round to the hunter once the response window has lapsed.
    /// Returns the player who scored.
    pub fn claim_catch(&mut self, session_id: u32, caller: &PlayerId) -> Result<PlayerId> {
        self.claim_catch_at(session_id, caller, Utc::now())
    }

    pub fn claim_catch_at(
        &mut self,
        session_id: u32,
        caller: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<PlayerId> {
        self.apply(session_id, |machine, game| {
            require_phase(game, GamePhase::SearchPending)?;
            require_hunter(game, caller)?;
            if let Some(deadline) = game.search_deadline {
                if now < deadline {
                    return Err(HuntError::ResponseWindowOpen);
                }
            }

            let scorer = game.hunter.clone();
            tracing::info!("Game {}: {} claimed the catch", session_id, scorer);
            machine.end_round(session_id, game, true)?;
            Ok(scorer)
        })
    }

    pub fn get_game(&self, session_id: u32) -> Result<Game> {
        self.games
            .get(&session_id)
            .cloned()
            .ok_or(HuntError::GameNotFound)
    }

    fn apply<T>(
        &mut self,
        session_id: u32,
        op: impl FnOnce(&mut Self, &mut Game) -> Result<T>,
    ) -> Result<T> {
        let mut game = self.get_game(session_id)?;
        if game.is_over() {
            return Err(HuntError::GameAlreadyEnded);
        }

        let out = op(self, &mut game)?;
        self.games.insert(session_id, game);
        Ok(out)
    }

    fn verify(&self, circuit: Circuit, proof: &[u8]) -> Result<()> {
        if self.verifier.verify(circuit, proof) {
            Ok(())
        } else {
            Err(HuntError::ProofFailed)
        }
    }

    fn open_search(&self, session_id: u32, game: &mut Game, tiles: Vec<Position>) -> Result<()> {
        let window = chrono::Duration::from_std(self.rules.response_window)
            .map_err(|_| HuntError::InvalidRules)?;

        game.searched_tiles_x = tiles.iter().map(|p| p.x).collect();
        game.searched_tiles_y = tiles.iter().map(|p| p.y).collect();
        game.search_deadline = Some(Utc::now() + window);
        game.phase = GamePhase::SearchPending;

        tracing::info!("Game {}: hunter searched {} tile(s)", session_id, tiles.len());
        Ok(())
    }

    fn complete_prey_turn(&mut self, session_id: u32, game: &mut Game) -> Result<()> {
        game.turn_number += 1;
        if game.turn_number > self.rules.max_turns {
            tracing::info!("Game {}: prey survived round {}", session_id, game.round);
            return self.end_round(session_id, game, false);
        }
        game.phase = GamePhase::HunterTurn;
        Ok(())
    }

    fn end_round(&mut self, session_id: u32, game: &mut Game, hunter_won: bool) -> Result<()> {
        let prey = game.prey.clone().ok_or(HuntError::WrongPhase)?;
        let scorer = if hunter_won { game.hunter.clone() } else { prey.clone() };
        if scorer == game.player1 {
            game.player1_score += 1;
        } else {
            game.player2_score += 1;
        }
        clear_search(game);
        game.prey_is_frozen = false;

        if game.round >= game.total_rounds {
            game.winner = match game.player1_score.cmp(&game.player2_score) {
                std::cmp::Ordering::Greater => Some(game.player1.clone()),
                std::cmp::Ordering::Less => game.player2.clone(),
                std::cmp::Ordering::Equal => None,
            };
            game.phase = GamePhase::Ended;
            tracing::info!(
                "Game {} ended {}-{}, winner: {}",
                session_id,
                game.player1_score,
                game.player2_score,
                game.winner.as_ref().map_or("draw", |w| w.as_str())
            );
            return Ok(());
        }

        let layout = self.spawn.layout(game.round + 1)?;
        game.round += 1;
        game.prey = Some(game.hunter.clone());
        game.hunter = prey;
        game.map_index = layout.map_index;
        game.hunter_x = layout.hunter.x;
        game.hunter_y = layout.hunter.y;
        game.prey_x = layout.prey.x;
        game.prey_y = layout.prey.y;
        game.prey_is_hidden = false;
        game.prey_commitment = Commitment::ZERO;
        game.turn_number = 1;
        game.power_searches_remaining = self.rules.power_searches;
        game.emp_uses_remaining = self.rules.emp_uses;
        game.prey_dash_remaining = self.rules.prey_dashes;
        game.phase = GamePhase::HunterTurn;

        tracing::info!(
            "Game {}: round {} begins, {} hunts on map {}",
            session_id,
            game.round,
            game.hunter,
            game.map_index
        );
        Ok(())
    }
}

fn clear_search(game: &mut Game) {
    game.searched_tiles_x.clear();
    game.searched_tiles_y.clear();
    game.search_deadline = None;
}

fn require_phase(game: &Game, expected: GamePhase) -> Result<()> {
    if game.phase == expected {
        return Ok(());
    }
    if expected == GamePhase::HunterTurn && game.phase == GamePhase::SearchPending {
        return Err(HuntError::SearchPending);
    }
    Err(HuntError::WrongPhase)
}

fn require_hunter(game: &Game, caller: &PlayerId) -> Result<()> {
    if !game.is_player(caller) {
        return Err(HuntError::NotPlayer);
    }
    if game.hunter != *caller {
        return Err(HuntError::NotHunter);
    }
    Ok(())
}

fn require_prey(game: &Game, caller: &PlayerId) -> Result<()> {
    if !game.is_player(caller) {
        return Err(HuntError::NotPlayer);
    }
    if game.prey.as_ref() != Some(caller) {
        return Err(HuntError::NotPrey);
    }
    Ok(())
}

/// Phase, role and freeze checks shared by the prey's movement operations.
fn require_acting_prey(game: &Game, caller: &PlayerId) -> Result<()> {
    require_phase(game, GamePhase::PreyTurn)?;
    require_prey(game, caller)?;
    if game.prey_is_frozen {
        return Err(HuntError::PreyFrozen);
    }
    Ok(())
}
