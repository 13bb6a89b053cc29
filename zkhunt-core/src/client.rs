use crate::authority::AuthorityClient;
use crate::error::{ClientError, Result};
use crate::orchestrator::{ProofOrchestrator, SearchResponse};
use crate::storage::{SecretStore, StoredSecret};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zkhunt_game::{Game, GamePhase, PlayerId, Position, PreySecret, Role};

/// What a prey move turns into once checked against the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreyMove {
    Step,
    Dash,
    EnterJungle,
    JungleMove,
    ExitJungle,
}

impl PreyMove {
    /// Whether the move needs a proof.
    pub fn is_hidden(&self) -> bool {
        matches!(self, PreyMove::EnterJungle | PreyMove::JungleMove)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchOutcome {
    Proved,
    Conceded,
}

/// Classify a prey move from `from` (public or secret position) to `target`.
pub fn plan_prey_move(game: &Game, from: Position, target: Position) -> Result<PreyMove> {
    if !target.in_bounds() {
        return Err(ClientError::illegal("target is off the board"));
    }
    let board = game.board();

    if game.prey_is_hidden {
        if !target.is_step_from(&from) {
            return Err(ClientError::illegal("hidden moves are a single step"));
        }
        return Ok(if board.is_jungle(target) {
            PreyMove::JungleMove
        } else {
            PreyMove::ExitJungle
        });
    }

    if board.is_jungle(target) {
        if target != from && target.is_step_from(&from) {
            return Ok(PreyMove::EnterJungle);
        }
        return Err(ClientError::illegal("jungle must be entered from an adjacent tile"));
    }
    if target.is_step_from(&from) {
        return Ok(PreyMove::Step);
    }
    if target.manhattan(&from) <= 2 && board.is_plains(from) {
        if game.prey_dash_remaining == 0 {
            return Err(ClientError::illegal("no dashes left this round"));
        }
        return Ok(PreyMove::Dash);
    }
    Err(ClientError::illegal("target is out of reach"))
}

/// Clears the session's in-flight flag on every exit path.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>, session_id: u32) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::Busy(session_id))?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One party's handle on one session.
///
/// Every action re-reads public state, validates locally, submits, and
/// re-reads again. At most one action runs at a time.
pub struct PlayerClient {
    session_id: u32,
    authority: Arc<dyn AuthorityClient>,
    orchestrator: ProofOrchestrator,
    secrets: Arc<dyn SecretStore>,
    busy: Arc<AtomicBool>,
    secret_lock: tokio::sync::Mutex<()>,
    last: RwLock<Option<Game>>,
}

impl PlayerClient {
    pub fn new(
        session_id: u32,
        authority: Arc<dyn AuthorityClient>,
        orchestrator: ProofOrchestrator,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            session_id,
            authority,
            orchestrator,
            secrets,
            busy: Arc::new(AtomicBool::new(false)),
            secret_lock: tokio::sync::Mutex::new(()),
            last: RwLock::new(None),
        }
    }

    /// Open a new session as its first hunter.
    pub async fn create(
        authority: Arc<dyn AuthorityClient>,
        orchestrator: ProofOrchestrator,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        let session_id = authority.create_game().await?;
        tracing::info!("{} created session {}", authority.player(), session_id);
        let client = Self::new(session_id, authority, orchestrator, secrets);
        client.refresh().await?;
        Ok(client)
    }

    pub async fn join(
        session_id: u32,
        authority: Arc<dyn AuthorityClient>,
        orchestrator: ProofOrchestrator,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        authority.join_game(session_id).await?;
        tracing::info!("{} joined session {}", authority.player(), session_id);
        let client = Self::new(session_id, authority, orchestrator, secrets);
        client.refresh().await?;
        Ok(client)
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn player(&self) -> &PlayerId {
        self.authority.player()
    }

    pub fn secrets(&self) -> &Arc<dyn SecretStore> {
        &self.secrets
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The most recently polled snapshot.
    pub fn last_game(&self) -> Option<Game> {
        self.last.read().clone()
    }

    pub async fn refresh(&self) -> Result<Game> {
        let game = self.authority.get_game(self.session_id).await?;
        *self.last.write() = Some(game.clone());
        Ok(game)
    }

    pub async fn hunter_move(&self, target: Position) -> Result<Game> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Hunter, GamePhase::HunterTurn).await?;
        if !target.in_bounds() || !target.is_step_from(&game.hunter_position()) {
            return Err(ClientError::illegal("hunter moves one orthogonal step"));
        }

        tracing::debug!("Session {}: hunter moves to {}", self.session_id, target);
        self.authority
            .hunter_move(self.session_id, target.x.into(), target.y.into())
            .await?;
        self.refresh().await
    }

    pub async fn hunter_search(&self, target: Position) -> Result<Game> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Hunter, GamePhase::HunterTurn).await?;
        if !game.prey_is_hidden {
            return Err(ClientError::illegal("prey is visible"));
        }
        if !target.in_bounds() || target.chebyshev(&game.hunter_position()) > 1 {
            return Err(ClientError::illegal("search target must be next to the hunter"));
        }
        if !game.board().is_jungle(target) {
            return Err(ClientError::illegal("only jungle tiles can be searched"));
        }

        tracing::debug!("Session {}: hunter searches {}", self.session_id, target);
        self.authority
            .hunter_search(self.session_id, target.x.into(), target.y.into())
            .await?;
        self.refresh().await
    }

    pub async fn hunter_power_search(&self) -> Result<Game> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Hunter, GamePhase::HunterTurn).await?;
        if !game.prey_is_hidden {
            return Err(ClientError::illegal("prey is visible"));
        }
        if game.power_searches_remaining == 0 {
            return Err(ClientError::illegal("no power searches left this round"));
        }
        if game.board().search_area(game.hunter_position()).is_empty() {
            return Err(ClientError::illegal("no jungle around the hunter"));
        }

        self.authority.hunter_power_search(self.session_id).await?;
        self.refresh().await
    }

    pub async fn hunter_emp(&self) -> Result<Game> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Hunter, GamePhase::HunterTurn).await?;
        if game.emp_uses_remaining == 0 {
            return Err(ClientError::illegal("no EMP charges left this round"));
        }
        if game.prey_is_hidden {
            return Err(ClientError::illegal("EMP needs a visible prey"));
        }

        self.authority.hunter_emp(self.session_id).await?;
        self.refresh().await
    }

    /// Claim the round once the prey has let the response window lapse.
    pub async fn claim_catch(&self) -> Result<PlayerId> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Hunter, GamePhase::SearchPending).await?;
        if game.search_deadline.is_some_and(|deadline| Utc::now() < deadline) {
            return Err(ClientError::illegal("the prey's response window is still open"));
        }

        let scorer = self.authority.claim_catch(self.session_id).await?;
        self.refresh().await?;
        Ok(scorer)
    }

    /// Move the prey to `target`, choosing the public or proven path.
    pub async fn prey_move(&self, target: Position) -> Result<PreyMove> {
        let _busy = self.begin()?;
        let _secret = self.secret_lock.lock().await;
        let game = self.my_turn(Role::Prey, GamePhase::PreyTurn).await?;
        if game.prey_is_frozen {
            return Err(ClientError::illegal("frozen; pass this turn"));
        }

        let stored = self.secrets.load(self.session_id).await?;
        let from = match (game.visible_prey_position(), &stored) {
            (Some(public), _) => public,
            (None, Some(record)) => record.secret.position(),
            (None, None) => return Err(ClientError::SecretMissing(self.session_id)),
        };
        let kind = plan_prey_move(&game, from, target)?;
        tracing::debug!("Session {}: prey {:?}", self.session_id, kind);

        let (sid, x, y) = (self.session_id, u32::from(target.x), u32::from(target.y));
        let next = match kind {
            PreyMove::Step => {
                self.authority.prey_move_public(sid, x, y).await?;
                PreySecret::fresh(target)
            }
            PreyMove::Dash => {
                self.authority.prey_dash_public(sid, x, y).await?;
                PreySecret::fresh(target)
            }
            PreyMove::ExitJungle => {
                self.authority.prey_exit_jungle(sid, x, y).await?;
                PreySecret::fresh(target)
            }
            PreyMove::EnterJungle => {
                let old = stored
                    .map(|record| record.secret)
                    .filter(|secret| secret.position() == from)
                    .unwrap_or_else(|| PreySecret::fresh(from));
                let proof = self
                    .orchestrator
                    .move_proof(&old, &PreySecret::fresh(target), game.map_index)
                    .await?;
                self.authority
                    .prey_enter_jungle(sid, proof.new_commitment, proof.proof)
                    .await?;
                proof.secret
            }
            PreyMove::JungleMove => {
                let old = stored
                    .map(|record| record.secret)
                    .ok_or(ClientError::SecretMissing(sid))?;
                if old.commitment() != game.prey_commitment {
                    return Err(ClientError::SecretMismatch);
                }
                let proof = self
                    .orchestrator
                    .move_proof(&old, &PreySecret::fresh(target), game.map_index)
                    .await?;
                self.authority
                    .prey_move_jungle(sid, proof.new_commitment, proof.proof)
                    .await?;
                proof.secret
            }
        };

        if let Err(e) = self
            .secrets
            .save(sid, &StoredSecret::new(game.round, next))
            .await
        {
            tracing::error!("Session {}: move accepted but secret not saved: {}", sid, e);
            return Err(e);
        }
        self.refresh().await?;
        Ok(kind)
    }

    pub async fn prey_pass_frozen(&self) -> Result<Game> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Prey, GamePhase::PreyTurn).await?;
        if !game.prey_is_frozen {
            return Err(ClientError::illegal("prey is not frozen"));
        }

        self.authority.prey_pass_frozen(self.session_id).await?;
        self.refresh().await
    }

    /// Prove non-presence for the pending search, or concede if the prey's
    /// tile was searched or its secret can no longer open the commitment.
    pub async fn respond_to_search(&self) -> Result<SearchOutcome> {
        let _busy = self.begin()?;
        let game = self.my_turn(Role::Prey, GamePhase::SearchPending).await?;
        let stored = self
            .secrets
            .load(self.session_id)
            .await?
            .ok_or(ClientError::SecretMissing(self.session_id));

        let attempt = match stored {
            Ok(record) => self.orchestrator.search_response(&record.secret, &game).await,
            Err(e) => Err(e),
        };
        let response = match attempt {
            Err(e @ (ClientError::SecretMissing(_) | ClientError::SecretMismatch)) => {
                tracing::error!("Session {}: conceding search: {}", self.session_id, e);
                SearchResponse::Exposed
            }
            other => other?,
        };
        let outcome = match response {
            SearchResponse::Proof(_) => SearchOutcome::Proved,
            SearchResponse::Exposed => SearchOutcome::Conceded,
        };

        self.authority
            .respond_search(self.session_id, response.into_submission())
            .await?;
        tracing::info!("Session {}: search answered ({:?})", self.session_id, outcome);
        self.refresh().await?;
        Ok(outcome)
    }

    /// Serializes prey moves against secret reconciliation; `None` while a
    /// prey move holds it.
    pub(crate) fn try_lock_secret(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.secret_lock.try_lock().ok()
    }

    fn begin(&self) -> Result<BusyGuard> {
        BusyGuard::acquire(&self.busy, self.session_id)
    }

    async fn my_turn(&self, role: Role, phase: GamePhase) -> Result<Game> {
        let game = self.refresh().await?;
        if game.role_of(self.player()) != Some(role) || game.phase != phase {
            return Err(ClientError::NotYourTurn);
        }
        Ok(game)
    }
}
