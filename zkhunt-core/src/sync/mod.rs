//! Polling loop that keeps a client's view and its prey secret in line with
//! the authority, and answers searches and freezes without user input.

use crate::client::{PlayerClient, SearchOutcome};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::storage::StoredSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use zkhunt_game::{Commitment, Game, GamePhase, PlayerId, PreySecret, Role};

/// Fires once per occurrence of a condition.
///
/// An occurrence is identified by its key; the latch re-arms as soon as the
/// condition is observed false.
#[derive(Debug)]
pub struct EdgeLatch<K> {
    fired: Option<K>,
}

impl<K: PartialEq + Copy> EdgeLatch<K> {
    pub fn new() -> Self {
        Self { fired: None }
    }

    /// `occurrence` is `Some(key)` while the condition holds. Returns true
    /// the first time a key is seen unsuppressed.
    pub fn trigger(&mut self, occurrence: Option<K>, suppressed: bool) -> bool {
        match occurrence {
            None => {
                self.fired = None;
                false
            }
            Some(key) if suppressed || self.fired == Some(key) => false,
            Some(key) => {
                self.fired = Some(key);
                true
            }
        }
    }

    /// Allow the current occurrence to fire again.
    pub fn rearm(&mut self) {
        self.fired = None;
    }
}

impl<K: PartialEq + Copy> Default for EdgeLatch<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Work the synchronizer does on the player's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reaction {
    RespondSearch,
    PassFrozen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    RoundStarted {
        round: u32,
        role: Role,
    },
    PhaseChanged {
        from: GamePhase,
        to: GamePhase,
    },
    SearchAnswered(SearchOutcome),
    PassedFrozen,
    MatchEnded {
        winner: Option<PlayerId>,
        player1_score: u32,
        player2_score: u32,
    },
    /// A fresh secret was stored for the prey's public position.
    SecretRegenerated {
        round: u32,
    },
    SecretCleared,
    /// The stored secret does not open the hidden prey's commitment.
    SecretMismatch,
    /// The prey is hidden and nothing is stored for it.
    SecretLost,
    ReactionFailed {
        reaction: Reaction,
        error: String,
    },
    PollFailed(String),
}

pub struct Synchronizer {
    client: Arc<PlayerClient>,
    previous: Option<Game>,
    search_latch: EdgeLatch<(u32, u32)>,
    frozen_latch: EdgeLatch<(u32, u32)>,
    secret_fault: EdgeLatch<(u32, Commitment, bool)>,
}

impl Synchronizer {
    pub fn new(client: Arc<PlayerClient>) -> Self {
        Self {
            client,
            previous: None,
            search_latch: EdgeLatch::new(),
            frozen_latch: EdgeLatch::new(),
            secret_fault: EdgeLatch::new(),
        }
    }

    pub fn client(&self) -> &Arc<PlayerClient> {
        &self.client
    }

    /// Poll once and run any due reaction to completion.
    pub async fn step(&mut self) -> Result<Vec<SyncEvent>> {
        let (mut events, reactions) = self.observe().await?;

        for reaction in reactions {
            let result = run_reaction(&self.client, reaction).await;
            if lost_race(&result) {
                self.retry(reaction);
            }
            events.push(reaction_event(reaction, result));
        }
        Ok(events)
    }

    /// Poll at the configured interval; see [`Synchronizer::spawn`].
    pub fn spawn_with(
        self,
        config: &ClientConfig,
    ) -> (JoinHandle<()>, mpsc::UnboundedReceiver<SyncEvent>) {
        self.spawn(config.poll_interval)
    }

    /// Poll every `interval` until the match ends or the receiver is dropped.
    ///
    /// Reactions run on their own tasks so a slow proof never delays the
    /// next poll.
    pub fn spawn(mut self, interval: Duration) -> (JoinHandle<()>, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (retry_tx, mut retry_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                while let Ok(reaction) = retry_rx.try_recv() {
                    self.retry(reaction);
                }

                let (events, reactions) = match self.observe().await {
                    Ok(observed) => observed,
                    Err(e) => {
                        tracing::warn!("Session {}: poll failed: {}", self.client.session_id(), e);
                        if tx.send(SyncEvent::PollFailed(e.to_string())).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let ended = events
                    .iter()
                    .any(|event| matches!(event, SyncEvent::MatchEnded { .. }));
                for event in events {
                    if tx.send(event).is_err() {
                        return;
                    }
                }

                for reaction in reactions {
                    let client = self.client.clone();
                    let tx = tx.clone();
                    let retry_tx = retry_tx.clone();
                    tokio::spawn(async move {
                        let result = run_reaction(&client, reaction).await;
                        if lost_race(&result) {
                            let _ = retry_tx.send(reaction);
                        }
                        let _ = tx.send(reaction_event(reaction, result));
                    });
                }

                if ended {
                    break;
                }
            }
        });

        (handle, rx)
    }

    /// Read public state, emit transitions, reconcile the stored secret and
    /// decide which reactions are due.
    async fn observe(&mut self) -> Result<(Vec<SyncEvent>, Vec<Reaction>)> {
        // Held across refresh and reconciliation so a prey move cannot land
        // in between and have its freshly saved secret overwritten. Never
        // waited on: a move in flight only skips reconciliation.
        let client = self.client.clone();
        let secret = client.try_lock_secret();
        let busy = secret.is_none() || self.client.is_busy();
        let game = self.client.refresh().await?;
        let role = game.role_of(self.client.player());
        let previous = self.previous.replace(game.clone());
        let mut events = Vec::new();

        if let Some(prev) = &previous {
            if prev.phase != game.phase {
                events.push(SyncEvent::PhaseChanged {
                    from: prev.phase,
                    to: game.phase,
                });
            }
        }

        let in_play = !matches!(game.phase, GamePhase::WaitingForPlayer2 | GamePhase::Ended);
        let new_round = previous
            .as_ref()
            .map_or(true, |prev| prev.round != game.round || prev.phase == GamePhase::WaitingForPlayer2);
        if in_play && new_round {
            if let Some(role) = role {
                tracing::info!(
                    "Session {}: round {} started, playing {:?}",
                    self.client.session_id(),
                    game.round,
                    role
                );
                events.push(SyncEvent::RoundStarted {
                    round: game.round,
                    role,
                });
            }
        }

        if game.is_over() && previous.as_ref().map_or(true, |prev| !prev.is_over()) {
            events.push(SyncEvent::MatchEnded {
                winner: game.winner.clone(),
                player1_score: game.player1_score,
                player2_score: game.player2_score,
            });
        }

        if !busy {
            events.extend(self.reconcile_secret(&game, role).await?);
        }
        drop(secret);

        let is_prey = role == Some(Role::Prey);
        let turn = (game.round, game.turn_number);
        let mut reactions = Vec::new();

        let search_due = (is_prey && game.phase == GamePhase::SearchPending).then_some(turn);
        if self.search_latch.trigger(search_due, busy) {
            reactions.push(Reaction::RespondSearch);
        }
        let frozen_due =
            (is_prey && game.phase == GamePhase::PreyTurn && game.prey_is_frozen).then_some(turn);
        if self.frozen_latch.trigger(frozen_due, busy) {
            reactions.push(Reaction::PassFrozen);
        }

        Ok((events, reactions))
    }

    async fn reconcile_secret(&mut self, game: &Game, role: Option<Role>) -> Result<Vec<SyncEvent>> {
        let session_id = self.client.session_id();
        let store = self.client.secrets().clone();
        let stored = store.load(session_id).await?;

        if game.is_over() || role != Some(Role::Prey) {
            self.secret_fault.rearm();
            if stored.is_none() {
                return Ok(Vec::new());
            }
            store.clear(session_id).await?;
            tracing::info!("Session {}: cleared prey secret", session_id);
            return Ok(vec![SyncEvent::SecretCleared]);
        }

        if let Some(public) = game.visible_prey_position() {
            self.secret_fault.rearm();
            let current = stored
                .as_ref()
                .is_some_and(|record| record.round == game.round && record.secret.position() == public);
            if current {
                return Ok(Vec::new());
            }

            let record = StoredSecret::new(game.round, PreySecret::fresh(public));
            store.save(session_id, &record).await?;
            tracing::info!(
                "Session {}: regenerated prey secret for round {}",
                session_id,
                game.round
            );
            return Ok(vec![SyncEvent::SecretRegenerated { round: game.round }]);
        }

        let fault = match &stored {
            None => Some(SyncEvent::SecretLost),
            Some(record) if record.secret.commitment() != game.prey_commitment => {
                Some(SyncEvent::SecretMismatch)
            }
            Some(_) => None,
        };
        let Some(fault) = fault else {
            self.secret_fault.rearm();
            return Ok(Vec::new());
        };

        let lost = fault == SyncEvent::SecretLost;
        if self
            .secret_fault
            .trigger(Some((game.round, game.prey_commitment, lost)), false)
        {
            tracing::error!(
                "Session {}: hidden prey cannot be proven ({:?}); the next search will be conceded",
                session_id,
                fault
            );
            return Ok(vec![fault]);
        }
        Ok(Vec::new())
    }

    /// Let a reaction that lost to a user action fire again on the next poll.
    fn retry(&mut self, reaction: Reaction) {
        let latch = match reaction {
            Reaction::RespondSearch => &mut self.search_latch,
            Reaction::PassFrozen => &mut self.frozen_latch,
        };
        latch.rearm();
    }
}

fn lost_race(result: &Result<SyncEvent>) -> bool {
    matches!(result, Err(ClientError::Busy(_)))
}

async fn run_reaction(client: &PlayerClient, reaction: Reaction) -> Result<SyncEvent> {
    match reaction {
        Reaction::RespondSearch => Ok(SyncEvent::SearchAnswered(client.respond_to_search().await?)),
        Reaction::PassFrozen => {
            client.prey_pass_frozen().await?;
            Ok(SyncEvent::PassedFrozen)
        }
    }
}

fn reaction_event(reaction: Reaction, result: Result<SyncEvent>) -> SyncEvent {
    match result {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("{:?} failed: {}", reaction, e);
            SyncEvent::ReactionFailed {
                reaction,
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySecretStore;
    use crate::tests::{hide_bob, layout, table};
    use zkhunt_game::Position;

    #[tokio::test]
    async fn test_reaction_lost_to_user_action_fires_again() {
        let t = table(
            vec![layout((3, 3), (0, 3))],
            Duration::from_millis(150),
            Arc::new(MemorySecretStore::new()),
        )
        .await;
        let mut sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut sync, (0, 4)).await;
        t.alice.hunter_search(Position::new(1, 4)).await.unwrap();

        let (_, reactions) = sync.observe().await.unwrap();
        assert_eq!(reactions, vec![Reaction::RespondSearch]);
        let game = sync.previous.clone().unwrap();
        let turn = (game.round, game.turn_number);

        // The player answers by hand before the reaction gets to run.
        let bob = t.bob.clone();
        let manual = tokio::spawn(async move { bob.respond_to_search().await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = run_reaction(&t.bob, Reaction::RespondSearch).await;
        assert!(lost_race(&result));
        assert!(!sync.search_latch.trigger(Some(turn), false));
        sync.retry(Reaction::RespondSearch);
        assert!(sync.search_latch.trigger(Some(turn), false));

        assert_eq!(manual.await.unwrap().unwrap(), SearchOutcome::Proved);
    }

    #[test]
    fn test_latch_fires_once_per_occurrence() {
        let mut latch = EdgeLatch::new();

        assert!(latch.trigger(Some((1, 3)), false));
        assert!(!latch.trigger(Some((1, 3)), false));
        assert!(!latch.trigger(Some((1, 3)), false));

        // New occurrence without an intervening false.
        assert!(latch.trigger(Some((1, 4)), false));

        assert!(!latch.trigger(None, false));
        assert!(latch.trigger(Some((1, 4)), false));
    }

    #[test]
    fn test_suppressed_occurrence_fires_later() {
        let mut latch = EdgeLatch::new();

        assert!(!latch.trigger(Some(7u32), true));
        assert!(!latch.trigger(Some(7), true));
        assert!(latch.trigger(Some(7), false));
        assert!(!latch.trigger(Some(7), false));

        latch.rearm();
        assert!(latch.trigger(Some(7), false));
    }
}
