//! ZK Hunt client runtime
//!
//! Everything one party needs to play against an authority: the proof engine
//! boundary and orchestration, durable prey secrets, a validating per-session
//! client and the polling synchronizer that keeps them consistent.

pub mod authority;
pub mod client;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prover;
pub mod storage;
pub mod sync;

pub use authority::{AuthorityClient, LocalAuthority, SharedMachine};
pub use client::{plan_prey_move, PlayerClient, PreyMove, SearchOutcome};
pub use config::{ClientConfig, NetworkKind};
pub use error::{ClientError, Result};
pub use orchestrator::{MoveProof, ProofOrchestrator, SearchResponse};
pub use prover::{CircuitInputs, DevProofEngine, EngineError, ProofEngine, ProofOutput};
pub use storage::{MemorySecretStore, SecretStore, SqliteSecretStore, StoredSecret};
pub use sync::{EdgeLatch, Reaction, SyncEvent, Synchronizer};

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;
    use zkhunt_game::{
        DevKey, DevVerifier, FixedSpawn, GamePhase, GameStateMachine, PlayerId, Position,
        PreySecret, Role, RoundLayout, RulesConfig,
    };

    pub(crate) struct Table {
        pub(crate) key: DevKey,
        pub(crate) alice: Arc<PlayerClient>,
        pub(crate) bob: Arc<PlayerClient>,
        pub(crate) bob_authority: Arc<LocalAuthority>,
    }

    pub(crate) fn layout(hunter: (u8, u8), prey: (u8, u8)) -> RoundLayout {
        RoundLayout {
            map_index: 0,
            hunter: Position::new(hunter.0, hunter.1),
            prey: Position::new(prey.0, prey.1),
        }
    }

    fn orchestrator(key: &DevKey, latency: Duration) -> ProofOrchestrator {
        ProofOrchestrator::new(Arc::new(
            DevProofEngine::new(key.clone()).with_latency(latency),
        ))
    }

    /// Alice creates session 1 and hunts first; bob joins as prey.
    pub(crate) async fn table(
        layouts: Vec<RoundLayout>,
        latency: Duration,
        bob_secrets: Arc<dyn SecretStore>,
    ) -> Table {
        let key = DevKey::random();
        let machine = LocalAuthority::shared(
            GameStateMachine::with_spawn(
                RulesConfig::default(),
                Arc::new(DevVerifier::new(key.clone())),
                Box::new(FixedSpawn::new(layouts)),
            )
            .unwrap(),
        );

        let alice = PlayerClient::create(
            Arc::new(LocalAuthority::new(machine.clone(), PlayerId::new("alice"))),
            orchestrator(&key, latency),
            Arc::new(MemorySecretStore::new()),
        )
        .await
        .unwrap();

        let bob_authority = Arc::new(LocalAuthority::new(machine, PlayerId::new("bob")));
        let bob = PlayerClient::join(
            alice.session_id(),
            bob_authority.clone(),
            orchestrator(&key, latency),
            bob_secrets,
        )
        .await
        .unwrap();

        Table {
            key,
            alice: Arc::new(alice),
            bob: Arc::new(bob),
            bob_authority,
        }
    }

    pub(crate) async fn standard_table() -> Table {
        table(
            vec![layout((3, 3), (0, 3))],
            Duration::ZERO,
            Arc::new(MemorySecretStore::new()),
        )
        .await
    }

    /// Hunter steps to (2,3), bob hides at `hidden` through his client.
    pub(crate) async fn hide_bob(t: &Table, bob_sync: &mut Synchronizer, hidden: (u8, u8)) {
        bob_sync.step().await.unwrap();
        t.alice.hunter_move(Position::new(2, 3)).await.unwrap();
        let kind = t.bob.prey_move(Position::new(hidden.0, hidden.1)).await.unwrap();
        assert_eq!(kind, PreyMove::EnterJungle);
    }

    #[tokio::test]
    async fn test_create_then_join() {
        let key = DevKey::random();
        let machine = LocalAuthority::shared(
            GameStateMachine::new(RulesConfig::default(), Arc::new(DevVerifier::new(key.clone())))
                .unwrap(),
        );
        let alice = PlayerClient::create(
            Arc::new(LocalAuthority::new(machine.clone(), PlayerId::new("alice"))),
            orchestrator(&key, Duration::ZERO),
            Arc::new(MemorySecretStore::new()),
        )
        .await
        .unwrap();

        assert_eq!(alice.session_id(), 1);
        assert_eq!(alice.last_game().unwrap().phase, GamePhase::WaitingForPlayer2);

        let bob = PlayerClient::join(
            1,
            Arc::new(LocalAuthority::new(machine, PlayerId::new("bob"))),
            orchestrator(&key, Duration::ZERO),
            Arc::new(MemorySecretStore::new()),
        )
        .await
        .unwrap();

        let game = bob.last_game().unwrap();
        assert_eq!(game.phase, GamePhase::HunterTurn);
        assert_eq!(game.hunter, PlayerId::new("alice"));
        assert_eq!(game.prey, Some(PlayerId::new("bob")));
    }

    #[tokio::test]
    async fn test_catch_swaps_roles_and_secrets() {
        let t = table(
            vec![layout((3, 3), (3, 4)), layout((7, 0), (0, 7))],
            Duration::ZERO,
            Arc::new(MemorySecretStore::new()),
        )
        .await;
        let mut alice_sync = Synchronizer::new(t.alice.clone());
        let mut bob_sync = Synchronizer::new(t.bob.clone());

        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::RoundStarted { round: 1, role: Role::Prey }));
        assert!(events.contains(&SyncEvent::SecretRegenerated { round: 1 }));
        alice_sync.step().await.unwrap();

        t.alice.hunter_move(Position::new(3, 4)).await.unwrap();
        let game = t.alice.last_game().unwrap();
        assert_eq!((game.player1_score, game.player2_score), (1, 0));
        assert_eq!(game.round, 2);
        assert_eq!(game.hunter, PlayerId::new("bob"));

        let events = alice_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::RoundStarted { round: 2, role: Role::Prey }));
        assert!(events.contains(&SyncEvent::SecretRegenerated { round: 2 }));
        let stored = t.alice.secrets().load(1).await.unwrap().unwrap();
        assert_eq!(stored.round, 2);
        assert_eq!(stored.secret.position(), Position::new(0, 7));

        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::RoundStarted { round: 2, role: Role::Hunter }));
        assert!(events.contains(&SyncEvent::SecretCleared));
        assert_eq!(t.bob.secrets().load(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_power_search_answered_automatically() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;

        let game = t.alice.hunter_power_search().await.unwrap();
        assert_eq!(game.phase, GamePhase::SearchPending);
        assert_eq!(
            game.searched_tiles(),
            vec![Position::new(1, 3), Position::new(1, 2), Position::new(1, 4)]
        );

        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::SearchAnswered(SearchOutcome::Proved)));

        let game = t.alice.refresh().await.unwrap();
        assert_eq!(game.phase, GamePhase::HunterTurn);
        assert!(game.searched_tiles().is_empty());
        assert_eq!(game.search_deadline, None);
        assert_eq!((game.player1_score, game.player2_score), (0, 0));

        let events = bob_sync.step().await.unwrap();
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::SearchAnswered(_))));
    }

    #[tokio::test]
    async fn test_empty_proof_concedes_regardless_of_position() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;

        // (1,2) is searched; bob is safely at (0,4) but concedes anyway.
        t.alice.hunter_search(Position::new(1, 2)).await.unwrap();
        t.bob_authority.respond_search(1, Vec::new()).await.unwrap();

        let game = t.alice.refresh().await.unwrap();
        assert_eq!((game.player1_score, game.player2_score), (1, 0));
        assert_eq!(game.round, 2);
    }

    #[tokio::test]
    async fn test_exposed_prey_concedes_automatically() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (1, 3)).await;

        t.alice.hunter_power_search().await.unwrap();
        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::SearchAnswered(SearchOutcome::Conceded)));

        let game = t.alice.refresh().await.unwrap();
        assert_eq!(game.player1_score, 1);
        assert_eq!(game.hunter, PlayerId::new("bob"));
    }

    #[tokio::test]
    async fn test_frozen_prey_passes_exactly_once() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        bob_sync.step().await.unwrap();

        t.alice.hunter_emp().await.unwrap();
        t.alice.hunter_move(Position::new(3, 2)).await.unwrap();

        let events = bob_sync.step().await.unwrap();
        let passes = events
            .iter()
            .filter(|event| **event == SyncEvent::PassedFrozen)
            .count();
        assert_eq!(passes, 1);

        let game = t.alice.refresh().await.unwrap();
        assert_eq!(game.phase, GamePhase::HunterTurn);
        assert!(!game.prey_is_frozen);
        assert_eq!(game.turn_number, 2);

        let events = bob_sync.step().await.unwrap();
        assert!(!events.contains(&SyncEvent::PassedFrozen));
    }

    #[tokio::test]
    async fn test_reactions_wait_while_busy() {
        let t = table(
            vec![layout((3, 3), (0, 3))],
            Duration::from_millis(150),
            Arc::new(MemorySecretStore::new()),
        )
        .await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;
        t.alice.hunter_search(Position::new(1, 4)).await.unwrap();

        let bob = t.bob.clone();
        let manual = tokio::spawn(async move { bob.respond_to_search().await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let events = bob_sync.step().await.unwrap();
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::SearchAnswered(_) | SyncEvent::ReactionFailed { .. })));

        assert_eq!(manual.await.unwrap().unwrap(), SearchOutcome::Proved);
        let events = bob_sync.step().await.unwrap();
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::SearchAnswered(_))));
    }

    #[tokio::test]
    async fn test_poll_runs_while_move_is_proving() {
        let t = table(
            vec![layout((3, 3), (0, 3))],
            Duration::from_millis(400),
            Arc::new(MemorySecretStore::new()),
        )
        .await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        bob_sync.step().await.unwrap();
        t.alice.hunter_move(Position::new(2, 3)).await.unwrap();

        let bob = t.bob.clone();
        let moving = tokio::spawn(async move { bob.prey_move(Position::new(0, 4)).await });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let events = tokio::time::timeout(Duration::from_millis(200), bob_sync.step())
            .await
            .expect("poll waited on the in-flight move")
            .unwrap();
        assert!(events.contains(&SyncEvent::PhaseChanged {
            from: GamePhase::HunterTurn,
            to: GamePhase::PreyTurn,
        }));
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::SecretRegenerated { .. })));

        assert_eq!(moving.await.unwrap().unwrap(), PreyMove::EnterJungle);
        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::PhaseChanged {
            from: GamePhase::PreyTurn,
            to: GamePhase::HunterTurn,
        }));
        assert!(!events
            .iter()
            .any(|event| matches!(event, SyncEvent::SecretLost | SyncEvent::SecretMismatch)));

        let stored = t.bob.secrets().load(1).await.unwrap().unwrap();
        assert_eq!(stored.secret.position(), Position::new(0, 4));
    }

    #[tokio::test]
    async fn test_lost_secret_concedes_next_search() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;
        t.bob.secrets().clear(1).await.unwrap();

        // (1,4) misses bob, but without a secret he cannot prove it.
        t.alice.hunter_search(Position::new(1, 4)).await.unwrap();
        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::SecretLost));
        assert!(events.contains(&SyncEvent::SearchAnswered(SearchOutcome::Conceded)));

        let game = t.alice.refresh().await.unwrap();
        assert_ne!(game.phase, GamePhase::SearchPending);
        assert_eq!((game.player1_score, game.player2_score), (1, 0));
        assert_eq!(game.round, 2);
    }

    #[tokio::test]
    async fn test_secret_faults_reported_once() {
        let t = standard_table().await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;
        assert!(bob_sync.step().await.unwrap().is_empty());

        let round = t.bob.last_game().unwrap().round;
        t.bob
            .secrets()
            .save(1, &StoredSecret::new(round, PreySecret::new(Position::new(0, 4), 1)))
            .await
            .unwrap();
        assert!(bob_sync.step().await.unwrap().contains(&SyncEvent::SecretMismatch));
        assert!(bob_sync.step().await.unwrap().is_empty());

        t.bob.secrets().clear(1).await.unwrap();
        assert!(bob_sync.step().await.unwrap().contains(&SyncEvent::SecretLost));
        assert!(bob_sync.step().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_picks_up_persisted_secret() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bob").join("prey_secrets.db");
        let store = Arc::new(SqliteSecretStore::open(&path, None).await.unwrap());

        let t = table(vec![layout((3, 3), (0, 3))], Duration::ZERO, store).await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;
        drop(bob_sync);

        let reopened = Arc::new(SqliteSecretStore::open(&path, None).await.unwrap());
        let bob = Arc::new(PlayerClient::new(
            1,
            t.bob_authority.clone(),
            orchestrator(&t.key, Duration::ZERO),
            reopened,
        ));
        let mut bob_sync = Synchronizer::new(bob.clone());

        let events = bob_sync.step().await.unwrap();
        assert_eq!(events, vec![SyncEvent::RoundStarted { round: 1, role: Role::Prey }]);

        t.alice.hunter_power_search().await.unwrap();
        let events = bob_sync.step().await.unwrap();
        assert!(events.contains(&SyncEvent::SearchAnswered(SearchOutcome::Proved)));
    }

    #[tokio::test]
    async fn test_spawned_synchronizer_answers_and_stops_at_match_end() {
        let t = table(
            vec![layout((3, 3), (0, 3)), layout((3, 3), (3, 4))],
            Duration::ZERO,
            Arc::new(MemorySecretStore::new()),
        )
        .await;
        let mut bob_sync = Synchronizer::new(t.bob.clone());
        hide_bob(&t, &mut bob_sync, (0, 4)).await;

        let mut config = ClientConfig::default();
        config.poll_interval = Duration::from_millis(10);
        let (handle, mut events) = bob_sync.spawn_with(&config);
        t.alice.hunter_power_search().await.unwrap();

        let answered = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                if event == SyncEvent::SearchAnswered(SearchOutcome::Proved) {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap();
        assert!(answered);

        // Bob walks out next to alice and she lands on him.
        t.alice.hunter_move(Position::new(2, 3)).await.unwrap();
        assert_eq!(t.bob.prey_move(Position::new(0, 3)).await.unwrap(), PreyMove::ExitJungle);
        t.alice.hunter_move(Position::new(1, 3)).await.unwrap();
        assert_eq!(t.bob.prey_move(Position::new(0, 3)).await.unwrap(), PreyMove::Step);
        t.alice.hunter_move(Position::new(0, 3)).await.unwrap();

        // Round 2: bob hunts from (3,3) and alice spawned right below him.
        t.bob.hunter_move(Position::new(3, 4)).await.unwrap();
        let game = t.alice.refresh().await.unwrap();
        assert!(game.is_over());
        assert_eq!(game.winner, None);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let mut ended = false;
        while let Ok(event) = events.try_recv() {
            ended |= matches!(event, SyncEvent::MatchEnded { player1_score: 1, player2_score: 1, .. });
        }
        assert!(ended);
    }
}
