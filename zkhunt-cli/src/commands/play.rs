use super::render_game;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use zkhunt_core::{
    plan_prey_move, ClientConfig, ClientError, DevProofEngine, LocalAuthority, PlayerClient,
    ProofOrchestrator, SecretStore, SqliteSecretStore, SyncEvent, Synchronizer,
};
use zkhunt_game::{
    DevKey, DevVerifier, Game, GamePhase, GameStateMachine, PlayerId, Position, RandomSpawn,
    Role, RulesConfig, GRID_SIZE,
};

const MAX_ACTIONS: usize = 400;

struct Seat {
    client: Arc<PlayerClient>,
    sync: Synchronizer,
}

impl Seat {
    fn new(client: PlayerClient) -> Self {
        let client = Arc::new(client);
        Self {
            sync: Synchronizer::new(client.clone()),
            client,
        }
    }
}

/// Run a full match between two bots over an in-process authority, each
/// with its own SQLite secret store under the data directory.
pub async fn play_match(
    config: &ClientConfig,
    rounds: u32,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let rules = RulesConfig {
        rounds_per_side: rounds,
        ..RulesConfig::default()
    };
    let spawn = match seed {
        Some(seed) => RandomSpawn::seeded(seed, rules.min_spawn_distance),
        None => RandomSpawn::new(rules.min_spawn_distance),
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
        None => StdRng::from_entropy(),
    };

    let key = DevKey::random();
    let machine = GameStateMachine::with_spawn(
        rules,
        Arc::new(DevVerifier::new(key.clone())),
        Box::new(spawn),
    )?;
    let shared = LocalAuthority::shared(machine);
    let orchestrator = ProofOrchestrator::new(Arc::new(DevProofEngine::new(key)))
        .with_timeout(config.response_timeout);

    let alice = PlayerClient::create(
        Arc::new(LocalAuthority::new(shared.clone(), PlayerId::new("alice"))),
        orchestrator.clone(),
        open_store(config, "alice").await?,
    )
    .await?;
    let session_id = alice.session_id();
    let bob = PlayerClient::join(
        session_id,
        Arc::new(LocalAuthority::new(shared, PlayerId::new("bob"))),
        orchestrator,
        open_store(config, "bob").await?,
    )
    .await?;

    // Session ids restart with every in-process authority.
    alice.secrets().clear(session_id).await?;
    bob.secrets().clear(session_id).await?;

    println!("Session {} ({} network profile)", session_id, config.network);
    let mut seats = [Seat::new(alice), Seat::new(bob)];
    let mut shown_round = 0;

    for _ in 0..MAX_ACTIONS {
        for seat in seats.iter_mut() {
            for event in seat.sync.step().await? {
                report(seat.client.player(), &event);
            }
        }

        let game = seats[0].client.refresh().await?;
        if game.is_over() {
            println!("{}", render_game(&game));
            match &game.winner {
                Some(winner) => println!(
                    "{} wins {}-{}",
                    winner, game.player1_score, game.player2_score
                ),
                None => println!("Draw {}-{}", game.player1_score, game.player2_score),
            }
            return Ok(());
        }

        if game.round != shown_round {
            shown_round = game.round;
            println!("\nRound {}: {} hunts on map {}", game.round, game.hunter, game.map_index);
            println!("{}", render_game(&game));
        }

        // Searches and freezes are answered by the prey's synchronizer.
        let frozen_turn = game.phase == GamePhase::PreyTurn && game.prey_is_frozen;
        if game.phase == GamePhase::SearchPending || frozen_turn {
            continue;
        }
        let Some(role) = game.to_act() else {
            continue;
        };
        let seat = seats
            .iter()
            .find(|seat| game.role_of(seat.client.player()) == Some(role))
            .ok_or("nobody holds the acting role")?;

        match role {
            Role::Hunter => hunter_turn(&seat.client, &game, &mut rng).await?,
            Role::Prey => prey_turn(&seat.client, &game, &mut rng).await?,
        }
    }

    Err(format!("match did not finish within {} actions", MAX_ACTIONS).into())
}

async fn open_store(
    config: &ClientConfig,
    player: &str,
) -> Result<Arc<dyn SecretStore>, ClientError> {
    let seat = config.clone().with_data_dir(config.data_dir.join(player));
    let store =
        SqliteSecretStore::open(&seat.secret_db_path(), config.secret_passphrase.clone()).await?;
    Ok(Arc::new(store))
}

/// Chase a visible prey (freezing it when close), search around where a
/// hidden one was last seen, otherwise close in on that spot.
async fn hunter_turn(client: &PlayerClient, game: &Game, rng: &mut StdRng) -> Result<(), ClientError> {
    let me = game.hunter_position();
    let name = client.player();

    if let Some(prey) = game.visible_prey_position() {
        if game.emp_uses_remaining > 0 && !game.prey_is_frozen && me.manhattan(&prey) == 2 {
            client.hunter_emp().await?;
            println!("{}: EMP", name);
            return Ok(());
        }
        let target = step_toward(me, prey);
        client.hunter_move(target).await?;
        println!("{}: move to {}", name, target);
        return Ok(());
    }

    let last_seen = game.last_known_prey_position();
    let area = game.board().search_area(me);
    if !area.is_empty() && me.chebyshev(&last_seen) <= 2 {
        if game.power_searches_remaining > 0 && area.len() > 1 {
            client.hunter_power_search().await?;
            println!("{}: power search over {} tiles", name, area.len());
        } else if let Some(tile) = area.choose(rng) {
            client.hunter_search(*tile).await?;
            println!("{}: search {}", name, tile);
        }
        return Ok(());
    }

    let target = step_toward(me, last_seen);
    client.hunter_move(target).await?;
    println!("{}: move to {}", name, target);
    Ok(())
}

/// Pick the legal target furthest from the hunter, preferring cover.
async fn prey_turn(client: &PlayerClient, game: &Game, rng: &mut StdRng) -> Result<(), ClientError> {
    let from = match game.visible_prey_position() {
        Some(public) => public,
        None => client
            .secrets()
            .load(client.session_id())
            .await?
            .ok_or(ClientError::SecretMissing(client.session_id()))?
            .secret
            .position(),
    };
    let hunter = game.hunter_position();
    let board = game.board();

    let target = (0..GRID_SIZE)
        .flat_map(|x| (0..GRID_SIZE).map(move |y| Position::new(x, y)))
        .filter(|pos| *pos != hunter && pos.manhattan(&from) <= 2)
        .filter(|pos| plan_prey_move(game, from, *pos).is_ok())
        .map(|pos| {
            let cover = if board.is_jungle(pos) { 3 } else { 0 };
            let score = pos.manhattan(&hunter) as u32 * 2 + cover + rng.gen_range(0..2);
            (score, pos)
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, pos)| pos)
        .ok_or_else(|| ClientError::illegal("prey has no legal move"))?;

    let kind = client.prey_move(target).await?;
    println!("{}: {:?}", client.player(), kind);
    Ok(())
}

/// One orthogonal step from `from` toward `to`, along the longer axis.
fn step_toward(from: Position, to: Position) -> Position {
    let dx = from.x.abs_diff(to.x);
    let dy = from.y.abs_diff(to.y);
    if dx == 0 && dy == 0 {
        return from;
    }
    if dx >= dy {
        let x = if to.x > from.x { from.x + 1 } else { from.x - 1 };
        Position::new(x, from.y)
    } else {
        let y = if to.y > from.y { from.y + 1 } else { from.y - 1 };
        Position::new(from.x, y)
    }
}

fn report(player: &PlayerId, event: &SyncEvent) {
    match event {
        SyncEvent::SearchAnswered(outcome) => println!("{}: search answered ({:?})", player, outcome),
        SyncEvent::PassedFrozen => println!("{}: frozen, turn passed", player),
        SyncEvent::ReactionFailed { reaction, error } => {
            println!("{}: {:?} failed: {}", player, reaction, error)
        }
        SyncEvent::SecretMismatch | SyncEvent::SecretLost => {
            println!("{}: prey secret out of sync ({:?})", player, event)
        }
        other => tracing::debug!("{}: {:?}", player, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_step_toward() {
        let from = Position::new(3, 3);
        assert_eq!(step_toward(from, Position::new(6, 4)), Position::new(4, 3));
        assert_eq!(step_toward(from, Position::new(3, 0)), Position::new(3, 2));
        assert_eq!(step_toward(from, Position::new(0, 3)), Position::new(2, 3));
        assert_eq!(step_toward(from, from), from);
    }

    #[tokio::test]
    async fn test_bots_finish_a_match() {
        let temp_dir = tempdir().unwrap();
        let config = ClientConfig::default().with_data_dir(temp_dir.path());

        play_match(&config, 1, Some(7)).await.unwrap();

        assert!(temp_dir.path().join("alice").join("prey_secrets.db").exists());
        assert!(temp_dir.path().join("bob").join("prey_secrets.db").exists());
    }
}
