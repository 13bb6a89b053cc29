use crate::board::{Board, Position};
use crate::commitment::Commitment;
use crate::error::{HuntError, Result};
use crate::proof::{pad_searched, WireError, SEARCH_SLOTS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of a participant (an account address on the authority).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    WaitingForPlayer2,
    HunterTurn,
    PreyTurn,
    SearchPending,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Hunter,
    Prey,
}

/// Tunables of a match. Defaults are the standard rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub rounds_per_side: u32,
    pub max_turns: u32,
    pub power_searches: u32,
    pub emp_uses: u32,
    pub prey_dashes: u32,
    pub min_spawn_distance: u8,
    pub response_window: Duration,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            rounds_per_side: 1,
            max_turns: 10,
            power_searches: 2,
            emp_uses: 1,
            prey_dashes: 2,
            min_spawn_distance: 3,
            response_window: Duration::from_secs(180),
        }
    }
}

impl RulesConfig {
    pub fn total_rounds(&self) -> u32 {
        self.rounds_per_side * 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.rounds_per_side == 0 || self.max_turns == 0 {
            return Err(HuntError::InvalidRules);
        }
        // Spawn pairs must exist on every map.
        if self.min_spawn_distance == 0 || self.min_spawn_distance > 7 {
            return Err(HuntError::InvalidRules);
        }
        if chrono::Duration::from_std(self.response_window).is_err() {
            return Err(HuntError::InvalidRules);
        }
        Ok(())
    }
}

/// Public, authoritative state of one session.
///
/// While `prey_is_hidden` is set, `prey_x`/`prey_y` are only the last known
/// position; the commitment is the sole fact about where the prey is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub phase: GamePhase,
    pub player1: PlayerId,
    pub player2: Option<PlayerId>,
    pub hunter: PlayerId,
    pub prey: Option<PlayerId>,
    pub hunter_x: u8,
    pub hunter_y: u8,
    pub prey_x: u8,
    pub prey_y: u8,
    pub prey_commitment: Commitment,
    pub prey_is_hidden: bool,
    pub prey_is_frozen: bool,
    pub prey_dash_remaining: u32,
    pub power_searches_remaining: u32,
    pub emp_uses_remaining: u32,
    pub searched_tiles_x: Vec<u8>,
    pub searched_tiles_y: Vec<u8>,
    pub search_deadline: Option<DateTime<Utc>>,
    pub round: u32,
    pub turn_number: u32,
    pub total_rounds: u32,
    pub player1_score: u32,
    pub player2_score: u32,
    pub winner: Option<PlayerId>,
    pub map_index: u8,
}

impl Game {
    pub fn board(&self) -> Board {
        Board::from_index(self.map_index)
    }

    pub fn hunter_position(&self) -> Position {
        Position::new(self.hunter_x, self.hunter_y)
    }

    /// The prey's position if it is currently public.
    pub fn visible_prey_position(&self) -> Option<Position> {
        (!self.prey_is_hidden).then(|| Position::new(self.prey_x, self.prey_y))
    }

    /// Last published prey position, possibly stale.
    pub fn last_known_prey_position(&self) -> Position {
        Position::new(self.prey_x, self.prey_y)
    }

    pub fn is_player(&self, who: &PlayerId) -> bool {
        self.player1 == *who || self.player2.as_ref() == Some(who)
    }

    pub fn role_of(&self, who: &PlayerId) -> Option<Role> {
        if self.hunter == *who {
            Some(Role::Hunter)
        } else if self.prey.as_ref() == Some(who) {
            Some(Role::Prey)
        } else {
            None
        }
    }

    pub fn score_of(&self, who: &PlayerId) -> Option<u32> {
        if self.player1 == *who {
            Some(self.player1_score)
        } else if self.player2.as_ref() == Some(who) {
            Some(self.player2_score)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, who: &PlayerId) -> Option<&PlayerId> {
        if self.player1 == *who {
            self.player2.as_ref()
        } else if self.player2.as_ref() == Some(who) {
            Some(&self.player1)
        } else {
            None
        }
    }

    pub fn searched_tiles(&self) -> Vec<Position> {
        self.searched_tiles_x
            .iter()
            .zip(self.searched_tiles_y.iter())
            .map(|(&x, &y)| Position::new(x, y))
            .collect()
    }

    /// Searched coordinates padded exactly as the search-response circuit
    /// expects them.
    pub fn padded_search(
        &self,
    ) -> std::result::Result<([u8; SEARCH_SLOTS], [u8; SEARCH_SLOTS]), WireError> {
        Ok((
            pad_searched(&self.searched_tiles_x)?,
            pad_searched(&self.searched_tiles_y)?,
        ))
    }

    pub fn is_over(&self) -> bool {
        self.phase == GamePhase::Ended
    }

    /// Whose move the authority is waiting for.
    pub fn to_act(&self) -> Option<Role> {
        match self.phase {
            GamePhase::HunterTurn => Some(Role::Hunter),
            GamePhase::PreyTurn | GamePhase::SearchPending => Some(Role::Prey),
            GamePhase::WaitingForPlayer2 | GamePhase::Ended => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Game {
        Game {
            phase: GamePhase::HunterTurn,
            player1: PlayerId::new("alice"),
            player2: Some(PlayerId::new("bob")),
            hunter: PlayerId::new("alice"),
            prey: Some(PlayerId::new("bob")),
            hunter_x: 3,
            hunter_y: 3,
            prey_x: 3,
            prey_y: 4,
            prey_commitment: Commitment::ZERO,
            prey_is_hidden: false,
            prey_is_frozen: false,
            prey_dash_remaining: 2,
            power_searches_remaining: 2,
            emp_uses_remaining: 1,
            searched_tiles_x: vec![1, 2],
            searched_tiles_y: vec![5, 6],
            search_deadline: None,
            round: 1,
            turn_number: 1,
            total_rounds: 2,
            player1_score: 1,
            player2_score: 0,
            winner: None,
            map_index: 0,
        }
    }

    #[test]
    fn test_roles_and_scores() {
        let game = sample();
        let alice = PlayerId::new("alice");
        let bob = PlayerId::new("bob");
        let carol = PlayerId::new("carol");

        assert_eq!(game.role_of(&alice), Some(Role::Hunter));
        assert_eq!(game.role_of(&bob), Some(Role::Prey));
        assert_eq!(game.role_of(&carol), None);
        assert_eq!(game.score_of(&alice), Some(1));
        assert_eq!(game.score_of(&bob), Some(0));
        assert_eq!(game.opponent_of(&bob), Some(&alice));
        assert!(!game.is_player(&carol));
    }

    #[test]
    fn test_hidden_prey_has_no_visible_position() {
        let mut game = sample();
        assert_eq!(game.visible_prey_position(), Some(Position::new(3, 4)));

        game.prey_is_hidden = true;
        assert_eq!(game.visible_prey_position(), None);
        assert_eq!(game.last_known_prey_position(), Position::new(3, 4));
    }

    #[test]
    fn test_padded_search() {
        let game = sample();
        let (xs, ys) = game.padded_search().unwrap();
        assert_eq!(xs, [1, 2, 255, 255, 255, 255, 255, 255, 255]);
        assert_eq!(ys, [5, 6, 255, 255, 255, 255, 255, 255, 255]);
        assert_eq!(
            game.searched_tiles(),
            vec![Position::new(1, 5), Position::new(2, 6)]
        );
    }

    #[test]
    fn test_default_rules() {
        let rules = RulesConfig::default();
        assert!(rules.validate().is_ok());
        assert_eq!(rules.total_rounds(), 2);

        let broken = RulesConfig {
            max_turns: 0,
            ..RulesConfig::default()
        };
        assert_eq!(broken.validate(), Err(HuntError::InvalidRules));
    }
}
