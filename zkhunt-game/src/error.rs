use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HuntError>;

/// Authoritative rejection of a game operation.
///
/// Every rejection is atomic: the session is left exactly as it was before the
/// call. Codes are stable and shared with clients.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HuntError {
    #[error("Game session not found")]
    GameNotFound,

    #[error("Caller is not a player in this game")]
    NotPlayer,

    #[error("Operation is not allowed in the current phase")]
    WrongPhase,

    #[error("Only the hunter may do that")]
    NotHunter,

    #[error("Only the prey may do that")]
    NotPrey,

    #[error("Target tile is off the board")]
    OutOfBounds,

    #[error("Target tile is not reachable from the current position")]
    InvalidMove,

    #[error("Target tile is not jungle")]
    NotJungle,

    #[error("Proof verification failed")]
    ProofFailed,

    #[error("Game has already ended")]
    GameAlreadyEnded,

    #[error("Search target is not an adjacent jungle tile")]
    NotAdjacentJungle,

    #[error("A search is pending; the prey must respond first")]
    SearchPending,

    #[error("No power searches left this round")]
    NoPowerSearches,

    #[error("Prey is not hidden")]
    PreyNotHidden,

    #[error("Prey is already hidden")]
    PreyAlreadyHidden,

    #[error("Target tile is jungle")]
    IsJungle,

    #[error("No EMP charges left this round")]
    NoEmp,

    #[error("EMP cannot target a hidden prey")]
    EmpTargetHidden,

    #[error("No dashes left this round")]
    NoDashes,

    #[error("Prey is frozen and must pass this turn")]
    PreyFrozen,

    #[error("The prey's response window is still open")]
    ResponseWindowOpen,

    #[error("Invalid rules configuration")]
    InvalidRules,

    #[error("A player cannot join their own game")]
    CannotJoinOwnGame,
}

impl HuntError {
    /// Stable numeric code for the rejection.
    pub fn code(&self) -> u32 {
        match self {
            HuntError::GameNotFound => 1,
            HuntError::NotPlayer => 2,
            HuntError::WrongPhase => 3,
            HuntError::NotHunter => 4,
            HuntError::NotPrey => 5,
            HuntError::OutOfBounds => 6,
            HuntError::InvalidMove => 7,
            HuntError::NotJungle => 8,
            HuntError::ProofFailed => 9,
            HuntError::GameAlreadyEnded => 10,
            HuntError::NotAdjacentJungle => 11,
            HuntError::SearchPending => 12,
            HuntError::NoPowerSearches => 13,
            HuntError::PreyNotHidden => 14,
            HuntError::PreyAlreadyHidden => 15,
            HuntError::IsJungle => 16,
            HuntError::NoEmp => 17,
            HuntError::EmpTargetHidden => 18,
            HuntError::NoDashes => 20,
            HuntError::PreyFrozen => 21,
            HuntError::ResponseWindowOpen => 22,
            HuntError::InvalidRules => 23,
            HuntError::CannotJoinOwnGame => 24,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.code() == code)
    }

    const ALL: [HuntError; 23] = [
        HuntError::GameNotFound,
        HuntError::NotPlayer,
        HuntError::WrongPhase,
        HuntError::NotHunter,
        HuntError::NotPrey,
        HuntError::OutOfBounds,
        HuntError::InvalidMove,
        HuntError::NotJungle,
        HuntError::ProofFailed,
        HuntError::GameAlreadyEnded,
        HuntError::NotAdjacentJungle,
        HuntError::SearchPending,
        HuntError::NoPowerSearches,
        HuntError::PreyNotHidden,
        HuntError::PreyAlreadyHidden,
        HuntError::IsJungle,
        HuntError::NoEmp,
        HuntError::EmpTargetHidden,
        HuntError::NoDashes,
        HuntError::PreyFrozen,
        HuntError::ResponseWindowOpen,
        HuntError::InvalidRules,
        HuntError::CannotJoinOwnGame,
    ];
}
