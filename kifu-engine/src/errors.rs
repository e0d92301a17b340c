use thiserror::Error;

use crate::state::invariants::Violation;
use crate::types::Seat;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KifuError {
    /// The live wall has no tile left for the requested draw.
    #[error("wall is empty")]
    WallEmpty,
    /// A named tile is not in the wall.
    #[error("tile {tile} is not in the wall")]
    TileNotInWall { tile: String },
    /// The acting seat does not hold the tiles the action names.
    #[error("{seat} does not hold {tiles}")]
    TileNotAvailable { seat: Seat, tiles: String },
    /// Action attempted outside its phase or by the wrong seat.
    #[error("illegal action: {message}")]
    IllegalAction { message: String },
    /// Conservation or hand-count breach detected on a strict state.
    #[error("invariant violation: {}", join_violations(.violations))]
    InvariantViolation { violations: Vec<Violation> },
    /// A tenpai or scoring query failed, timed out or has not been run.
    /// Retrying the query may succeed.
    #[error("{seat} capability unknown: {reason}")]
    CapabilityUnavailable { seat: Seat, reason: String },
    /// The scoring collaborator reported no han for every request variant.
    #[error("no winning hand for {seat}: {reason}")]
    NoWinningHand { seat: Seat, reason: String },
    /// More tiles of one accounting key are in play than physically exist.
    #[error("too many {tile}: {count} in play, limit {limit}")]
    TileLimitExceeded { tile: String, count: usize, limit: usize },
    /// Tile or hand string parsing failed.
    #[error("parse error on '{input}': {message}")]
    Parse { input: String, message: String },
    /// Rule configuration could not be loaded.
    #[error("config error: {message}")]
    Config { message: String },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl KifuError {
    pub fn illegal(message: impl Into<String>) -> Self {
        KifuError::IllegalAction {
            message: message.into(),
        }
    }

    /// Whether the operator can reasonably retry the same action later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KifuError::CapabilityUnavailable { .. })
    }
}

pub type KifuResult<T> = Result<T, KifuError>;
