use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{Action, Phase};
use crate::state::GameState;
use crate::tile::{count_keys, CountKey, NUM_TILES};
use crate::types::Seat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    /// More instances of one accounting key than physically exist.
    OverLimit { tile: String, count: usize, limit: usize },
    /// Total instances differ from 136.
    TotalCount { count: usize },
    /// A seat holds the wrong number of tiles for the phase.
    HandCount { seat: Seat, expected: usize, actual: usize },
    /// Riichi declared while holding an open meld.
    RiichiWithOpenMeld { seat: Seat },
    /// A meld whose tiles do not form its group.
    MeldShape { seat: Seat, meld: String },
    /// A chi claim from a seat other than the discarder's next seat.
    ChiOutOfOrder { seat: Seat, discarder: Seat },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OverLimit { tile, count, limit } => {
                write!(f, "{count} x {tile} exceeds limit {limit}")
            }
            Violation::TotalCount { count } => write!(f, "{count} tiles in play, expected {NUM_TILES}"),
            Violation::HandCount { seat, expected, actual } => {
                write!(f, "{seat} holds {actual} tiles, expected {expected}")
            }
            Violation::RiichiWithOpenMeld { seat } => write!(f, "{seat} is in riichi with an open meld"),
            Violation::MeldShape { seat, meld } => write!(f, "{seat} has malformed meld {meld}"),
            Violation::ChiOutOfOrder { seat, discarder } => {
                write!(f, "{seat} may not chi from {discarder}")
            }
        }
    }
}

/// Per-key limits and the 136 total across hands, drawn tiles, melds,
/// discards, indicators and wall. Call markers are not counted.
pub fn check_conservation(state: &GameState) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut total = 0usize;
    let counts = count_keys(state.all_instances().inspect(|_| total += 1));
    for key in CountKey::all() {
        let count = counts[key.index()];
        if count > key.limit() {
            violations.push(Violation::OverLimit {
                tile: key.tile().to_string(),
                count,
                limit: key.limit(),
            });
        }
    }
    if total != NUM_TILES {
        violations.push(Violation::TotalCount { count: total });
    }
    violations
}

/// Tiles held per seat, counting quads as three: 14 for the seat that has to
/// discard, 13 for everyone else. A seat owed a replacement draw expects 13.
/// Also flags riichi with open melds.
pub fn check_hand_counts(state: &GameState) -> Vec<Violation> {
    let mut violations = Vec::new();
    for seat in Seat::ALL {
        let p = state.player(seat);
        let must_discard = state.phase == Phase::AfterDrawMustDiscard && state.turn == seat;
        let expected = if must_discard && state.awaiting_replacement != Some(seat) {
            14
        } else {
            13
        };
        let actual = p.counted_tiles();
        if actual != expected {
            violations.push(Violation::HandCount {
                seat,
                expected,
                actual,
            });
        }
        if p.riichi && p.has_open_meld() {
            violations.push(Violation::RiichiWithOpenMeld { seat });
        }
    }
    violations
}

pub fn check_meld_shapes(state: &GameState) -> Vec<Violation> {
    Seat::ALL
        .iter()
        .flat_map(|&seat| {
            state
                .player(seat)
                .melds
                .iter()
                .filter(|m| !m.has_valid_shape())
                .map(move |m| Violation::MeldShape {
                    seat,
                    meld: m.signature(),
                })
        })
        .collect()
}

pub fn check_pending_claims(state: &GameState) -> Vec<Violation> {
    let Some(discard) = state.last_discard else {
        return Vec::new();
    };
    state
        .pending_claims
        .iter()
        .filter_map(|claim| match claim {
            Action::Chi { seat, .. } if *seat != discard.seat.next() => Some(Violation::ChiOutOfOrder {
                seat: *seat,
                discarder: discard.seat,
            }),
            _ => None,
        })
        .collect()
}

impl GameState {
    /// Every check, in a fixed order.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = check_conservation(self);
        if self.phase != Phase::Ended {
            violations.extend(check_hand_counts(self));
        }
        violations.extend(check_meld_shapes(self));
        violations.extend(check_pending_claims(self));
        violations
    }
}
