use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tile::{format_tiles, Tile};
use crate::types::Seat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// The turn seat has to draw.
    BeforeDraw,
    /// The turn seat holds 14 (quads as 3) and has to discard or declare.
    AfterDrawMustDiscard,
    /// A discard is pending and other seats may claim it.
    AwaitingCall,
    /// A win was declared.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    Draw,
    Discard,
    Chi,
    Pon,
    Kan,
    ClosedKan,
    AddedKan,
    Tsumo,
    Ron,
    Pass,
}

impl ActionType {
    /// Rank among claims on a discard: Ron 3, Kan and Pon 2, Chi 1.
    /// Everything else is 0.
    pub const fn claim_priority(self) -> u8 {
        match self {
            ActionType::Ron => 3,
            ActionType::Kan | ActionType::Pon => 2,
            ActionType::Chi => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Ordinary or replacement draw. A named tile is pulled from the wall
    /// instead of the drawable end.
    Draw {
        seat: Seat,
        #[serde(default)]
        tile: Option<Tile>,
    },
    Discard {
        seat: Seat,
        tile: Tile,
        /// Riichi declared together with this discard.
        #[serde(default)]
        riichi: bool,
    },
    Chi {
        seat: Seat,
        tile: Tile,
        consumed: [Tile; 2],
    },
    Pon {
        seat: Seat,
        tile: Tile,
        consumed: [Tile; 2],
    },
    /// Quad called from a discard.
    Kan {
        seat: Seat,
        tile: Tile,
        consumed: [Tile; 3],
    },
    ClosedKan {
        seat: Seat,
        tiles: [Tile; 4],
    },
    /// Upgrade of an own called triplet.
    AddedKan { seat: Seat, tile: Tile },
    Tsumo { seat: Seat },
    Ron { seat: Seat },
    /// Decline every claim on the pending discard.
    Pass { seat: Seat },
}

impl Action {
    pub const fn seat(&self) -> Seat {
        match *self {
            Action::Draw { seat, .. }
            | Action::Discard { seat, .. }
            | Action::Chi { seat, .. }
            | Action::Pon { seat, .. }
            | Action::Kan { seat, .. }
            | Action::ClosedKan { seat, .. }
            | Action::AddedKan { seat, .. }
            | Action::Tsumo { seat }
            | Action::Ron { seat }
            | Action::Pass { seat } => seat,
        }
    }

    pub const fn action_type(&self) -> ActionType {
        match self {
            Action::Draw { .. } => ActionType::Draw,
            Action::Discard { .. } => ActionType::Discard,
            Action::Chi { .. } => ActionType::Chi,
            Action::Pon { .. } => ActionType::Pon,
            Action::Kan { .. } => ActionType::Kan,
            Action::ClosedKan { .. } => ActionType::ClosedKan,
            Action::AddedKan { .. } => ActionType::AddedKan,
            Action::Tsumo { .. } => ActionType::Tsumo,
            Action::Ron { .. } => ActionType::Ron,
            Action::Pass { .. } => ActionType::Pass,
        }
    }

    /// Ron, Kan, Pon or Chi on a pending discard.
    pub const fn is_claim(&self) -> bool {
        self.action_type().claim_priority() > 0
    }

    pub const fn claim_priority(&self) -> u8 {
        self.action_type().claim_priority()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Draw { seat, tile: None } => write!(f, "{seat} draws"),
            Action::Draw { seat, tile: Some(t) } => write!(f, "{seat} draws {t}"),
            Action::Discard { seat, tile, riichi: false } => write!(f, "{seat} discards {tile}"),
            Action::Discard { seat, tile, riichi: true } => write!(f, "{seat} declares riichi on {tile}"),
            Action::Chi { seat, tile, consumed } => write!(f, "{seat} chi {tile} with {}", format_tiles(consumed)),
            Action::Pon { seat, tile, consumed } => write!(f, "{seat} pon {tile} with {}", format_tiles(consumed)),
            Action::Kan { seat, tile, consumed } => write!(f, "{seat} kan {tile} with {}", format_tiles(consumed)),
            Action::ClosedKan { seat, tiles } => write!(f, "{seat} closed kan {}", format_tiles(tiles)),
            Action::AddedKan { seat, tile } => write!(f, "{seat} added kan {tile}"),
            Action::Tsumo { seat } => write!(f, "{seat} tsumo"),
            Action::Ron { seat } => write!(f, "{seat} ron"),
            Action::Pass { seat } => write!(f, "{seat} passes"),
        }
    }
}
