use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tile::{Tile, TileKind, EAST, NORTH, SOUTH, WEST};

pub const NUM_SEATS: usize = 4;

/// Fixed player identity. Cyclic order is East, South, West, North.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Seat {
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Seat {
    pub const ALL: [Seat; NUM_SEATS] = [Seat::East, Seat::South, Seat::West, Seat::North];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn from_index(i: usize) -> Seat {
        Seat::ALL[i % NUM_SEATS]
    }

    /// Next seat in turn order (the player to the right).
    pub const fn next(self) -> Seat {
        Seat::from_index(self.index() + 1)
    }

    /// Previous seat in turn order (the player to the left).
    pub const fn prev(self) -> Seat {
        Seat::from_index(self.index() + 3)
    }

    pub const fn opposite(self) -> Seat {
        Seat::from_index(self.index() + 2)
    }

    /// Steps from `self` to `other` in turn order (0-3).
    pub const fn distance_to(self, other: Seat) -> usize {
        (other.index() + NUM_SEATS - self.index()) % NUM_SEATS
    }

    /// Seats after `self` in turn order, excluding `self`.
    pub fn others(self) -> impl Iterator<Item = Seat> {
        (1..NUM_SEATS).map(move |d| Seat::from_index(self.index() + d))
    }

    /// Round-relative wind label; the dealer sits East.
    pub const fn wind_for(self, dealer: Seat) -> Wind {
        Wind::from_index(dealer.distance_to(self))
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Seat::East => "East",
            Seat::South => "South",
            Seat::West => "West",
            Seat::North => "North",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Wind {
    #[default]
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Wind {
    pub const fn from_index(i: usize) -> Wind {
        match i % NUM_SEATS {
            0 => Wind::East,
            1 => Wind::South,
            2 => Wind::West,
            _ => Wind::North,
        }
    }

    /// Honor kind of this wind.
    pub const fn kind(self) -> TileKind {
        match self {
            Wind::East => EAST,
            Wind::South => SOUTH,
            Wind::West => WEST,
            Wind::North => NORTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Melds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuadKind {
    /// Four tiles from the hand.
    Concealed,
    /// Three tiles from the hand plus a discard.
    Called,
    /// A called triplet upgraded with the fourth tile.
    Added,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeldKind {
    Sequence,
    Triplet,
    Quad(QuadKind),
}

impl MeldKind {
    pub const fn size(self) -> usize {
        match self {
            MeldKind::Quad(_) => 4,
            _ => 3,
        }
    }

    /// Short label used in signatures and collaborator requests.
    pub const fn label(self) -> &'static str {
        match self {
            MeldKind::Sequence => "CHI",
            MeldKind::Triplet => "PON",
            MeldKind::Quad(QuadKind::Concealed) => "ANKAN",
            MeldKind::Quad(QuadKind::Called) => "MINKAN",
            MeldKind::Quad(QuadKind::Added) => "KAKAN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub kind: MeldKind,
    /// Tiles in display order; the called tile sits at its rotated position.
    pub tiles: Vec<Tile>,
    pub owner: Seat,
    #[serde(default)]
    pub called_from: Option<Seat>,
    #[serde(default)]
    pub called_tile: Option<Tile>,
}

impl Meld {
    /// Meld formed from a discard. `consumed` comes from the caller's hand and
    /// the called tile is inserted by the discarder's position: leftmost when
    /// called from the left, in the middle from across, rightmost from the
    /// right.
    pub fn called(kind: MeldKind, owner: Seat, from: Seat, called: Tile, consumed: &[Tile]) -> Self {
        let mut tiles = consumed.to_vec();
        tiles.sort();
        let idx = if kind == MeldKind::Sequence || from == owner.prev() {
            0
        } else if from == owner.opposite() {
            1
        } else {
            tiles.len()
        };
        tiles.insert(idx, called);
        Meld {
            kind,
            tiles,
            owner,
            called_from: Some(from),
            called_tile: Some(called),
        }
    }

    pub fn concealed_quad(owner: Seat, tiles: [Tile; 4]) -> Self {
        let mut tiles = tiles.to_vec();
        tiles.sort();
        Meld {
            kind: MeldKind::Quad(QuadKind::Concealed),
            tiles,
            owner,
            called_from: None,
            called_tile: None,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.kind != MeldKind::Quad(QuadKind::Concealed)
    }

    #[inline]
    pub fn is_quad(&self) -> bool {
        matches!(self.kind, MeldKind::Quad(_))
    }

    /// Tiles this meld contributes to a hand count; a quad counts as three.
    pub fn counted_len(&self) -> usize {
        self.tiles.len().min(3)
    }

    /// Folded kind of the first tile; for triplets and quads, the meld's kind.
    pub fn base_kind(&self) -> Option<TileKind> {
        self.tiles.iter().map(|t| t.kind()).min()
    }

    /// Whether the folded tiles form a legal group for `kind`.
    pub fn has_valid_shape(&self) -> bool {
        if self.tiles.len() != self.kind.size() {
            return false;
        }
        let mut kinds: Vec<TileKind> = self.tiles.iter().map(|t| t.kind()).collect();
        kinds.sort();
        match self.kind {
            MeldKind::Sequence => {
                let first = kinds[0];
                first.offset(1) == Some(kinds[1]) && first.offset(2) == Some(kinds[2])
            }
            MeldKind::Triplet | MeldKind::Quad(_) => kinds.iter().all(|&k| k == kinds[0]),
        }
    }

    /// Stable signature of kind, folded tiles and called seat.
    pub fn signature(&self) -> String {
        let mut kinds: Vec<TileKind> = self.tiles.iter().map(|t| t.kind()).collect();
        kinds.sort();
        let tiles: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        let from = self
            .called_from
            .map(|s| s.index().to_string())
            .unwrap_or_default();
        format!("{}:{}:{}", self.kind.label(), tiles.join(""), from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_tile_list;

    #[test]
    fn seat_cycle() {
        assert_eq!(Seat::East.next(), Seat::South);
        assert_eq!(Seat::East.prev(), Seat::North);
        assert_eq!(Seat::South.opposite(), Seat::North);
        assert_eq!(Seat::West.distance_to(Seat::East), 2);
        let others: Vec<Seat> = Seat::West.others().collect();
        assert_eq!(others, vec![Seat::North, Seat::East, Seat::South]);
    }

    #[test]
    fn wind_relative_to_dealer() {
        assert_eq!(Seat::South.wind_for(Seat::South), Wind::East);
        assert_eq!(Seat::East.wind_for(Seat::South), Wind::North);
        assert_eq!(Seat::North.wind_for(Seat::East), Wind::North);
        assert_eq!(Wind::West.kind().to_string(), "W");
    }

    #[test]
    fn called_tile_position_follows_discarder() {
        // The called tile is the only red five, so its index is observable.
        let red = |meld: &Meld| meld.tiles.iter().position(|t| t.is_red());
        let owner = Seat::South;

        let consumed = parse_tile_list("5p,5p").unwrap();
        let called = parse_tile_list("0p").unwrap()[0];
        let left = Meld::called(MeldKind::Triplet, owner, Seat::East, called, &consumed);
        assert_eq!(left.tiles.len(), 3);
        assert_eq!(left.tiles[0], called);
        assert_eq!(red(&left), Some(0));
        assert_eq!(left.called_from, Some(Seat::East));

        let kan_consumed = parse_tile_list("5p,5p,5p").unwrap();
        let across = Meld::called(MeldKind::Quad(QuadKind::Called), owner, Seat::North, called, &kan_consumed);
        assert_eq!(across.tiles[1], called);
        assert_eq!(red(&across), Some(1));

        let chi_consumed = parse_tile_list("6m,4m").unwrap();
        let chi_tile = parse_tile_list("5m").unwrap()[0];
        let chi = Meld::called(MeldKind::Sequence, owner, Seat::East, chi_tile, &chi_consumed);
        assert_eq!(chi.tiles[0], chi_tile);
        assert!(chi.has_valid_shape());

        let right_consumed = parse_tile_list("5s,5s").unwrap();
        let right_tile = parse_tile_list("0s").unwrap()[0];
        let right = Meld::called(MeldKind::Triplet, owner, Seat::West, right_tile, &right_consumed);
        assert_eq!(right.called_tile, Some(right_tile));
        assert_eq!(right.tiles.len(), 3);
        assert_eq!(right.tiles[2], right_tile);
        assert_eq!(red(&right), Some(2));
    }

    #[test]
    fn shape_checks() {
        let bad_run = Meld {
            kind: MeldKind::Sequence,
            tiles: parse_tile_list("8m,9m,1p").unwrap(),
            owner: Seat::East,
            called_from: None,
            called_tile: None,
        };
        assert!(!bad_run.has_valid_shape());
        let honors = Meld {
            kind: MeldKind::Sequence,
            tiles: parse_tile_list("E,S,W").unwrap(),
            ..bad_run.clone()
        };
        assert!(!honors.has_valid_shape());
        let quad = Meld::concealed_quad(Seat::East, {
            let t = parse_tile_list("0s,5s,5s,5s").unwrap();
            [t[0], t[1], t[2], t[3]]
        });
        assert!(quad.has_valid_shape());
        assert!(!quad.is_open());
        assert_eq!(quad.counted_len(), 3);
        assert_eq!(quad.signature(), "ANKAN:5s5s5s5s:");
    }
}
