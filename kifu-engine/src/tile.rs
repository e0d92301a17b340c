//! Tile identity, red-five folding, ordering and accounting keys.
//!
//! A [`Tile`] is one physical instance: a [`TileKind`] (34 kinds) plus a red
//! flag that is only valid on suited fives. Matching and counting use the
//! folded kind; conservation uses the [`CountKey`], which keeps the red five
//! apart so its limit of one can be enforced.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{KifuError, KifuResult};
use crate::parser;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Distinct tile kinds (0-33).
pub const NUM_KINDS: usize = 34;

/// Physical tiles in a full set.
pub const NUM_TILES: usize = 136;

/// Accounting keys: 34 plain kinds plus one red five per suit.
pub const NUM_COUNT_KEYS: usize = 37;

const NUM_SUITED_RANKS: u8 = 9;
const HONOR_START: u8 = 27;

pub const EAST: TileKind = TileKind(27);
pub const SOUTH: TileKind = TileKind(28);
pub const WEST: TileKind = TileKind(29);
pub const NORTH: TileKind = TileKind(30);

// ---------------------------------------------------------------------------
// Suit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Man,
    Pin,
    Sou,
    Honor,
}

impl Suit {
    /// First kind index of this suit.
    #[inline]
    pub const fn start(self) -> u8 {
        match self {
            Suit::Man => 0,
            Suit::Pin => 9,
            Suit::Sou => 18,
            Suit::Honor => HONOR_START,
        }
    }

    /// Suffix letter used in compact notation.
    pub const fn letter(self) -> char {
        match self {
            Suit::Man => 'm',
            Suit::Pin => 'p',
            Suit::Sou => 's',
            Suit::Honor => 'z',
        }
    }
}

// ---------------------------------------------------------------------------
// TileKind
// ---------------------------------------------------------------------------

/// A folded tile kind in the range 0-33. Honors run E S W N P F C.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileKind(u8);

impl TileKind {
    #[inline]
    pub const fn new(id: u8) -> Option<Self> {
        if id < NUM_KINDS as u8 {
            Some(TileKind(id))
        } else {
            None
        }
    }

    /// Kind for a 1-based rank in a suit; honors take 1-7.
    pub const fn from_suit_rank(suit: Suit, rank: u8) -> Option<Self> {
        let max = match suit {
            Suit::Honor => 7,
            _ => NUM_SUITED_RANKS,
        };
        if rank == 0 || rank > max {
            return None;
        }
        Some(TileKind(suit.start() + rank - 1))
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn suit(self) -> Suit {
        match self.0 {
            0..9 => Suit::Man,
            9..18 => Suit::Pin,
            18..27 => Suit::Sou,
            _ => Suit::Honor,
        }
    }

    /// 1-based rank within the suit (1-9), or 1-7 for honors.
    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 - self.suit().start() + 1
    }

    /// Suited rank, or `None` for honors.
    #[inline]
    pub const fn number(self) -> Option<u8> {
        if self.is_honor() {
            None
        } else {
            Some(self.rank())
        }
    }

    #[inline]
    pub const fn is_honor(self) -> bool {
        self.0 >= HONOR_START
    }

    #[inline]
    pub const fn is_five(self) -> bool {
        !self.is_honor() && self.rank() == 5
    }

    /// Kind `delta` ranks away in the same suit, if it exists. Honors have no
    /// neighbours.
    pub fn offset(self, delta: i8) -> Option<Self> {
        let n = self.number()? as i8 + delta;
        if (1..=9).contains(&n) {
            TileKind::from_suit_rank(self.suit(), n as u8)
        } else {
            None
        }
    }

    /// The kind a dora indicator of this kind points at.
    pub fn next_dora(self) -> Self {
        let (start, len) = match self.suit() {
            Suit::Honor if self.0 < 31 => (HONOR_START, 4),
            Suit::Honor => (31, 3),
            suit => (suit.start(), NUM_SUITED_RANKS),
        };
        TileKind(start + (self.0 - start + 1) % len)
    }

    pub fn all() -> impl Iterator<Item = TileKind> {
        (0..NUM_KINDS as u8).map(TileKind)
    }
}

impl fmt::Debug for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileKind({}={})", self.0, self)
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Tile::plain(*self))
    }
}

impl TryFrom<String> for TileKind {
    type Error = KifuError;

    fn try_from(value: String) -> KifuResult<Self> {
        parser::parse_tile(&value).map(|t| t.kind())
    }
}

impl From<TileKind> for String {
    fn from(kind: TileKind) -> String {
        kind.to_string()
    }
}

// ---------------------------------------------------------------------------
// CountKey
// ---------------------------------------------------------------------------

/// Conservation bucket. Keys 0-33 are plain kinds, 34-36 the red fives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountKey(u8);

impl CountKey {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_red(self) -> bool {
        self.0 >= NUM_KINDS as u8
    }

    /// Physical copies available under this key.
    pub const fn limit(self) -> usize {
        if self.is_red() {
            1
        } else if TileKind(self.0).is_five() {
            3
        } else {
            4
        }
    }

    /// Representative tile for this key.
    pub fn tile(self) -> Tile {
        if self.is_red() {
            let suit = match self.0 - NUM_KINDS as u8 {
                0 => Suit::Man,
                1 => Suit::Pin,
                _ => Suit::Sou,
            };
            Tile {
                kind: TileKind(suit.start() + 4),
                red: true,
            }
        } else {
            Tile::plain(TileKind(self.0))
        }
    }

    pub fn all() -> impl Iterator<Item = CountKey> {
        (0..NUM_COUNT_KEYS as u8).map(CountKey)
    }
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// One physical tile instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tile {
    kind: TileKind,
    red: bool,
}

impl Tile {
    pub const fn plain(kind: TileKind) -> Self {
        Tile { kind, red: false }
    }

    /// Red five of `suit`. Honors have no red variant.
    pub const fn red_five(suit: Suit) -> Option<Self> {
        match suit {
            Suit::Honor => None,
            _ => Some(Tile {
                kind: TileKind(suit.start() + 4),
                red: true,
            }),
        }
    }

    /// Validated constructor: `red` is only accepted on suited fives.
    pub fn new(kind: TileKind, red: bool) -> Option<Self> {
        if red && !kind.is_five() {
            None
        } else {
            Some(Tile { kind, red })
        }
    }

    /// Folded kind used for matching and counting.
    #[inline]
    pub const fn kind(self) -> TileKind {
        self.kind
    }

    #[inline]
    pub const fn is_red(self) -> bool {
        self.red
    }

    /// Same tile with the red flag cleared.
    #[inline]
    pub const fn folded(self) -> Tile {
        Tile::plain(self.kind)
    }

    /// Rank-equality: red five equals plain five.
    #[inline]
    pub fn rank_eq(self, other: Tile) -> bool {
        self.kind == other.kind
    }

    pub const fn count_key(self) -> CountKey {
        if self.red {
            CountKey(NUM_KINDS as u8 + self.kind.suit() as u8)
        } else {
            CountKey(self.kind.0)
        }
    }

    /// All 136 instances in kind order.
    pub fn full_set() -> Vec<Tile> {
        let mut tiles = Vec::with_capacity(NUM_TILES);
        for key in CountKey::all() {
            let tile = key.tile();
            tiles.extend(std::iter::repeat_n(tile, key.limit()));
        }
        tiles.sort();
        tiles
    }
}

impl Ord for Tile {
    /// Suit, then rank, then red before plain. Honors follow E S W N P F C.
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .cmp(&other.kind)
            .then_with(|| other.red.cmp(&self.red))
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suit = self.kind.suit();
        if suit == Suit::Honor {
            return f.write_str(HONOR_NAMES[(self.kind.rank() - 1) as usize]);
        }
        let rank = if self.red { 0 } else { self.kind.rank() };
        write!(f, "{}{}", rank, suit.letter())
    }
}

impl TryFrom<String> for Tile {
    type Error = KifuError;

    fn try_from(value: String) -> KifuResult<Self> {
        parser::parse_tile(&value)
    }
}

impl From<Tile> for String {
    fn from(tile: Tile) -> String {
        tile.to_string()
    }
}

pub(crate) const HONOR_NAMES: [&str; 7] = ["E", "S", "W", "N", "P", "F", "C"];

/// Formats tiles as a comma separated list.
pub fn format_tiles(tiles: &[Tile]) -> String {
    tiles
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Per-key instance counts.
pub fn count_keys<'a>(tiles: impl IntoIterator<Item = &'a Tile>) -> [usize; NUM_COUNT_KEYS] {
    let mut counts = [0usize; NUM_COUNT_KEYS];
    for tile in tiles {
        counts[tile.count_key().index()] += 1;
    }
    counts
}

/// Per-kind instance counts with red fives folded.
pub fn count_kinds<'a>(tiles: impl IntoIterator<Item = &'a Tile>) -> [u8; NUM_KINDS] {
    let mut counts = [0u8; NUM_KINDS];
    for tile in tiles {
        counts[tile.kind().id() as usize] += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
