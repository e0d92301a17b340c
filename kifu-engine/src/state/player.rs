use serde::{Deserialize, Serialize};

use crate::tile::Tile;
use crate::types::Meld;

/// Where the tile in the drawn slot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrawOrigin {
    Wall,
    /// Replacement draw after a quad.
    Replacement,
    /// Marker for the tile just claimed. The instance lives in the meld, so
    /// it is not counted, discarded or declared as tsumo.
    Call,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnTile {
    pub tile: Tile,
    pub origin: DrawOrigin,
}

impl DrawnTile {
    #[inline]
    pub fn is_call_marker(&self) -> bool {
        self.origin == DrawOrigin::Call
    }
}

/// Insert `tile` into a sorted hand, maintaining sort order.
#[inline]
pub(crate) fn sorted_insert(hand: &mut Vec<Tile>, tile: Tile) {
    let pos = hand.partition_point(|&t| t < tile);
    hand.insert(pos, tile);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Concealed tiles, kept sorted. Excludes the drawn slot.
    pub hand: Vec<Tile>,
    pub drawn: Option<DrawnTile>,
    pub melds: Vec<Meld>,
    pub discards: Vec<Tile>,
    pub riichi: bool,
    pub ippatsu: bool,
    pub closed: bool,
    /// Permanent furiten: a riichi seat let a winning tile pass.
    pub furiten: bool,
    /// Cleared on the seat's next draw.
    pub furiten_temp: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerState {
    pub fn new() -> Self {
        Self {
            hand: Vec::with_capacity(14),
            drawn: None,
            melds: Vec::new(),
            discards: Vec::new(),
            riichi: false,
            ippatsu: false,
            closed: true,
            furiten: false,
            furiten_temp: false,
        }
    }

    pub fn with_hand(mut hand: Vec<Tile>) -> Self {
        hand.sort();
        Self {
            hand,
            ..Self::new()
        }
    }

    /// The drawn tile, unless it is only a call marker.
    pub fn live_drawn(&self) -> Option<DrawnTile> {
        self.drawn.filter(|d| !d.is_call_marker())
    }

    /// Concealed hand plus the live drawn tile.
    pub fn held(&self) -> impl Iterator<Item = &Tile> {
        let drawn = self.drawn.as_ref().filter(|d| !d.is_call_marker()).map(|d| &d.tile);
        self.hand.iter().chain(drawn)
    }

    /// Tile count against the 13/14 expectation. Quads count as three.
    pub fn counted_tiles(&self) -> usize {
        self.held().count() + self.melds.iter().map(Meld::counted_len).sum::<usize>()
    }

    /// Every physical instance this seat owns, for conservation.
    pub fn instances(&self) -> impl Iterator<Item = &Tile> {
        self.held()
            .chain(self.melds.iter().flat_map(|m| m.tiles.iter()))
            .chain(self.discards.iter())
    }

    pub fn has_open_meld(&self) -> bool {
        self.melds.iter().any(Meld::is_open)
    }

    pub fn holds(&self, tile: Tile) -> bool {
        self.held().any(|&t| t == tile)
    }

    /// Removes the exact instances in `tiles` from hand or live drawn slot.
    /// Leaves the player untouched and returns `false` if any is missing.
    pub fn remove_held(&mut self, tiles: &[Tile]) -> bool {
        let mut hand = self.hand.clone();
        let mut drawn = self.live_drawn();
        for &tile in tiles {
            if let Some(idx) = hand.iter().position(|&t| t == tile) {
                hand.remove(idx);
            } else if drawn.is_some_and(|d| d.tile == tile) {
                drawn = None;
            } else {
                return false;
            }
        }
        self.hand = hand;
        if self.live_drawn().is_some() {
            self.drawn = drawn;
        }
        true
    }

    /// Moves a live drawn tile into the hand and clears the slot.
    pub fn merge_drawn(&mut self) {
        if let Some(d) = self.drawn.take() {
            if !d.is_call_marker() {
                sorted_insert(&mut self.hand, d.tile);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_tile, parse_tile_list};

    fn t(s: &str) -> Tile {
        parse_tile(s).unwrap()
    }

    #[test]
    fn sorted_insert_keeps_order() {
        let mut hand = parse_tile_list("1m,5m,E").unwrap();
        sorted_insert(&mut hand, t("0m"));
        sorted_insert(&mut hand, t("9p"));
        assert_eq!(crate::tile::format_tiles(&hand), "1m,0m,5m,9p,E");
    }

    #[test]
    fn remove_held_is_all_or_nothing() {
        let mut p = PlayerState::with_hand(parse_tile_list("1m,2m,3m").unwrap());
        p.drawn = Some(DrawnTile { tile: t("4m"), origin: DrawOrigin::Wall });
        assert!(!p.remove_held(&[t("1m"), t("9m")]));
        assert_eq!(p.hand.len(), 3);
        assert!(p.remove_held(&[t("1m"), t("4m")]));
        assert_eq!(p.hand.len(), 2);
        assert!(p.drawn.is_none());
    }

    #[test]
    fn call_marker_is_not_held() {
        let mut p = PlayerState::with_hand(parse_tile_list("1m,2m").unwrap());
        p.drawn = Some(DrawnTile { tile: t("3m"), origin: DrawOrigin::Call });
        assert_eq!(p.held().count(), 2);
        assert!(!p.holds(t("3m")));
        assert!(!p.remove_held(&[t("3m")]));
        p.merge_drawn();
        assert_eq!(p.hand.len(), 2);
        assert!(p.drawn.is_none());
    }
}
