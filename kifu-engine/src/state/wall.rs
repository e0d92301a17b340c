use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{KifuError, KifuResult};
use crate::seeding::fisher_yates_shuffle;
use crate::tile::{count_keys, CountKey, Tile, NUM_TILES};

/// Tiles reserved for indicators and replacement draws.
pub const DEAD_WALL_SIZE: usize = 14;

/// How `draw_specific` matches the requested tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMatch {
    Exact,
    /// Exact first, then any rank-equal tile (red five for plain five).
    RankEqual,
}

/// Live wall plus dead wall.
///
/// Draws come off the end of `live`. The reserved end is the dead wall, or
/// the front of `live` once the dead wall has been folded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallState {
    pub live: Vec<Tile>,
    #[serde(default)]
    pub dead: Vec<Tile>,
    #[serde(default)]
    pub folded: bool,
}

impl WallState {
    /// Builds the complement of `in_play` and shuffles it.
    ///
    /// With an empty `in_play` this is the full 136-tile set. The dead wall is
    /// split off the front unless `fold_dead_wall` is set or too few tiles
    /// remain to fill it.
    pub fn build_shuffled(in_play: &[Tile], rng: &mut impl Rng, fold_dead_wall: bool) -> KifuResult<Self> {
        let counts = count_keys(in_play);
        let mut live = Vec::with_capacity(NUM_TILES.saturating_sub(in_play.len()));
        for key in CountKey::all() {
            let used = counts[key.index()];
            if used > key.limit() {
                return Err(KifuError::TileLimitExceeded {
                    tile: key.tile().to_string(),
                    count: used,
                    limit: key.limit(),
                });
            }
            live.extend(std::iter::repeat_n(key.tile(), key.limit() - used));
        }
        fisher_yates_shuffle(&mut live, rng);

        let folded = fold_dead_wall || live.len() < DEAD_WALL_SIZE;
        let dead = if folded {
            Vec::new()
        } else {
            live.drain(..DEAD_WALL_SIZE).collect()
        };
        Ok(Self { live, dead, folded })
    }

    /// A wall whose order was recorded elsewhere. The dead wall is folded.
    pub fn from_recorded(tiles: Vec<Tile>) -> Self {
        Self {
            live: tiles,
            dead: Vec::new(),
            folded: true,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live.len() + self.dead.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty() && self.dead.is_empty()
    }

    /// Tiles still drawable by ordinary draws.
    #[inline]
    pub fn remaining_draws(&self) -> usize {
        self.live.len()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.live.iter().chain(self.dead.iter())
    }

    pub fn draw(&mut self) -> KifuResult<Tile> {
        self.live.pop().ok_or(KifuError::WallEmpty)
    }

    /// Removes a named tile. Searches the live wall, then the dead wall.
    pub fn draw_specific(&mut self, tile: Tile, matching: DrawMatch) -> KifuResult<Tile> {
        if let Some(found) = self.remove_where(|t| *t == tile) {
            return Ok(found);
        }
        if matching == DrawMatch::RankEqual {
            if let Some(found) = self.remove_where(|t| t.rank_eq(tile)) {
                return Ok(found);
            }
        }
        Err(KifuError::TileNotInWall {
            tile: tile.to_string(),
        })
    }

    fn remove_where(&mut self, pred: impl Fn(&Tile) -> bool) -> Option<Tile> {
        if let Some(idx) = self.live.iter().rposition(&pred) {
            return Some(self.live.remove(idx));
        }
        let idx = self.dead.iter().rposition(&pred)?;
        Some(self.dead.remove(idx))
    }

    /// Takes one tile from the reserved end.
    pub fn take_reserved(&mut self) -> Option<Tile> {
        if let Some(tile) = self.dead.pop() {
            return Some(tile);
        }
        if self.live.is_empty() {
            None
        } else {
            Some(self.live.remove(0))
        }
    }

    pub fn replacement_available(&self) -> bool {
        !self.dead.is_empty() || !self.live.is_empty()
    }

    /// Replacement draw after a quad.
    pub fn draw_replacement(&mut self) -> KifuResult<Tile> {
        self.take_reserved().ok_or(KifuError::WallEmpty)
    }

    /// The wall as one folded sequence: reserved end first, in the order it
    /// gives up replacement tiles, ordinary draws off the back.
    pub fn folded_order(&self) -> impl Iterator<Item = &Tile> {
        self.dead.iter().rev().chain(self.live.iter())
    }

    /// Hex SHA-256 over [`WallState::folded_order`]. A split wall and its
    /// folded copy digest the same.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for tile in self.folded_order() {
            hasher.update(tile.to_string().as_bytes());
            hasher.update(b",");
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_tile, parse_tile_list};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(11)
    }

    #[test]
    fn full_wall_has_every_tile() {
        let wall = WallState::build_shuffled(&[], &mut rng(), false).unwrap();
        assert_eq!(wall.len(), NUM_TILES);
        assert_eq!(wall.dead.len(), DEAD_WALL_SIZE);
        let all: Vec<Tile> = wall.tiles().copied().collect();
        let counts = count_keys(&all);
        for key in CountKey::all() {
            assert_eq!(counts[key.index()], key.limit());
        }
    }

    #[test]
    fn wall_is_complement_of_in_play() {
        let in_play = parse_tile_list("0m,5m,5m,5m,E,E").unwrap();
        let wall = WallState::build_shuffled(&in_play, &mut rng(), true).unwrap();
        assert!(wall.folded && wall.dead.is_empty());
        assert_eq!(wall.len(), NUM_TILES - in_play.len());
        assert!(!wall.tiles().any(|t| t.kind() == in_play[0].kind()));
        assert_eq!(wall.tiles().filter(|t| t.to_string() == "E").count(), 2);
    }

    #[test]
    fn over_limit_in_play_fails() {
        let in_play = parse_tile_list("0m,0m").unwrap();
        let err = WallState::build_shuffled(&in_play, &mut rng(), true).unwrap_err();
        assert!(matches!(err, KifuError::TileLimitExceeded { limit: 1, .. }));
    }

    #[test]
    fn same_rng_same_wall() {
        let a = WallState::build_shuffled(&[], &mut rng(), false).unwrap();
        let b = WallState::build_shuffled(&[], &mut rng(), false).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn draw_until_empty() {
        let mut wall = WallState::from_recorded(parse_tile_list("1m,2m").unwrap());
        assert_eq!(wall.draw().unwrap().to_string(), "2m");
        assert_eq!(wall.draw().unwrap().to_string(), "1m");
        assert_eq!(wall.draw(), Err(KifuError::WallEmpty));
    }

    #[test]
    fn specific_draw_falls_back_to_rank_equal_only_on_request() {
        let mut wall = WallState::from_recorded(parse_tile_list("0p,3s").unwrap());
        let plain = parse_tile("5p").unwrap();
        assert!(matches!(
            wall.draw_specific(plain, DrawMatch::Exact),
            Err(KifuError::TileNotInWall { .. })
        ));
        let got = wall.draw_specific(plain, DrawMatch::RankEqual).unwrap();
        assert!(got.is_red());
        assert_eq!(wall.len(), 1);
    }

    #[test]
    fn reserved_end_prefers_dead_wall() {
        let mut wall = WallState {
            live: parse_tile_list("1m,2m").unwrap(),
            dead: parse_tile_list("9s").unwrap(),
            folded: false,
        };
        assert_eq!(wall.draw_replacement().unwrap().to_string(), "9s");
        assert_eq!(wall.draw_replacement().unwrap().to_string(), "1m");
        assert_eq!(wall.draw().unwrap().to_string(), "2m");
        assert!(!wall.replacement_available());
        assert_eq!(wall.draw_replacement(), Err(KifuError::WallEmpty));
    }

    #[test]
    fn digest_ignores_the_dead_wall_split() {
        let mut split = WallState::build_shuffled(&[], &mut rng(), false).unwrap();
        let mut folded = WallState::from_recorded(split.folded_order().copied().collect());
        assert_eq!(split.digest(), folded.digest());

        assert_eq!(split.draw_replacement(), folded.draw_replacement());
        assert_eq!(split.draw(), folded.draw());
        assert_eq!(split.digest(), folded.digest());

        folded.draw().unwrap();
        assert_ne!(split.digest(), folded.digest());
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]

        #[test]
        fn complement_restores_the_full_set(seed in 0u64..10_000, taken in 0usize..=NUM_TILES) {
            let mut all = Tile::full_set();
            fisher_yates_shuffle(&mut all, &mut ChaCha8Rng::seed_from_u64(seed));
            let in_play = &all[..taken];
            let wall = WallState::build_shuffled(in_play, &mut rng(), false).unwrap();
            proptest::prop_assert_eq!(wall.len(), NUM_TILES - taken);
            let counts = count_keys(in_play.iter().chain(wall.tiles()));
            for key in CountKey::all() {
                proptest::prop_assert_eq!(counts[key.index()], key.limit());
            }
        }
    }
}
