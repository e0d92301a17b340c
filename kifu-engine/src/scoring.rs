//! Win scoring through the external hand scorer.
//!
//! Scorers disagree on how melds should be described, so a win is scored
//! against a fixed list of meld encodings and tile spellings until one of
//! them yields at least one han.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborator::{Cost, HandScorer, ScoreMeld, ScoreRequest, ScoreResponse, WinType};
use crate::errors::{KifuError, KifuResult};
use crate::state::GameState;
use crate::tile::Tile;
use crate::types::{Meld, MeldKind, Seat, NUM_SEATS};

/// Full hand size the scorer expects, winning tile included.
const SCORED_TILES: usize = 14;

/// A settled win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    pub seat: Seat,
    pub win_type: WinType,
    /// Discarder on ron.
    pub from: Option<Seat>,
    pub win_tile: Tile,
    pub response: ScoreResponse,
    /// Point changes per seat, riichi pot included.
    pub deltas: [i32; NUM_SEATS],
}

// ---------------------------------------------------------------------------
// Request variants
// ---------------------------------------------------------------------------

/// What to do with the called tile inside a meld's tile list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalledTileMode {
    Keep,
    /// Append the called tile if no rank-equal tile is listed.
    Force,
    /// Drop the first rank-equal tile.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeldVariant {
    /// Label every quad `KAN` instead of `ANKAN`/`MINKAN`/`KAKAN`.
    pub collapse_quads: bool,
    pub called_tile: CalledTileMode,
    /// Send `calledTile`/`calledFrom`.
    pub called_fields: bool,
}

/// Meld encodings in the order they are tried. The first is the base form.
pub const MELD_VARIANTS: [MeldVariant; 5] = [
    MeldVariant {
        collapse_quads: false,
        called_tile: CalledTileMode::Keep,
        called_fields: true,
    },
    MeldVariant {
        collapse_quads: true,
        called_tile: CalledTileMode::Keep,
        called_fields: true,
    },
    MeldVariant {
        collapse_quads: true,
        called_tile: CalledTileMode::Force,
        called_fields: true,
    },
    MeldVariant {
        collapse_quads: true,
        called_tile: CalledTileMode::Remove,
        called_fields: true,
    },
    MeldVariant {
        collapse_quads: true,
        called_tile: CalledTileMode::Keep,
        called_fields: false,
    },
];

/// Tile spelling: red fives kept, or folded to plain fives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileMode {
    Canonical,
    Folded,
}

impl TileMode {
    fn apply(self, tile: Tile) -> Tile {
        match self {
            TileMode::Canonical => tile,
            TileMode::Folded => tile.folded(),
        }
    }
}

fn score_meld(meld: &Meld, variant: MeldVariant, mode: TileMode) -> ScoreMeld {
    let kind = match meld.kind {
        MeldKind::Quad(_) if variant.collapse_quads => "KAN",
        other => other.label(),
    };
    let mut tiles = meld.tiles.clone();
    if let Some(called) = meld.called_tile {
        let listed = tiles.iter().position(|t| t.rank_eq(called));
        match (variant.called_tile, listed) {
            (CalledTileMode::Force, None) => tiles.push(called),
            (CalledTileMode::Remove, Some(idx)) => {
                tiles.remove(idx);
            }
            _ => {}
        }
    }
    let mut tiles: Vec<Tile> = tiles.into_iter().map(|t| mode.apply(t)).collect();
    tiles.sort();
    ScoreMeld {
        kind: kind.to_string(),
        tiles,
        called_tile: meld.called_tile.filter(|_| variant.called_fields).map(|t| mode.apply(t)),
        called_from: meld.called_from.filter(|_| variant.called_fields),
        open: meld.is_open(),
    }
}

/// Cuts the concealed hand so hand, melds (quads as three) and the winning
/// tile total 14. Surplus tiles matching a quad go first, then the last tile.
pub fn trim_for_score(mut hand: Vec<Tile>, melds: &[Meld]) -> Vec<Tile> {
    let meld_tiles: usize = melds.iter().map(Meld::counted_len).sum();
    let total = hand.len() + meld_tiles + 1;
    let extra = total.saturating_sub(SCORED_TILES);
    let quad_tiles: Vec<Tile> = melds.iter().filter(|m| m.is_quad()).flat_map(|m| m.tiles.iter().copied()).collect();
    for _ in 0..extra {
        let idx = hand
            .iter()
            .position(|t| quad_tiles.contains(t))
            .or_else(|| hand.iter().position(|t| quad_tiles.iter().any(|q| q.rank_eq(*t))));
        match idx {
            Some(i) => {
                hand.remove(i);
            }
            None => {
                hand.pop();
            }
        }
    }
    hand
}

/// Score request for `seat` winning on `win_tile`.
pub fn build_request(
    state: &GameState,
    seat: Seat,
    win_tile: Tile,
    win_type: WinType,
    variant: MeldVariant,
    mode: TileMode,
) -> ScoreRequest {
    let p = state.player(seat);
    let meta = &state.meta;
    let mut hand: Vec<Tile> = trim_for_score(p.hand.clone(), &p.melds)
        .into_iter()
        .map(|t| mode.apply(t))
        .collect();
    hand.sort();
    ScoreRequest {
        hand,
        melds: p.melds.iter().map(|m| score_meld(m, variant, mode)).collect(),
        win_tile: mode.apply(win_tile),
        win_type,
        is_closed: p.closed,
        riichi: p.riichi,
        ippatsu: p.ippatsu,
        round_wind: meta.round_wind,
        seat_wind: seat.wind_for(meta.dealer),
        dora_indicators: meta.visible_dora().iter().map(|&t| mode.apply(t)).collect(),
        ura_dora_indicators: meta.visible_ura().iter().map(|&t| mode.apply(t)).collect(),
        honba: meta.honba,
        riichi_sticks: meta.riichi_sticks,
        dealer: seat == meta.dealer,
        menzen_tsumo: (win_type == WinType::Tsumo).then_some(p.closed),
    }
}

/// Tries every distinct request variant, base form first, and returns the
/// first response with at least one han. On failure the reason comes from
/// the first attempt.
pub fn score_with_variants(
    state: &GameState,
    seat: Seat,
    win_tile: Tile,
    win_type: WinType,
    scorer: &dyn HandScorer,
) -> Result<ScoreResponse, String> {
    let base = MELD_VARIANTS[0];
    let mut attempts = vec![(base, TileMode::Canonical)];
    for mode in [TileMode::Canonical, TileMode::Folded] {
        for variant in MELD_VARIANTS {
            if mode == TileMode::Canonical && variant == base {
                continue;
            }
            attempts.push((variant, mode));
        }
    }

    let mut seen = HashSet::new();
    let mut first_failure: Option<String> = None;
    for (variant, mode) in attempts {
        let request = build_request(state, seat, win_tile, win_type, variant, mode);
        let key = serde_json::to_string(&request).unwrap_or_else(|_| format!("{request:?}"));
        if !seen.insert(key) {
            continue;
        }
        match scorer.score(&request) {
            Ok(res) if res.han > 0 => {
                debug!(%seat, ?variant, ?mode, han = res.han, "scorer accepted request");
                return Ok(res);
            }
            Ok(res) => {
                first_failure.get_or_insert_with(|| format!("no yaku ({} fu)", res.fu));
            }
            Err(e) => {
                first_failure.get_or_insert_with(|| e.to_string());
            }
        }
    }
    Err(first_failure.unwrap_or_else(|| "scorer was never called".to_string()))
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Point changes for one win, before the riichi pot. Ron: the discarder pays
/// `main`. Dealer tsumo: every other seat pays `main`. Non-dealer tsumo: the
/// dealer pays `main`, the other two pay `additional`.
pub fn payments(dealer: Seat, winner: Seat, from: Option<Seat>, cost: Cost) -> [i32; NUM_SEATS] {
    let mut deltas = [0i32; NUM_SEATS];
    match from {
        Some(loser) => {
            deltas[loser.index()] -= cost.main;
            deltas[winner.index()] += cost.main;
        }
        None => {
            for payer in winner.others() {
                let due = if winner == dealer || payer == dealer {
                    cost.main
                } else {
                    cost.additional
                };
                deltas[payer.index()] -= due;
                deltas[winner.index()] += due;
            }
        }
    }
    deltas
}

/// Scores one win without touching the state. `from` is the discarder on ron.
pub fn settle(
    state: &GameState,
    seat: Seat,
    win_tile: Tile,
    from: Option<Seat>,
    scorer: &dyn HandScorer,
) -> KifuResult<WinRecord> {
    let win_type = if from.is_some() { WinType::Ron } else { WinType::Tsumo };
    let response = score_with_variants(state, seat, win_tile, win_type, scorer)
        .map_err(|reason| KifuError::NoWinningHand { seat, reason })?;
    let deltas = payments(state.meta.dealer, seat, from, response.cost);
    info!(%seat, ?win_type, han = response.han, fu = response.fu, "win scored");
    Ok(WinRecord {
        seat,
        win_type,
        from,
        win_tile,
        response,
        deltas,
    })
}

impl GameState {
    /// Applies settled wins in order. The riichi pot goes to the first.
    pub(crate) fn record_wins(&mut self, mut records: Vec<WinRecord>) {
        if let Some(first) = records.first_mut() {
            let pot = self.meta.riichi_sticks as i32 * self.rule.riichi_cost;
            first.deltas[first.seat.index()] += pot;
            self.meta.riichi_sticks = 0;
        }
        for record in records {
            for (points, delta) in self.meta.points.iter_mut().zip(record.deltas) {
                *points += delta;
            }
            self.results.push(record);
        }
    }
}
