use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::{Action, Phase};
use crate::errors::KifuResult;
use crate::rule::RoundRule;
use crate::scoring::WinRecord;
use crate::seeding::round_rng;
use crate::tile::Tile;
use crate::types::{Meld, Seat, Wind, NUM_SEATS};

pub mod invariants;
pub mod legal_actions;
pub mod player;
pub mod transitions;
pub mod wall;

use invariants::Violation;
use player::{DrawOrigin, DrawnTile, PlayerState};
use wall::WallState;

/// Indicator slots in a full round.
pub const MAX_INDICATORS: usize = 5;

const HAND_SIZE: usize = 13;

// ---------------------------------------------------------------------------
// Round metadata
// ---------------------------------------------------------------------------

/// Scoreboard values carried into a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundHeader {
    pub round_wind: Wind,
    /// 1-based round number within the wind.
    pub round_number: u8,
    pub honba: u32,
    pub riichi_sticks: u32,
    pub dealer: Seat,
    pub points: [i32; NUM_SEATS],
}

impl RoundHeader {
    /// East 1, no sticks, everyone on the starting points.
    pub fn opening(rule: &RoundRule) -> Self {
        Self {
            round_wind: Wind::East,
            round_number: 1,
            honba: 0,
            riichi_sticks: 0,
            dealer: Seat::East,
            points: [rule.starting_points; NUM_SEATS],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundMeta {
    pub round_wind: Wind,
    pub round_number: u8,
    pub honba: u32,
    pub riichi_sticks: u32,
    pub dealer: Seat,
    pub points: [i32; NUM_SEATS],
    pub wall: WallState,
    /// Indicator tiles, revealed or not. Only the first `revealed` count.
    pub dora_indicators: Vec<Tile>,
    pub ura_indicators: Vec<Tile>,
    pub revealed: u8,
}

impl RoundMeta {
    fn from_header(header: RoundHeader, wall: WallState) -> Self {
        Self {
            round_wind: header.round_wind,
            round_number: header.round_number,
            honba: header.honba,
            riichi_sticks: header.riichi_sticks,
            dealer: header.dealer,
            points: header.points,
            wall,
            dora_indicators: Vec::with_capacity(MAX_INDICATORS),
            ura_indicators: Vec::with_capacity(MAX_INDICATORS),
            revealed: 0,
        }
    }

    /// Advances the revealed count by one, up to `max`. An empty slot is
    /// filled from the wall's reserved end while the wall holds tiles.
    /// Returns whether the count moved.
    pub fn reveal_next_indicator(&mut self, max: u8) -> bool {
        if self.revealed >= max.min(MAX_INDICATORS as u8) {
            return false;
        }
        self.revealed += 1;
        if self.dora_indicators.len() < self.revealed as usize {
            if let Some(tile) = self.wall.take_reserved() {
                self.dora_indicators.push(tile);
            }
        }
        true
    }

    pub fn visible_dora(&self) -> &[Tile] {
        let n = (self.revealed as usize).min(self.dora_indicators.len());
        &self.dora_indicators[..n]
    }

    pub fn visible_ura(&self) -> &[Tile] {
        let n = (self.revealed as usize).min(self.ura_indicators.len());
        &self.ura_indicators[..n]
    }

    /// Every indicator instance, revealed or not.
    pub fn indicator_tiles(&self) -> impl Iterator<Item = &Tile> {
        self.dora_indicators.iter().chain(self.ura_indicators.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDiscard {
    pub seat: Seat,
    pub tile: Tile,
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatCheckpoint {
    pub hand: Vec<Tile>,
    pub drawn: Option<Tile>,
    pub melds: Vec<Meld>,
    pub discards: Vec<Tile>,
    pub riichi: bool,
    pub ippatsu: bool,
}

/// A round as recorded by a log or entered by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCheckpoint {
    pub header: RoundHeader,
    pub seats: [SeatCheckpoint; NUM_SEATS],
    #[serde(default)]
    pub dora_indicators: Vec<Tile>,
    #[serde(default)]
    pub ura_indicators: Vec<Tile>,
    #[serde(default = "one")]
    pub revealed: u8,
    pub turn: Seat,
    pub phase: Phase,
    #[serde(default)]
    pub last_discard: Option<PendingDiscard>,
    #[serde(default)]
    pub awaiting_replacement: Option<Seat>,
    /// Recorded wall order, drawable end last. Rebuilt from the unseen
    /// tiles when absent.
    #[serde(default)]
    pub wall: Option<Vec<Tile>>,
}

fn one() -> u8 {
    1
}

impl RoundCheckpoint {
    /// Snapshot of a live round, wall order included, so that replaying the
    /// same actions reproduces it. Furiten flags and call markers are not
    /// carried over.
    pub fn capture(state: &GameState) -> Self {
        let meta = &state.meta;
        let seats = std::array::from_fn(|i| {
            let p = &state.players[i];
            SeatCheckpoint {
                hand: p.hand.clone(),
                drawn: p.live_drawn().map(|d| d.tile),
                melds: p.melds.clone(),
                discards: p.discards.clone(),
                riichi: p.riichi,
                ippatsu: p.ippatsu,
            }
        });
        let wall: Vec<Tile> = meta.wall.folded_order().copied().collect();
        Self {
            header: RoundHeader {
                round_wind: meta.round_wind,
                round_number: meta.round_number,
                honba: meta.honba,
                riichi_sticks: meta.riichi_sticks,
                dealer: meta.dealer,
                points: meta.points,
            },
            seats,
            dora_indicators: meta.dora_indicators.clone(),
            ura_indicators: meta.ura_indicators.clone(),
            revealed: meta.revealed,
            turn: state.turn,
            phase: state.phase,
            last_discard: state.last_discard,
            awaiting_replacement: state.awaiting_replacement,
            wall: Some(wall),
        }
    }
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub rule: RoundRule,
    pub meta: RoundMeta,
    pub players: [PlayerState; NUM_SEATS],
    pub turn: Seat,
    pub phase: Phase,
    pub last_discard: Option<PendingDiscard>,
    /// Claims on `last_discard`, highest priority first.
    pub pending_claims: Vec<Action>,
    /// Seat that owes a replacement draw after a quad.
    pub awaiting_replacement: Option<Seat>,
    pub results: Vec<WinRecord>,
    pub history: Vec<Action>,
    pub seed: [u8; 32],
}

impl GameState {
    /// Fresh round from a shuffled wall.
    pub fn deal(rule: RoundRule, header: RoundHeader, session_seed: &[u8; 32]) -> KifuResult<Self> {
        rule.validate()?;
        let mut rng = round_rng(session_seed, header.round_wind, header.round_number, header.honba);
        let wall = WallState::build_shuffled(&[], &mut rng, rule.fold_dead_wall)?;
        let mut meta = RoundMeta::from_header(header, wall);

        if !meta.wall.folded {
            for _ in 0..MAX_INDICATORS {
                if let Some(t) = meta.wall.take_reserved() {
                    meta.dora_indicators.push(t);
                }
                if let Some(t) = meta.wall.take_reserved() {
                    meta.ura_indicators.push(t);
                }
            }
        }
        meta.reveal_next_indicator(rule.max_indicators);

        let mut players: [PlayerState; NUM_SEATS] = Default::default();
        for _ in 0..HAND_SIZE {
            for seat in std::iter::once(header.dealer).chain(header.dealer.others()) {
                let tile = meta.wall.draw()?;
                players[seat.index()].hand.push(tile);
            }
        }
        for p in players.iter_mut() {
            p.hand.sort();
        }

        debug!(
            wind = ?header.round_wind,
            round = header.round_number,
            honba = header.honba,
            wall = meta.wall.len(),
            "dealt round"
        );

        Ok(Self {
            rule,
            meta,
            players,
            turn: header.dealer,
            phase: Phase::BeforeDraw,
            last_discard: None,
            pending_claims: Vec::new(),
            awaiting_replacement: None,
            results: Vec::new(),
            history: Vec::new(),
            seed: *session_seed,
        })
    }

    /// Round from a checkpoint. Without a recorded wall, the wall is the
    /// shuffled complement of every tile in play, with the dead wall folded.
    ///
    /// Claims on a checkpointed pending discard are rebuilt without ron;
    /// call [`GameState::refresh_claims`] once readiness is known.
    pub fn from_checkpoint(checkpoint: RoundCheckpoint, rule: RoundRule, session_seed: &[u8; 32]) -> KifuResult<Self> {
        rule.validate()?;
        let header = checkpoint.header;

        let mut players: [PlayerState; NUM_SEATS] = Default::default();
        for (p, cp) in players.iter_mut().zip(checkpoint.seats) {
            let mut hand = cp.hand;
            hand.sort();
            p.hand = hand;
            p.drawn = cp.drawn.map(|tile| DrawnTile {
                tile,
                origin: DrawOrigin::Wall,
            });
            p.closed = !cp.melds.iter().any(Meld::is_open);
            p.melds = cp.melds;
            p.discards = cp.discards;
            p.riichi = cp.riichi;
            p.ippatsu = cp.ippatsu;
        }

        let wall = match checkpoint.wall {
            Some(tiles) => WallState::from_recorded(tiles),
            None => {
                let in_play: Vec<Tile> = players
                    .iter()
                    .flat_map(|p| p.instances())
                    .chain(checkpoint.dora_indicators.iter())
                    .chain(checkpoint.ura_indicators.iter())
                    .copied()
                    .collect();
                let mut rng = round_rng(session_seed, header.round_wind, header.round_number, header.honba);
                WallState::build_shuffled(&in_play, &mut rng, true)?
            }
        };

        let mut meta = RoundMeta::from_header(header, wall);
        meta.dora_indicators = checkpoint.dora_indicators;
        meta.ura_indicators = checkpoint.ura_indicators;
        let target = checkpoint.revealed.clamp(1, rule.max_indicators);
        while meta.revealed < target && meta.reveal_next_indicator(rule.max_indicators) {}

        let mut state = Self {
            rule,
            meta,
            players,
            turn: checkpoint.turn,
            phase: checkpoint.phase,
            last_discard: checkpoint.last_discard,
            pending_claims: Vec::new(),
            awaiting_replacement: checkpoint.awaiting_replacement,
            results: Vec::new(),
            history: Vec::new(),
            seed: *session_seed,
        };
        if state.phase == Phase::AwaitingCall {
            state.refresh_claims(&crate::readiness::ReadinessSnapshot::default());
        }

        let violations = state.validate();
        state.enforce(violations)?;
        Ok(state)
    }

    #[inline]
    pub fn player(&self, seat: Seat) -> &PlayerState {
        &self.players[seat.index()]
    }

    #[inline]
    pub(crate) fn player_mut(&mut self, seat: Seat) -> &mut PlayerState {
        &mut self.players[seat.index()]
    }

    #[inline]
    pub fn points(&self, seat: Seat) -> i32 {
        self.meta.points[seat.index()]
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::Ended
    }

    /// Every physical instance reachable from the state.
    pub fn all_instances(&self) -> impl Iterator<Item = &Tile> {
        self.players
            .iter()
            .flat_map(|p| p.instances())
            .chain(self.meta.indicator_tiles())
            .chain(self.meta.wall.tiles())
    }

    /// Strict rules turn violations into an error; otherwise they are logged
    /// and handed back as warnings.
    pub(crate) fn enforce(&self, violations: Vec<Violation>) -> KifuResult<Vec<Violation>> {
        if violations.is_empty() {
            return Ok(violations);
        }
        if self.rule.strict_invariants {
            return Err(crate::errors::KifuError::InvariantViolation { violations });
        }
        for v in &violations {
            warn!(violation = %v, "invariant check failed on advisory state");
        }
        Ok(violations)
    }
}
