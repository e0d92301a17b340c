//! Tenpai readiness per seat, gathered from the tenpai collaborator.
//!
//! Riichi, tsumo and ron legality all depend on waits the engine cannot
//! compute itself. A [`ReadinessSnapshot`] records those answers together
//! with the hand they were computed for; an answer for a different hand is
//! treated as unknown, and unknown never permits anything.

use std::collections::BTreeMap;

use crate::action::Phase;
use crate::collaborator::{CancelToken, TenpaiRequest, TenpaiResponse, TenpaiService};
use crate::state::player::PlayerState;
use crate::state::GameState;
use crate::tile::{Tile, TileKind};
use crate::types::{Seat, NUM_SEATS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Known(T),
    /// The query failed or timed out.
    Failed(String),
    /// Not queried, or queried for a different hand.
    Unknown,
}

impl<T> Probe<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Probe::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Probe<&T> {
        match self {
            Probe::Known(v) => Probe::Known(v),
            Probe::Failed(reason) => Probe::Failed(reason.clone()),
            Probe::Unknown => Probe::Unknown,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Known(v) => Probe::Known(f(v)),
            Probe::Failed(reason) => Probe::Failed(reason),
            Probe::Unknown => Probe::Unknown,
        }
    }

    /// Reason a non-`Known` probe cannot be used.
    pub fn reason(&self) -> &str {
        match self {
            Probe::Known(_) => "",
            Probe::Failed(reason) => reason,
            Probe::Unknown => "not queried for this hand",
        }
    }
}

/// What a planned query answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeTarget {
    /// Waits of the concealed hand without the drawn slot.
    Hand,
    /// Waits after discarding one tile of this kind from hand plus drawn.
    AfterDiscard(TileKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub seat: Seat,
    pub target: ProbeTarget,
    pub request: TenpaiRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatReadiness {
    pub signature: String,
    pub hand: Probe<TenpaiResponse>,
    pub after_discard: BTreeMap<TileKind, Probe<TenpaiResponse>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessSnapshot {
    seats: [Option<SeatReadiness>; NUM_SEATS],
}

/// Identifies the exact holding a readiness entry was computed for.
pub fn seat_signature(player: &PlayerState) -> String {
    let base = TenpaiRequest::new(&player.hand, &player.melds).cache_key();
    match player.live_drawn() {
        Some(d) => format!("{}+{}", base, d.tile.kind()),
        None => base,
    }
}

/// Whether `seat` may currently declare riichi, ignoring tenpai.
pub fn riichi_eligible(state: &GameState, seat: Seat) -> bool {
    let p = state.player(seat);
    state.phase == Phase::AfterDrawMustDiscard
        && state.turn == seat
        && state.awaiting_replacement.is_none()
        && p.closed
        && !p.riichi
        && p.live_drawn().is_some()
        && state.points(seat) >= state.rule.riichi_cost
}

/// Queries needed to decide every capability-dependent action in `state`.
pub fn plan(state: &GameState) -> Vec<ProbeRequest> {
    let mut probes = Vec::new();
    if state.phase == Phase::Ended {
        return probes;
    }
    for seat in Seat::ALL {
        let p = state.player(seat);
        probes.push(ProbeRequest {
            seat,
            target: ProbeTarget::Hand,
            request: TenpaiRequest::new(&p.hand, &p.melds),
        });
    }

    let seat = state.turn;
    if riichi_eligible(state, seat) {
        let p = state.player(seat);
        let held: Vec<Tile> = p.held().copied().collect();
        let mut kinds: Vec<TileKind> = held.iter().map(|t| t.kind()).collect();
        kinds.sort();
        kinds.dedup();
        for kind in kinds {
            let mut rest = held.clone();
            if let Some(idx) = rest.iter().position(|t| t.kind() == kind) {
                rest.remove(idx);
            }
            probes.push(ProbeRequest {
                seat,
                target: ProbeTarget::AfterDiscard(kind),
                request: TenpaiRequest::new(&rest, &p.melds),
            });
        }
    }
    probes
}

impl ReadinessSnapshot {
    /// Pairs `results` with `plan` (same order) and stamps each seat with
    /// the signature of its current holding.
    pub fn assemble(state: &GameState, plan: &[ProbeRequest], results: Vec<Probe<TenpaiResponse>>) -> Self {
        let mut snapshot = ReadinessSnapshot::default();
        for (probe, result) in plan.iter().zip(results) {
            let entry = snapshot.seats[probe.seat.index()].get_or_insert_with(|| SeatReadiness {
                signature: seat_signature(state.player(probe.seat)),
                hand: Probe::Unknown,
                after_discard: BTreeMap::new(),
            });
            match probe.target {
                ProbeTarget::Hand => entry.hand = result,
                ProbeTarget::AfterDiscard(kind) => {
                    entry.after_discard.insert(kind, result);
                }
            }
        }
        snapshot
    }

    /// Runs every planned query one after another on the calling thread.
    pub fn survey(state: &GameState, service: &dyn TenpaiService) -> Self {
        let probes = plan(state);
        let token = CancelToken::new();
        let results = probes
            .iter()
            .map(|p| match service.query(&p.request, &token) {
                Ok(res) => Probe::Known(res),
                Err(e) => Probe::Failed(e.to_string()),
            })
            .collect();
        Self::assemble(state, &probes, results)
    }

    fn current(&self, state: &GameState, seat: Seat) -> Option<&SeatReadiness> {
        self.seats[seat.index()]
            .as_ref()
            .filter(|r| r.signature == seat_signature(state.player(seat)))
    }

    pub fn seat(&self, seat: Seat) -> Option<&SeatReadiness> {
        self.seats[seat.index()].as_ref()
    }

    /// Tenpai answer for the seat's concealed hand.
    pub fn hand(&self, state: &GameState, seat: Seat) -> Probe<&TenpaiResponse> {
        match self.current(state, seat) {
            Some(r) => r.hand.as_ref(),
            None => Probe::Unknown,
        }
    }

    /// Whether a tile of `kind` completes the seat's hand.
    pub fn completes(&self, state: &GameState, seat: Seat, kind: TileKind) -> Probe<bool> {
        self.hand(state, seat).map(|r| r.waits.contains(&kind))
    }

    /// Tenpai answer after discarding a tile of `kind`.
    pub fn after_discard(&self, state: &GameState, seat: Seat, kind: TileKind) -> Probe<&TenpaiResponse> {
        match self.current(state, seat).and_then(|r| r.after_discard.get(&kind)) {
            Some(p) => p.as_ref(),
            None => Probe::Unknown,
        }
    }
}
