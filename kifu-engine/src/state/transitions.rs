use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::action::{Action, ActionType, Phase};
use crate::collaborator::HandScorer;
use crate::errors::{KifuError, KifuResult};
use crate::readiness::{riichi_eligible, Probe, ReadinessSnapshot};
use crate::scoring::{settle, WinRecord};
use crate::state::invariants::Violation;
use crate::state::player::{DrawOrigin, DrawnTile};
use crate::state::wall::DrawMatch;
use crate::state::{GameState, PendingDiscard};
use crate::tile::{count_keys, format_tiles, CountKey, Tile};
use crate::types::{Meld, MeldKind, QuadKind, Seat};

/// Collaborator answers available while applying an action.
#[derive(Clone, Copy)]
pub struct ApplyContext<'a> {
    pub readiness: &'a ReadinessSnapshot,
    pub scorer: &'a dyn HandScorer,
}

impl<'a> ApplyContext<'a> {
    pub fn new(readiness: &'a ReadinessSnapshot, scorer: &'a dyn HandScorer) -> Self {
        Self { readiness, scorer }
    }
}

/// Successor state plus what was noticed on the way.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: GameState,
    /// Invariant breaches tolerated on an advisory state.
    pub warnings: Vec<Violation>,
    /// Non-fatal events, e.g. one of several ron declarations failing.
    pub notices: Vec<String>,
}

pub trait GameStateTransitions {
    /// Applies one action to a copy of the state. On error the receiver is
    /// untouched.
    fn apply(&self, action: Action, ctx: &ApplyContext<'_>) -> KifuResult<Transition>;

    /// Resolves every seat's answer to the pending discard at once. Seats
    /// holding a claim but missing from `responses` pass. All rons win
    /// together; otherwise the highest-priority claim is taken.
    fn apply_responses(&self, responses: &HashMap<Seat, Action>, ctx: &ApplyContext<'_>) -> KifuResult<Transition>;
}

fn not_held(seat: Seat, tiles: &[Tile]) -> KifuError {
    KifuError::TileNotAvailable {
        seat,
        tiles: format_tiles(tiles),
    }
}

impl GameState {
    fn expect_phase(&self, phase: Phase, action: &Action) -> KifuResult<()> {
        if self.phase != phase {
            return Err(KifuError::illegal(format!("{action} during {:?}", self.phase)));
        }
        Ok(())
    }

    fn expect_turn(&self, action: &Action) -> KifuResult<()> {
        if action.seat() != self.turn {
            return Err(KifuError::illegal(format!("{action} out of turn, {} to act", self.turn)));
        }
        Ok(())
    }

    fn pending_discard(&self, action: &Action) -> KifuResult<PendingDiscard> {
        self.last_discard
            .ok_or_else(|| KifuError::illegal(format!("{action} with no discard to claim")))
    }

    fn expect_kan_possible(&self) -> KifuResult<()> {
        if !self.kan_possible() {
            return Err(KifuError::illegal("no indicator or replacement tile left for a quad"));
        }
        Ok(())
    }

    fn clear_ippatsu(&mut self) {
        for p in self.players.iter_mut() {
            p.ippatsu = false;
        }
    }

    /// Quad declared by `seat`: reveal an indicator and owe a replacement.
    fn after_quad(&mut self, seat: Seat) {
        self.clear_ippatsu();
        self.meta.reveal_next_indicator(self.rule.max_indicators);
        self.awaiting_replacement = Some(seat);
        self.turn = seat;
        self.phase = Phase::BeforeDraw;
    }

    /// Nobody claims the discard: the next seat draws.
    fn advance_past_discard(&mut self) {
        if let Some(d) = self.last_discard.take() {
            self.turn = d.seat.next();
        }
        self.pending_claims.clear();
        self.phase = Phase::BeforeDraw;
    }

    /// Unseen tile for an empty-wall draw, picked deterministically from the
    /// round seed and the history length.
    fn fallback_tile(&self) -> Option<Tile> {
        let counts = count_keys(self.all_instances());
        let spare: Vec<Tile> = CountKey::all()
            .filter(|k| counts[k.index()] < k.limit())
            .map(CountKey::tile)
            .collect();
        if spare.is_empty() {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update((self.history.len() as u64).to_le_bytes());
        let mut rng = ChaCha8Rng::from_seed(hasher.finalize().into());
        Some(spare[rng.random_range(0..spare.len())])
    }

    // -----------------------------------------------------------------------
    // Per-action mutators. Each validates first and only then mutates.
    // -----------------------------------------------------------------------

    fn apply_draw(&mut self, seat: Seat, named: Option<Tile>, notices: &mut Vec<String>) -> KifuResult<()> {
        let action = Action::Draw { seat, tile: named };
        self.expect_phase(Phase::BeforeDraw, &action)?;
        self.expect_turn(&action)?;

        let matching = if self.rule.strict_invariants {
            DrawMatch::Exact
        } else {
            DrawMatch::RankEqual
        };
        let replacement = self.awaiting_replacement == Some(seat);
        let wall = &mut self.meta.wall;
        let drawn = match (named, replacement) {
            (Some(tile), _) => wall.draw_specific(tile, matching),
            (None, true) => wall.draw_replacement(),
            (None, false) => wall.draw(),
        };
        let tile = match drawn {
            Ok(tile) => tile,
            Err(KifuError::WallEmpty) if self.rule.random_fallback_on_empty => {
                let tile = self.fallback_tile().ok_or(KifuError::WallEmpty)?;
                notices.push(format!("wall empty, {seat} drew fallback {tile}"));
                tile
            }
            Err(e) => return Err(e),
        };

        let origin = if replacement {
            DrawOrigin::Replacement
        } else {
            DrawOrigin::Wall
        };
        self.awaiting_replacement = None;
        let p = self.player_mut(seat);
        p.drawn = Some(DrawnTile { tile, origin });
        p.furiten_temp = false;
        self.phase = Phase::AfterDrawMustDiscard;
        Ok(())
    }

    fn apply_discard(&mut self, seat: Seat, tile: Tile, riichi: bool, readiness: &ReadinessSnapshot) -> KifuResult<()> {
        let action = Action::Discard { seat, tile, riichi };
        self.expect_phase(Phase::AfterDrawMustDiscard, &action)?;
        self.expect_turn(&action)?;
        let p = self.player(seat);
        if !p.holds(tile) {
            return Err(not_held(seat, &[tile]));
        }
        if p.riichi && p.live_drawn().is_some_and(|d| d.tile != tile) {
            return Err(KifuError::illegal(format!("{seat} is in riichi and must discard the drawn tile")));
        }
        if riichi {
            if !riichi_eligible(self, seat) {
                return Err(KifuError::illegal(format!("{seat} may not declare riichi")));
            }
            match readiness.after_discard(self, seat, tile.kind()) {
                Probe::Known(r) if r.is_tenpai() => {}
                Probe::Known(_) => {
                    return Err(KifuError::illegal(format!("{seat} is not tenpai after discarding {tile}")));
                }
                other => {
                    return Err(KifuError::CapabilityUnavailable {
                        seat,
                        reason: other.reason().to_string(),
                    });
                }
            }
        }

        let cost = self.rule.riichi_cost;
        let p = self.player_mut(seat);
        p.remove_held(&[tile]);
        p.merge_drawn();
        p.discards.push(tile);
        if riichi {
            p.riichi = true;
            p.ippatsu = true;
            self.meta.points[seat.index()] -= cost;
            self.meta.riichi_sticks += 1;
            info!(%seat, %tile, "riichi declared");
        } else if p.riichi {
            p.ippatsu = false;
        }

        self.last_discard = Some(PendingDiscard { seat, tile });
        self.phase = Phase::AwaitingCall;
        self.refresh_claims(readiness);
        if self.pending_claims.is_empty() {
            self.advance_past_discard();
        }
        Ok(())
    }

    fn apply_call(&mut self, action: Action) -> KifuResult<()> {
        self.expect_phase(Phase::AwaitingCall, &action)?;
        let discard = self.pending_discard(&action)?;
        let (seat, tile, consumed, kind): (Seat, Tile, Vec<Tile>, MeldKind) = match action {
            Action::Chi { seat, tile, consumed } => (seat, tile, consumed.to_vec(), MeldKind::Sequence),
            Action::Pon { seat, tile, consumed } => (seat, tile, consumed.to_vec(), MeldKind::Triplet),
            Action::Kan { seat, tile, consumed } => (seat, tile, consumed.to_vec(), MeldKind::Quad(QuadKind::Called)),
            _ => return Err(KifuError::illegal(format!("{action} is not a call"))),
        };

        if seat == discard.seat {
            return Err(KifuError::illegal(format!("{seat} cannot claim its own discard")));
        }
        if tile != discard.tile {
            return Err(KifuError::illegal(format!("{action} names {tile}, discard was {}", discard.tile)));
        }
        if kind == MeldKind::Sequence && seat != discard.seat.next() {
            return Err(KifuError::illegal(format!(
                "{seat} may not chi from {}, only {} may",
                discard.seat,
                discard.seat.next()
            )));
        }
        if self.player(seat).riichi {
            return Err(KifuError::illegal(format!("{seat} is in riichi and may not call")));
        }
        if let Some(higher) = self.outranking_claims(&action).first() {
            return Err(KifuError::illegal(format!("{action} is outranked by pending {higher}")));
        }
        if kind.size() == 4 {
            self.expect_kan_possible()?;
        }
        let meld = Meld::called(kind, seat, discard.seat, tile, &consumed);
        if !meld.has_valid_shape() {
            return Err(KifuError::illegal(format!("{action} does not form a {}", kind.label())));
        }

        if !self.player_mut(seat).remove_held(&consumed) {
            return Err(not_held(seat, &consumed));
        }
        let discarder = self.player_mut(discard.seat);
        if let Some(idx) = discarder.discards.iter().rposition(|&t| t == tile) {
            discarder.discards.remove(idx);
        }
        let p = self.player_mut(seat);
        p.melds.push(meld);
        p.closed = false;
        self.clear_ippatsu();
        self.last_discard = None;
        self.pending_claims.clear();
        self.turn = seat;

        if kind.size() == 4 {
            self.after_quad(seat);
        } else {
            self.player_mut(seat).drawn = Some(DrawnTile {
                tile,
                origin: DrawOrigin::Call,
            });
            self.phase = Phase::AfterDrawMustDiscard;
        }
        Ok(())
    }

    fn apply_closed_kan(&mut self, seat: Seat, tiles: [Tile; 4]) -> KifuResult<()> {
        let action = Action::ClosedKan { seat, tiles };
        self.expect_self_quad(&action)?;
        if !tiles.iter().all(|t| t.rank_eq(tiles[0])) {
            return Err(KifuError::illegal(format!("{action} tiles differ")));
        }
        let p = self.player_mut(seat);
        if !p.remove_held(&tiles) {
            return Err(not_held(seat, &tiles));
        }
        p.merge_drawn();
        p.melds.push(Meld::concealed_quad(seat, tiles));
        self.after_quad(seat);
        Ok(())
    }

    fn apply_added_kan(&mut self, seat: Seat, tile: Tile) -> KifuResult<()> {
        let action = Action::AddedKan { seat, tile };
        self.expect_self_quad(&action)?;
        let Some(idx) = self
            .player(seat)
            .melds
            .iter()
            .position(|m| m.kind == MeldKind::Triplet && m.base_kind() == Some(tile.kind()))
        else {
            return Err(KifuError::illegal(format!("{seat} has no triplet of {}", tile.kind())));
        };
        let p = self.player_mut(seat);
        if !p.remove_held(&[tile]) {
            return Err(not_held(seat, &[tile]));
        }
        p.merge_drawn();
        let meld = &mut p.melds[idx];
        meld.kind = MeldKind::Quad(QuadKind::Added);
        meld.tiles.push(tile);
        self.after_quad(seat);
        Ok(())
    }

    fn expect_self_quad(&self, action: &Action) -> KifuResult<()> {
        self.expect_phase(Phase::AfterDrawMustDiscard, action)?;
        self.expect_turn(action)?;
        if self.player(action.seat()).riichi {
            return Err(KifuError::illegal(format!("{} is in riichi and may not declare a quad", action.seat())));
        }
        self.expect_kan_possible()
    }

    fn apply_tsumo(&mut self, seat: Seat, scorer: &dyn HandScorer) -> KifuResult<()> {
        let action = Action::Tsumo { seat };
        self.expect_phase(Phase::AfterDrawMustDiscard, &action)?;
        self.expect_turn(&action)?;
        let Some(drawn) = self.player(seat).live_drawn() else {
            return Err(KifuError::illegal(format!("{seat} has no drawn tile to win on")));
        };
        let record = settle(self, seat, drawn.tile, None, scorer)?;
        self.record_wins(vec![record]);
        self.phase = Phase::Ended;
        Ok(())
    }

    /// Ron by every seat in `winners`, settled in turn order from the
    /// discarder. Fails only if no declaration scores.
    fn apply_rons(&mut self, winners: &[Seat], scorer: &dyn HandScorer, notices: &mut Vec<String>) -> KifuResult<()> {
        let discard = match winners.first() {
            Some(&seat) => {
                let action = Action::Ron { seat };
                self.expect_phase(Phase::AwaitingCall, &action)?;
                self.pending_discard(&action)?
            }
            None => return Err(KifuError::illegal("ron with no declaring seat")),
        };
        let mut order = winners.to_vec();
        order.sort_by_key(|s| discard.seat.distance_to(*s));
        order.dedup();
        for &seat in &order {
            if seat == discard.seat {
                return Err(KifuError::illegal(format!("{seat} cannot claim its own discard")));
            }
            if !self.pending_claims.contains(&Action::Ron { seat }) {
                return Err(KifuError::illegal(format!("{seat} holds no ron claim on {}", discard.tile)));
            }
        }

        let mut records: Vec<WinRecord> = Vec::new();
        let mut first_err = None;
        for &seat in &order {
            match settle(self, seat, discard.tile, Some(discard.seat), scorer) {
                Ok(record) => records.push(record),
                Err(e) => {
                    notices.push(format!("ron by {seat} not scored: {e}"));
                    first_err.get_or_insert(e);
                }
            }
        }
        if records.is_empty() {
            return Err(first_err.unwrap_or_else(|| KifuError::illegal("no ron settled")));
        }
        self.record_wins(records);
        self.pending_claims.clear();
        self.phase = Phase::Ended;
        Ok(())
    }

    fn apply_pass(&mut self, seat: Seat) -> KifuResult<()> {
        let action = Action::Pass { seat };
        self.expect_phase(Phase::AwaitingCall, &action)?;
        if !self.pending_claims.iter().any(|c| c.seat() == seat) {
            return Err(KifuError::illegal(format!("{seat} has no claim to pass on")));
        }
        let passed_ron = self.pending_claims.contains(&Action::Ron { seat });
        self.pending_claims.retain(|c| c.seat() != seat);
        if passed_ron {
            let p = self.player_mut(seat);
            p.furiten_temp = true;
            if p.riichi {
                p.furiten = true;
            }
        }
        if self.pending_claims.is_empty() {
            self.advance_past_discard();
        }
        Ok(())
    }

    fn step(&mut self, action: Action, ctx: &ApplyContext<'_>, notices: &mut Vec<String>) -> KifuResult<()> {
        if self.phase == Phase::Ended {
            return Err(KifuError::illegal(format!("{action} after the round ended")));
        }
        match action {
            Action::Draw { seat, tile } => self.apply_draw(seat, tile, notices)?,
            Action::Discard { seat, tile, riichi } => self.apply_discard(seat, tile, riichi, ctx.readiness)?,
            Action::Chi { .. } | Action::Pon { .. } | Action::Kan { .. } => self.apply_call(action)?,
            Action::ClosedKan { seat, tiles } => self.apply_closed_kan(seat, tiles)?,
            Action::AddedKan { seat, tile } => self.apply_added_kan(seat, tile)?,
            Action::Tsumo { seat } => self.apply_tsumo(seat, ctx.scorer)?,
            Action::Ron { seat } => self.apply_rons(&[seat], ctx.scorer, notices)?,
            Action::Pass { seat } => self.apply_pass(seat)?,
        }
        self.history.push(action);
        Ok(())
    }

    fn finish(self, notices: Vec<String>) -> KifuResult<Transition> {
        let warnings = self.enforce(self.validate())?;
        Ok(Transition {
            state: self,
            warnings,
            notices,
        })
    }
}

impl GameStateTransitions for GameState {
    fn apply(&self, action: Action, ctx: &ApplyContext<'_>) -> KifuResult<Transition> {
        let mut next = self.clone();
        let mut notices = Vec::new();
        next.step(action, ctx, &mut notices)?;
        debug!(%action, phase = ?next.phase, turn = %next.turn, wall = next.meta.wall.len(), "applied");
        next.finish(notices)
    }

    fn apply_responses(&self, responses: &HashMap<Seat, Action>, ctx: &ApplyContext<'_>) -> KifuResult<Transition> {
        let Some(discard) = self.last_discard.filter(|_| self.phase == Phase::AwaitingCall) else {
            return Err(KifuError::illegal("no discard awaiting responses"));
        };
        for (&seat, action) in responses {
            if action.seat() != seat {
                return Err(KifuError::illegal(format!("response for {seat} names {}", action.seat())));
            }
            if action.action_type() != ActionType::Pass && !self.pending_claims.contains(action) {
                return Err(KifuError::illegal(format!("{action} is not a pending claim")));
            }
        }

        let mut claimants: Vec<Seat> = self.pending_claims.iter().map(|c| c.seat()).collect();
        claimants.sort_by_key(|s| discard.seat.distance_to(*s));
        claimants.dedup();

        let rons: Vec<Seat> = claimants
            .iter()
            .copied()
            .filter(|s| responses.get(s).is_some_and(|a| a.action_type() == ActionType::Ron))
            .collect();
        let taken: Option<Action> = if rons.is_empty() {
            claimants
                .iter()
                .filter_map(|s| responses.get(s).copied())
                .filter(Action::is_claim)
                .max_by_key(|a| (a.claim_priority(), std::cmp::Reverse(discard.seat.distance_to(a.seat()))))
        } else {
            None
        };

        let mut next = self.clone();
        let mut notices = Vec::new();
        for &seat in &claimants {
            let keeps = rons.contains(&seat) || taken.is_some_and(|a| a.seat() == seat);
            if !keeps {
                next.step(Action::Pass { seat }, ctx, &mut notices)?;
            }
        }
        if !rons.is_empty() {
            next.apply_rons(&rons, ctx.scorer, &mut notices)?;
            next.history.extend(rons.iter().map(|&seat| Action::Ron { seat }));
        } else if let Some(action) = taken {
            next.step(action, ctx, &mut notices)?;
        }
        debug!(responses = responses.len(), phase = ?next.phase, "resolved claims");
        next.finish(notices)
    }
}
