use crate::action::{Action, Phase};
use crate::readiness::{riichi_eligible, Probe, ReadinessSnapshot};
use crate::state::GameState;
use crate::tile::{Tile, TileKind};
use crate::types::{MeldKind, Seat};

pub trait GameStateLegalActions {
    /// Legal actions for `viewer`, or for every seat when `None`. Claims come
    /// first, highest priority first.
    fn legal_actions(&self, readiness: &ReadinessSnapshot, viewer: Option<Seat>) -> Vec<Action>;
    fn turn_actions(&self, readiness: &ReadinessSnapshot) -> Vec<Action>;
    fn claims_for(&self, seat: Seat, discarder: Seat, tile: Tile, readiness: &ReadinessSnapshot) -> Vec<Action>;
}

/// Distinct instances in `tiles` (a red and a plain five are different).
fn distinct(tiles: impl IntoIterator<Item = Tile>) -> Vec<Tile> {
    let mut out: Vec<Tile> = tiles.into_iter().collect();
    out.sort();
    out.dedup();
    out
}

fn of_kind(held: &[Tile], kind: TileKind) -> Vec<Tile> {
    held.iter().copied().filter(|t| t.kind() == kind).collect()
}

/// Distinct sorted pairs drawn from `tiles`.
fn distinct_pairs(tiles: &[Tile]) -> Vec<[Tile; 2]> {
    let mut pairs = Vec::new();
    for i in 0..tiles.len() {
        for j in (i + 1)..tiles.len() {
            let mut pair = [tiles[i], tiles[j]];
            pair.sort();
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

impl GameState {
    /// Another quad may be declared: an indicator slot and a replacement
    /// tile are both left.
    pub fn kan_possible(&self) -> bool {
        self.meta.revealed < self.rule.max_indicators && self.meta.wall.replacement_available()
    }

    /// The seat discarded a tile it is waiting on.
    pub fn own_discard_furiten(&self, seat: Seat, readiness: &ReadinessSnapshot) -> bool {
        match readiness.hand(self, seat) {
            Probe::Known(r) => self
                .player(seat)
                .discards
                .iter()
                .any(|d| r.waits.contains(&d.kind())),
            _ => false,
        }
    }

    /// Any furiten that blocks ron for `seat`.
    pub fn in_furiten(&self, seat: Seat, readiness: &ReadinessSnapshot) -> bool {
        let p = self.player(seat);
        p.furiten || p.furiten_temp || self.own_discard_furiten(seat, readiness)
    }

    /// Rebuilds `pending_claims` for the pending discard, ranked by priority
    /// and then by turn order from the discarder.
    pub fn refresh_claims(&mut self, readiness: &ReadinessSnapshot) {
        self.pending_claims = match (self.phase, self.last_discard) {
            (Phase::AwaitingCall, Some(d)) => {
                let mut claims: Vec<Action> = d
                    .seat
                    .others()
                    .flat_map(|s| self.claims_for(s, d.seat, d.tile, readiness))
                    .collect();
                claims.sort_by_key(|c| (std::cmp::Reverse(c.claim_priority()), d.seat.distance_to(c.seat())));
                claims
            }
            _ => Vec::new(),
        };
    }

    /// Pending claims outranking `action` from seats other than its own.
    pub fn outranking_claims(&self, action: &Action) -> Vec<Action> {
        self.pending_claims
            .iter()
            .filter(|c| c.seat() != action.seat() && c.claim_priority() > action.claim_priority())
            .copied()
            .collect()
    }
}

impl GameStateLegalActions for GameState {
    fn legal_actions(&self, readiness: &ReadinessSnapshot, viewer: Option<Seat>) -> Vec<Action> {
        let mut legals = match self.phase {
            Phase::Ended => Vec::new(),
            Phase::BeforeDraw => vec![Action::Draw {
                seat: self.turn,
                tile: None,
            }],
            Phase::AfterDrawMustDiscard => self.turn_actions(readiness),
            Phase::AwaitingCall => {
                let mut claims = self.pending_claims.clone();
                let mut passers: Vec<Seat> = claims.iter().map(|c| c.seat()).collect();
                passers.sort_by_key(|s| self.last_discard.map_or(0, |d| d.seat.distance_to(*s)));
                passers.dedup();
                claims.extend(passers.into_iter().map(|seat| Action::Pass { seat }));
                claims
            }
        };
        if let Some(seat) = viewer {
            legals.retain(|a| a.seat() == seat);
        }
        legals
    }

    fn turn_actions(&self, readiness: &ReadinessSnapshot) -> Vec<Action> {
        let seat = self.turn;
        let p = self.player(seat);
        let mut legals = Vec::new();
        let held: Vec<Tile> = p.held().copied().collect();

        if let Some(d) = p.live_drawn() {
            if readiness.completes(self, seat, d.tile.kind()) == Probe::Known(true) {
                legals.push(Action::Tsumo { seat });
            }
        }

        if !p.riichi && self.kan_possible() {
            let mut kinds: Vec<TileKind> = held.iter().map(|t| t.kind()).collect();
            kinds.sort();
            kinds.dedup();
            for kind in kinds {
                let group = of_kind(&held, kind);
                if let [a, b, c, d] = group[..] {
                    let mut tiles = [a, b, c, d];
                    tiles.sort();
                    legals.push(Action::ClosedKan { seat, tiles });
                }
            }
            for meld in p.melds.iter().filter(|m| m.kind == MeldKind::Triplet) {
                if let Some(kind) = meld.base_kind() {
                    for tile in distinct(of_kind(&held, kind)) {
                        legals.push(Action::AddedKan { seat, tile });
                    }
                }
            }
        }

        if p.riichi {
            let locked = p.live_drawn().map(|d| vec![d.tile]).unwrap_or_else(|| distinct(held.iter().copied()));
            for tile in locked {
                legals.push(Action::Discard {
                    seat,
                    tile,
                    riichi: false,
                });
            }
            return legals;
        }

        let choices = distinct(held.iter().copied());
        for &tile in &choices {
            legals.push(Action::Discard {
                seat,
                tile,
                riichi: false,
            });
        }
        if riichi_eligible(self, seat) {
            for &tile in &choices {
                let tenpai = readiness
                    .after_discard(self, seat, tile.kind())
                    .known()
                    .is_some_and(|r| r.is_tenpai());
                if tenpai {
                    legals.push(Action::Discard {
                        seat,
                        tile,
                        riichi: true,
                    });
                }
            }
        }
        legals
    }

    fn claims_for(&self, seat: Seat, discarder: Seat, tile: Tile, readiness: &ReadinessSnapshot) -> Vec<Action> {
        let mut claims = Vec::new();
        if seat == discarder {
            return claims;
        }
        let p = self.player(seat);
        let kind = tile.kind();

        if readiness.completes(self, seat, kind) == Probe::Known(true) && !self.in_furiten(seat, readiness) {
            claims.push(Action::Ron { seat });
        }
        if p.riichi {
            return claims;
        }

        let held: Vec<Tile> = p.held().copied().collect();
        let same = of_kind(&held, kind);

        if same.len() == 3 && self.kan_possible() {
            let mut consumed = [same[0], same[1], same[2]];
            consumed.sort();
            claims.push(Action::Kan { seat, tile, consumed });
        }
        for consumed in distinct_pairs(&same) {
            claims.push(Action::Pon { seat, tile, consumed });
        }

        if seat == discarder.next() && !kind.is_honor() {
            for (lo, hi) in [(-2i8, -1i8), (-1, 1), (1, 2)] {
                let (Some(a), Some(b)) = (kind.offset(lo), kind.offset(hi)) else {
                    continue;
                };
                for x in distinct(of_kind(&held, a)) {
                    for y in distinct(of_kind(&held, b)) {
                        claims.push(Action::Chi {
                            seat,
                            tile,
                            consumed: [x, y],
                        });
                    }
                }
            }
        }
        claims
    }
}
