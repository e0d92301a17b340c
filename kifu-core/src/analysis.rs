//! Reference tenpai analysis and hand scoring.
//!
//! A plain decomposition search over kind counts: standard form, seven
//! pairs and thirteen orphans. It backs the simulator and the integration
//! tests; production callers plug in their own services.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use kifu_engine::collaborator::{
    CancelToken, CollaboratorError, Cost, HandScorer, ScoreRequest, ScoreResponse, TenpaiRequest, TenpaiResponse,
    TenpaiService,
};
use kifu_engine::tile::{TileKind, NUM_KINDS};

const HONOR_START: usize = 27;

/// Kinds counted by thirteen orphans.
const ORPHANS: [usize; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

fn counts_of(kinds: impl IntoIterator<Item = TileKind>) -> [u8; NUM_KINDS] {
    let mut counts = [0u8; NUM_KINDS];
    for k in kinds {
        counts[k.id() as usize] += 1;
    }
    counts
}

#[inline]
fn suited(i: usize) -> bool {
    i < HONOR_START
}

/// Best standard-form shanten below `i`, given `sets` complete groups and
/// `partials` two-tile shapes already taken.
fn scan(counts: &mut [u8; NUM_KINDS], start: usize, sets: usize, partials: usize, pair: bool, best: &mut i8) {
    let Some(i) = (start..NUM_KINDS).find(|&i| counts[i] > 0) else {
        let usable = partials.min(4usize.saturating_sub(sets));
        let s = 8 - 2 * sets as i8 - usable as i8 - pair as i8;
        *best = (*best).min(s);
        return;
    };

    if counts[i] >= 3 {
        counts[i] -= 3;
        scan(counts, i, sets + 1, partials, pair, best);
        counts[i] += 3;
    }
    if suited(i) && i % 9 <= 6 && counts[i + 1] > 0 && counts[i + 2] > 0 {
        counts[i] -= 1;
        counts[i + 1] -= 1;
        counts[i + 2] -= 1;
        scan(counts, i, sets + 1, partials, pair, best);
        counts[i] += 1;
        counts[i + 1] += 1;
        counts[i + 2] += 1;
    }
    if sets + partials < 4 {
        if counts[i] >= 2 {
            counts[i] -= 2;
            scan(counts, i, sets, partials + 1, pair, best);
            counts[i] += 2;
        }
        if suited(i) && i % 9 <= 7 && counts[i + 1] > 0 {
            counts[i] -= 1;
            counts[i + 1] -= 1;
            scan(counts, i, sets, partials + 1, pair, best);
            counts[i] += 1;
            counts[i + 1] += 1;
        }
        if suited(i) && i % 9 <= 6 && counts[i + 2] > 0 {
            counts[i] -= 1;
            counts[i + 2] -= 1;
            scan(counts, i, sets, partials + 1, pair, best);
            counts[i] += 1;
            counts[i + 2] += 1;
        }
    }
    counts[i] -= 1;
    scan(counts, i, sets, partials, pair, best);
    counts[i] += 1;
}

fn standard_shanten(counts: &mut [u8; NUM_KINDS], called: usize) -> i8 {
    let mut best = 8;
    for p in 0..NUM_KINDS {
        if counts[p] >= 2 {
            counts[p] -= 2;
            scan(counts, 0, called, 0, true, &mut best);
            counts[p] += 2;
        }
    }
    scan(counts, 0, called, 0, false, &mut best);
    best
}

fn pairs_shanten(counts: &[u8; NUM_KINDS]) -> i8 {
    let pairs = counts.iter().filter(|&&c| c >= 2).count() as i8;
    let kinds = counts.iter().filter(|&&c| c > 0).count() as i8;
    6 - pairs + (7 - kinds).max(0)
}

fn orphans_shanten(counts: &[u8; NUM_KINDS]) -> i8 {
    let kinds = ORPHANS.iter().filter(|&&i| counts[i] > 0).count() as i8;
    let pair = ORPHANS.iter().any(|&i| counts[i] >= 2);
    13 - kinds - pair as i8
}

/// Shanten of a hand with `called` melds; -1 is a complete hand.
pub fn shanten(counts: &[u8; NUM_KINDS], called: usize) -> i8 {
    let mut work = *counts;
    let mut best = standard_shanten(&mut work, called);
    if called == 0 {
        best = best.min(pairs_shanten(counts)).min(orphans_shanten(counts));
    }
    best
}

/// Kinds that could touch the hand: held kinds, their suited neighbours
/// within two, and every orphan when thirteen orphans is in reach.
fn candidates(counts: &[u8; NUM_KINDS], called: usize) -> [bool; NUM_KINDS] {
    let mut near = [false; NUM_KINDS];
    for i in (0..NUM_KINDS).filter(|&i| counts[i] > 0) {
        near[i] = true;
        if suited(i) {
            let lo = i - (i % 9).min(2);
            let hi = (i + 2).min(i - i % 9 + 8);
            near[lo..=hi].iter_mut().for_each(|n| *n = true);
        }
    }
    if called == 0 && orphans_shanten(counts) == 0 {
        for i in ORPHANS {
            near[i] = true;
        }
    }
    near
}

/// Kinds that complete the hand, excluding kinds already held four times.
pub fn waits(counts: &[u8; NUM_KINDS], called: usize) -> Vec<TileKind> {
    let near = candidates(counts, called);
    TileKind::all()
        .filter(|k| {
            let i = k.id() as usize;
            if !near[i] || counts[i] >= 4 {
                return false;
            }
            let mut next = *counts;
            next[i] += 1;
            shanten(&next, called) == -1
        })
        .collect()
}

/// In-process [`TenpaiService`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceAnalyzer;

impl ReferenceAnalyzer {
    pub fn analyze(&self, request: &TenpaiRequest) -> TenpaiResponse {
        let counts = counts_of(request.tiles.iter().copied());
        let called = request.melds.len();
        let shanten = shanten(&counts, called);
        let waits = if shanten == 0 && request.tiles.len() % 3 == 1 {
            waits(&counts, called)
        } else {
            Vec::new()
        };
        TenpaiResponse { shanten, waits }
    }
}

impl TenpaiService for ReferenceAnalyzer {
    fn query(&self, request: &TenpaiRequest, cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        if cancel.is_cancelled() {
            return Err(CollaboratorError::Cancelled);
        }
        Ok(self.analyze(request))
    }
}

/// Wraps a service with an unbounded answer cache keyed by
/// [`TenpaiRequest::cache_key`].
pub struct Memoized<S> {
    inner: S,
    cache: Mutex<HashMap<String, TenpaiResponse>>,
}

impl<S: TenpaiService> Memoized<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: TenpaiService> TenpaiService for Memoized<S> {
    fn query(&self, request: &TenpaiRequest, cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        let key = request.cache_key();
        if let Some(hit) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Ok(hit.clone());
        }
        let res = self.inner.query(request, cancel)?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, res.clone());
        Ok(res)
    }
}

/// Scorer that accepts any complete hand at one han for a fixed cost.
#[derive(Debug, Clone, Copy)]
pub struct FlatScorer {
    pub cost: Cost,
}

impl Default for FlatScorer {
    fn default() -> Self {
        Self {
            cost: Cost {
                main: 1000,
                additional: 500,
            },
        }
    }
}

impl HandScorer for FlatScorer {
    fn score(&self, request: &ScoreRequest) -> Result<ScoreResponse, CollaboratorError> {
        let counts = counts_of(request.hand.iter().chain(std::iter::once(&request.win_tile)).map(|t| t.kind()));
        let complete = shanten(&counts, request.melds.len()) == -1;
        Ok(ScoreResponse {
            han: u32::from(complete),
            fu: 30,
            yaku: if complete { vec!["flat".to_string()] } else { Vec::new() },
            cost: self.cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kifu_engine::parser::{parse_hand, parse_tile};

    fn counts(hand: &str) -> [u8; NUM_KINDS] {
        counts_of(parse_hand(hand).unwrap().iter().map(|t| t.kind()))
    }

    fn kinds(tiles: &str) -> Vec<TileKind> {
        tiles.split(',').map(|s| parse_tile(s).unwrap().kind()).collect()
    }

    #[test]
    fn complete_hands() {
        assert_eq!(shanten(&counts("123m456p789s11222z"), 0), -1);
        assert_eq!(shanten(&counts("11m22p33s44556677z"), 0), -1);
        assert_eq!(shanten(&counts("19m19p19s12345677z"), 0), -1);
    }

    #[test]
    fn shanpon_waits() {
        let c = counts("123m456p789s1122z");
        assert_eq!(shanten(&c, 0), 0);
        assert_eq!(waits(&c, 0), kinds("E,S"));
    }

    #[test]
    fn nine_gates_waits_everywhere() {
        let c = counts("1112345678999m");
        assert_eq!(waits(&c, 0).len(), 9);
    }

    #[test]
    fn seven_pairs_single_wait() {
        let c = counts("11m22p33s4455667z");
        assert_eq!(waits(&c, 0), kinds("7z"));
    }

    #[test]
    fn called_melds_reduce_needed_sets() {
        let c = counts("123m45p11s");
        assert_eq!(shanten(&c, 2), 0);
        assert_eq!(waits(&c, 2), kinds("3p,6p"));
    }

    #[test]
    fn four_held_is_not_a_wait() {
        let c = counts("1111m234p567s789s");
        assert!(!waits(&c, 0).contains(&parse_tile("1m").unwrap().kind()));
    }

    #[test]
    fn far_hand_is_not_tenpai() {
        let res = ReferenceAnalyzer.analyze(&TenpaiRequest::new(&parse_hand("147m258p369s1234z").unwrap(), &[]));
        assert!(res.shanten > 0);
        assert!(!res.is_tenpai());
    }

    #[test]
    fn cancelled_query_fails() {
        let token = CancelToken::new();
        token.cancel();
        let req = TenpaiRequest::new(&parse_hand("123m").unwrap(), &[]);
        assert_eq!(ReferenceAnalyzer.query(&req, &token), Err(CollaboratorError::Cancelled));
    }
}
