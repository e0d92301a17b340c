//! Query broker behaviour under slow, blocking and repeated services.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kifu_core::analysis::{FlatScorer, ReferenceAnalyzer};
use kifu_core::broker::QueryBroker;
use kifu_engine::collaborator::{CancelToken, CollaboratorError, TenpaiRequest, TenpaiResponse, TenpaiService};
use kifu_engine::readiness::Probe;
use kifu_engine::rule::RoundRule;
use kifu_engine::seeding::session_seed_from_u64;
use kifu_engine::state::RoundHeader;
use kifu_engine::types::Seat;
use kifu_engine::{Action, ApplyContext, GameState, GameStateTransitions, ReadinessSnapshot};

/// Dealer has drawn, so the survey includes riichi probes.
fn drawn_state(timeout_ms: u64) -> GameState {
    let rule = RoundRule {
        query_timeout_ms: timeout_ms,
        ..RoundRule::default_replay()
    };
    let state = GameState::deal(rule, RoundHeader::opening(&rule), &session_seed_from_u64(77)).unwrap();
    let readiness = ReadinessSnapshot::default();
    let scorer = FlatScorer::default();
    let draw = Action::Draw {
        seat: Seat::East,
        tile: None,
    };
    state.apply(draw, &ApplyContext::new(&readiness, &scorer)).unwrap().state
}

/// Counts calls and answers like the reference analyzer.
#[derive(Default)]
struct Counting {
    calls: AtomicUsize,
}

impl TenpaiService for Counting {
    fn query(&self, request: &TenpaiRequest, _cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ReferenceAnalyzer.analyze(request))
    }
}

/// Ignores cancellation and answers after a fixed delay.
struct Slow {
    delay: Duration,
}

impl TenpaiService for Slow {
    fn query(&self, request: &TenpaiRequest, _cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        thread::sleep(self.delay);
        Ok(ReferenceAnalyzer.analyze(request))
    }
}

/// Blocks until cancelled while `block` is set.
#[derive(Default)]
struct Blocking {
    block: AtomicBool,
    started: AtomicUsize,
    cancelled: AtomicUsize,
}

impl TenpaiService for Blocking {
    fn query(&self, request: &TenpaiRequest, cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        if !self.block.load(Ordering::SeqCst) {
            return Ok(ReferenceAnalyzer.analyze(request));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(1));
        }
        self.cancelled.fetch_add(1, Ordering::SeqCst);
        Err(CollaboratorError::Cancelled)
    }
}

fn wait_for(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn broker_matches_sequential_survey() {
    let state = drawn_state(5_000);
    let broker = QueryBroker::new(Arc::new(ReferenceAnalyzer), Some(4)).unwrap();
    assert_eq!(broker.survey(&state), ReadinessSnapshot::survey(&state, &ReferenceAnalyzer));
}

#[test]
fn cache_avoids_repeat_queries() {
    let state = drawn_state(5_000);
    let service = Arc::new(Counting::default());
    let broker = QueryBroker::new(service.clone(), Some(2)).unwrap();

    let first = broker.survey(&state);
    let calls = service.calls.load(Ordering::SeqCst);
    assert!(calls > 0);
    assert_eq!(broker.cached_len(), calls);

    let second = broker.survey(&state);
    assert_eq!(first, second);
    assert_eq!(service.calls.load(Ordering::SeqCst), calls);
    assert_eq!(broker.generation(), 2);

    broker.clear_cache();
    assert_eq!(broker.cached_len(), 0);
    broker.survey(&state);
    assert_eq!(service.calls.load(Ordering::SeqCst), 2 * calls);
}

#[test]
fn slow_queries_time_out_and_fill_the_cache_later() {
    let state = drawn_state(20);
    let slow = Slow {
        delay: Duration::from_millis(200),
    };
    let broker = QueryBroker::new(Arc::new(slow), Some(4)).unwrap();

    let started = Instant::now();
    let snapshot = broker.survey(&state);
    assert!(started.elapsed() < Duration::from_millis(190));
    for seat in Seat::ALL {
        match snapshot.hand(&state, seat) {
            Probe::Failed(reason) => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("{seat}: expected a timeout, got {other:?}"),
        }
    }

    let planned = kifu_engine::readiness::plan(&state).len();
    wait_for(|| broker.cached_len() >= planned.min(4));
}

#[test]
fn new_survey_cancels_the_previous_one() {
    let state = drawn_state(10_000);
    let service = Arc::new(Blocking::default());
    service.block.store(true, Ordering::SeqCst);
    let broker = Arc::new(QueryBroker::new(service.clone(), Some(8)).unwrap());

    let first = {
        let broker = Arc::clone(&broker);
        let state = state.clone();
        thread::spawn(move || broker.survey(&state))
    };
    wait_for(|| service.started.load(Ordering::SeqCst) >= 1);

    service.block.store(false, Ordering::SeqCst);
    let second = broker.survey(&state);
    let first = first.join().unwrap();

    assert!(service.cancelled.load(Ordering::SeqCst) >= 1);
    let failed = Seat::ALL.iter().filter_map(|&s| first.seat(s)).any(|r| {
        matches!(r.hand, Probe::Failed(_)) || r.after_discard.values().any(|p| matches!(p, Probe::Failed(_)))
    });
    assert!(failed);
    for seat in Seat::ALL {
        assert!(matches!(second.hand(&state, seat), Probe::Known(_)), "{seat}");
    }
    assert_eq!(broker.generation(), 2);
}

#[test]
fn explicit_cancel_ends_the_survey_early() {
    let state = drawn_state(10_000);
    let service = Arc::new(Blocking::default());
    service.block.store(true, Ordering::SeqCst);
    let broker = Arc::new(QueryBroker::new(service.clone(), Some(8)).unwrap());

    let started = Instant::now();
    let survey = {
        let broker = Arc::clone(&broker);
        let state = state.clone();
        thread::spawn(move || broker.survey(&state))
    };
    wait_for(|| service.started.load(Ordering::SeqCst) >= 1);
    broker.cancel();

    let snapshot = survey.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    for seat in Seat::ALL {
        assert!(matches!(snapshot.hand(&state, seat), Probe::Failed(_)), "{seat}");
    }
    assert_eq!(broker.cached_len(), 0);
}
