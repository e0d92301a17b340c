//! Record replay against self-played rounds.
//!
//! A round is simulated, its opening captured as a checkpoint and its
//! history replayed through the query broker. Both runs must agree.

use std::sync::Arc;

use kifu_core::analysis::{FlatScorer, ReferenceAnalyzer};
use kifu_core::replay::{ReplayDriver, ReplayLog};
use kifu_core::simulator::{RandomSelector, RoundOutcome, RoundRunner};
use kifu_engine::rule::RoundRule;
use kifu_engine::types::Seat;
use kifu_engine::{Action, KifuError, Phase};

fn driver() -> ReplayDriver {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    ReplayDriver::new(Arc::new(ReferenceAnalyzer), Arc::new(FlatScorer::default()), Some(2)).unwrap()
}

fn played(seed: u64) -> (RoundRunner, ReplayLog) {
    let rule = RoundRule::default_replay();
    let mut runner = RoundRunner::new(rule, seed).unwrap();
    runner.run_to_completion(&mut RandomSelector::new(seed)).unwrap();
    let log = ReplayLog {
        rule: Some(rule),
        seed,
        checkpoint: runner.opening().clone(),
        actions: runner.state().history.clone(),
    };
    (runner, log)
}

#[test]
fn replay_reproduces_simulated_rounds() {
    let driver = driver();
    for seed in [1u64, 2, 3, 11, 29] {
        let (runner, log) = played(seed);
        let expected = runner.state();
        let outcome = driver.run(&log).unwrap();

        assert_eq!(outcome.steps, log.actions.len(), "seed {seed}");
        assert_eq!(outcome.state.phase, expected.phase, "seed {seed}");
        assert_eq!(outcome.state.meta.points, expected.meta.points, "seed {seed}");
        assert_eq!(outcome.state.results, expected.results, "seed {seed}");
        assert_eq!(outcome.wall_digest, expected.meta.wall.digest(), "seed {seed}");
        for seat in Seat::ALL {
            let (a, b) = (outcome.state.player(seat), expected.player(seat));
            assert_eq!(a.hand, b.hand, "seed {seed} {seat}");
            assert_eq!(a.melds, b.melds, "seed {seed} {seat}");
            assert_eq!(a.discards, b.discards, "seed {seed} {seat}");
            assert_eq!(a.riichi, b.riichi, "seed {seed} {seat}");
        }
        assert!(outcome.warnings.is_empty());
        if runner.outcome() == Some(RoundOutcome::Won) {
            assert_eq!(outcome.state.phase, Phase::Ended);
        }
    }
}

#[test]
fn desync_names_the_step() {
    let (_, mut log) = played(5);
    let bad = Action::Draw {
        seat: Seat::West,
        tile: None,
    };
    log.actions = vec![log.actions[0], log.actions[1], bad];

    let err = driver().run(&log).unwrap_err();
    assert!(err.to_string().contains("step 2"), "{err}");
    assert!(matches!(
        err.downcast_ref::<KifuError>(),
        Some(KifuError::IllegalAction { .. })
    ));
}

#[test]
fn replay_log_survives_json() {
    let (runner, log) = played(8);
    let json = serde_json::to_string(&log).unwrap();
    let parsed = ReplayLog::from_json_str(&json).unwrap();
    assert_eq!(parsed, log);

    let outcome = driver().run(&parsed).unwrap();
    assert_eq!(outcome.state.meta.points, runner.state().meta.points);
}

#[test]
fn missing_rule_falls_back_to_replay_defaults() {
    let (_, log) = played(13);
    let json = serde_json::json!({
        "checkpoint": log.checkpoint,
        "actions": &log.actions[..4],
    });
    let parsed = ReplayLog::from_json_str(&json.to_string()).unwrap();
    assert_eq!(parsed.rule, None);
    assert_eq!(parsed.seed, 0);

    let outcome = driver().run(&parsed).unwrap();
    assert_eq!(outcome.steps, 4);
    assert!(outcome.state.rule.strict_invariants);
}

#[test]
fn malformed_log_is_rejected() {
    let err = ReplayLog::from_json_str("{\"actions\": []}").unwrap_err();
    assert!(err.to_string().contains("parsing replay log"));
}
