//! Self-play of single rounds, batched with rayon.
//!
//! Rounds run on the reference analyzer and a flat scorer. Each step
//! surveys readiness, asks a selector for one of the legal actions and
//! applies it under strict invariants, so a finished batch doubles as a
//! consistency check of the engine.

use std::collections::HashMap;

use kifu_engine::rule::RoundRule;
use kifu_engine::seeding::session_seed_from_u64;
use kifu_engine::state::{RoundCheckpoint, RoundHeader};
use kifu_engine::types::{Seat, NUM_SEATS};
use kifu_engine::{
    Action, ApplyContext, GameState, GameStateLegalActions, GameStateTransitions, KifuError, Phase, ReadinessSnapshot,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::analysis::{FlatScorer, Memoized, ReferenceAnalyzer};

/// Upper bound on applied actions per round.
const MAX_STEPS: u32 = 2_000;

/// Picks one of the legal actions for a seat.
pub trait ActionSelector {
    fn select_action(&mut self, seat: Seat, legal_actions: &[Action]) -> Action;
}

/// Always the first legal action.
pub struct FirstActionSelector;

impl ActionSelector for FirstActionSelector {
    fn select_action(&mut self, _seat: Seat, legal_actions: &[Action]) -> Action {
        legal_actions[0]
    }
}

/// Uniform choice from a seeded stream.
pub struct RandomSelector {
    rng: ChaCha8Rng,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl ActionSelector for RandomSelector {
    fn select_action(&mut self, _seat: Seat, legal_actions: &[Action]) -> Action {
        legal_actions[self.rng.random_range(0..legal_actions.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Won,
    /// The wall ran out.
    Exhausted,
    StepLimit,
}

#[derive(Debug, Clone)]
pub struct RoundResult {
    pub points: [i32; NUM_SEATS],
    pub riichi_sticks: u32,
    pub outcome: RoundOutcome,
    pub actions: u32,
    pub wins: usize,
    pub seed: u64,
}

pub struct RoundRunner {
    state: GameState,
    opening: RoundCheckpoint,
    analyzer: Memoized<ReferenceAnalyzer>,
    scorer: FlatScorer,
    actions: u32,
    outcome: Option<RoundOutcome>,
    seed: u64,
}

impl RoundRunner {
    pub fn new(rule: RoundRule, seed: u64) -> anyhow::Result<Self> {
        let state = GameState::deal(rule, RoundHeader::opening(&rule), &session_seed_from_u64(seed))?;
        Ok(Self {
            opening: RoundCheckpoint::capture(&state),
            state,
            analyzer: Memoized::new(ReferenceAnalyzer),
            scorer: FlatScorer::default(),
            actions: 0,
            outcome: None,
            seed,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The round as dealt, wall order included.
    pub fn opening(&self) -> &RoundCheckpoint {
        &self.opening
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn total_actions(&self) -> u32 {
        self.actions
    }

    /// Advances by one decision. Returns false once the round is over.
    pub fn step_once(&mut self, selector: &mut dyn ActionSelector) -> anyhow::Result<bool> {
        if self.outcome.is_some() {
            return Ok(false);
        }
        if self.state.is_ended() {
            self.outcome = Some(RoundOutcome::Won);
            return Ok(false);
        }
        if self.actions >= MAX_STEPS {
            self.outcome = Some(RoundOutcome::StepLimit);
            return Ok(false);
        }

        let readiness = ReadinessSnapshot::survey(&self.state, &self.analyzer);
        let ctx = ApplyContext::new(&readiness, &self.scorer);
        let result = match self.state.phase {
            Phase::AwaitingCall => {
                let seats: Vec<Seat> = self.state.pending_claims.iter().map(|c| c.seat()).collect();
                let mut responses = HashMap::new();
                for seat in seats {
                    if responses.contains_key(&seat) {
                        continue;
                    }
                    let legal = self.state.legal_actions(&readiness, Some(seat));
                    if !legal.is_empty() {
                        responses.insert(seat, selector.select_action(seat, &legal));
                    }
                }
                self.state.apply_responses(&responses, &ctx)
            }
            _ => {
                let legal = self.state.legal_actions(&readiness, None);
                if legal.is_empty() {
                    anyhow::bail!("no legal action in {:?} for {}", self.state.phase, self.state.turn);
                }
                let action = selector.select_action(self.state.turn, &legal);
                self.state.apply(action, &ctx)
            }
        };

        match result {
            Ok(transition) => {
                self.state = transition.state;
                self.actions += 1;
                if self.state.is_ended() {
                    self.outcome = Some(RoundOutcome::Won);
                    return Ok(false);
                }
                Ok(true)
            }
            Err(KifuError::WallEmpty) => {
                self.outcome = Some(RoundOutcome::Exhausted);
                Ok(false)
            }
            Err(e) => Err(anyhow::Error::new(e).context(format!("seed {} step {}", self.seed, self.actions))),
        }
    }

    pub fn run_to_completion(&mut self, selector: &mut dyn ActionSelector) -> anyhow::Result<RoundResult> {
        while self.step_once(selector)? {}
        let result = self.result();
        debug!(seed = self.seed, actions = result.actions, outcome = ?result.outcome, "round finished");
        Ok(result)
    }

    pub fn result(&self) -> RoundResult {
        RoundResult {
            points: self.state.meta.points,
            riichi_sticks: self.state.meta.riichi_sticks,
            outcome: self.outcome.unwrap_or(RoundOutcome::StepLimit),
            actions: self.actions,
            wins: self.state.results.len(),
            seed: self.seed,
        }
    }
}

/// Plays one round with a seeded random selector.
pub fn simulate_round(rule: RoundRule, seed: u64) -> anyhow::Result<RoundResult> {
    let mut runner = RoundRunner::new(rule, seed)?;
    let mut selector = RandomSelector::new(seed);
    runner.run_to_completion(&mut selector)
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub num_rounds: usize,
    /// Round `i` uses `base_seed + i`.
    pub base_seed: u64,
    pub rule: RoundRule,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_rounds: 100,
            base_seed: 0,
            rule: RoundRule::default_replay(),
        }
    }
}

/// Runs rounds in parallel on a dedicated rayon ThreadPool.
pub struct BatchSimulator {
    pool: rayon::ThreadPool,
}

impl BatchSimulator {
    pub fn new(num_threads: Option<usize>) -> anyhow::Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build thread pool: {}", e))?;
        Ok(Self { pool })
    }

    /// Results in round order. A round that breaks an engine invariant
    /// fails the whole batch.
    pub fn run_batch(&self, config: &BatchConfig) -> anyhow::Result<Vec<RoundResult>> {
        let rule = config.rule;
        let base_seed = config.base_seed;
        self.pool.install(|| {
            (0..config.num_rounds)
                .into_par_iter()
                .map(|i| simulate_round(rule, base_seed.wrapping_add(i as u64)))
                .collect()
        })
    }
}
