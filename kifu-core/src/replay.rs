//! Replays a recorded action list against a checkpoint.
//!
//! Every step is applied under strict invariants with fresh readiness from
//! the query broker. The first action the engine rejects stops the replay,
//! and the error names the step index.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use kifu_engine::collaborator::{HandScorer, TenpaiService};
use kifu_engine::rule::RoundRule;
use kifu_engine::seeding::session_seed_from_u64;
use kifu_engine::state::invariants::Violation;
use kifu_engine::state::RoundCheckpoint;
use kifu_engine::{Action, ActionType, ApplyContext, GameState, GameStateTransitions, Phase};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::broker::QueryBroker;

/// A round as an external log adapter hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    #[serde(default)]
    pub rule: Option<RoundRule>,
    /// Session seed, used to rebuild an unrecorded wall.
    #[serde(default)]
    pub seed: u64,
    pub checkpoint: RoundCheckpoint,
    pub actions: Vec<Action>,
}

impl ReplayLog {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("parsing replay log")
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub state: GameState,
    pub wall_digest: String,
    /// Actions applied, counting a joint ron as one step per declaration.
    pub steps: usize,
    pub notices: Vec<String>,
    pub warnings: Vec<Violation>,
}

pub struct ReplayDriver {
    broker: QueryBroker,
    scorer: Arc<dyn HandScorer>,
}

impl ReplayDriver {
    pub fn new(
        service: Arc<dyn TenpaiService>,
        scorer: Arc<dyn HandScorer>,
        num_threads: Option<usize>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            broker: QueryBroker::new(service, num_threads)?,
            scorer,
        })
    }

    pub fn broker(&self) -> &QueryBroker {
        &self.broker
    }

    pub fn run(&self, log: &ReplayLog) -> anyhow::Result<ReplayOutcome> {
        let rule = RoundRule {
            strict_invariants: true,
            ..log.rule.unwrap_or_else(RoundRule::default_replay)
        };
        let seed = session_seed_from_u64(log.seed);
        let mut state =
            GameState::from_checkpoint(log.checkpoint.clone(), rule, &seed).context("loading replay checkpoint")?;
        if state.phase == Phase::AwaitingCall {
            let readiness = self.broker.survey(&state);
            state.refresh_claims(&readiness);
        }

        let mut notices = Vec::new();
        let mut warnings = Vec::new();
        let mut i = 0;
        while i < log.actions.len() {
            let action = log.actions[i];
            let readiness = self.broker.survey(&state);
            let ctx = ApplyContext::new(&readiness, self.scorer.as_ref());

            // Consecutive rons on one discard are a joint win.
            let rons = log.actions[i..]
                .iter()
                .take_while(|a| a.action_type() == ActionType::Ron)
                .count();
            let (transition, consumed) = if rons > 1 {
                let responses: HashMap<_, _> = log.actions[i..i + rons].iter().map(|a| (a.seat(), *a)).collect();
                let t = state
                    .apply_responses(&responses, &ctx)
                    .with_context(|| format!("replay desync at step {i} (joint ron by {rons} seats)"))?;
                (t, rons)
            } else {
                let t = state
                    .apply(action, &ctx)
                    .with_context(|| format!("replay desync at step {i} ({action})"))?;
                (t, 1)
            };

            for notice in &transition.notices {
                warn!(step = i, %notice, "replay notice");
            }
            debug!(step = i, %action, phase = ?transition.state.phase, "replayed");
            notices.extend(transition.notices);
            warnings.extend(transition.warnings);
            state = transition.state;
            i += consumed;
        }

        let wall_digest = state.meta.wall.digest();
        info!(steps = i, ended = state.is_ended(), digest = %wall_digest, "replay finished");
        Ok(ReplayOutcome {
            state,
            wall_digest,
            steps: i,
            notices,
            warnings,
        })
    }
}
