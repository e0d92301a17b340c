use serde::{Deserialize, Serialize};

use crate::errors::{KifuError, KifuResult};

/// Per-round configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundRule {
    /// Invariant violations abort the transition instead of being reported
    /// as warnings. On for automated replay, off for manual editing.
    pub strict_invariants: bool,

    /// Fold the dead wall into the reserved end of the live wall. Used when
    /// indicators are entered by hand instead of taken from the wall.
    pub fold_dead_wall: bool,

    pub starting_points: i32,

    /// Deposit paid when declaring riichi.
    pub riichi_cost: i32,

    /// Upper bound for a single capability survey, in milliseconds.
    pub query_timeout_ms: u64,

    /// Substitute a random unseen tile when a manual draw finds the wall
    /// empty. Off by default.
    pub random_fallback_on_empty: bool,

    /// Indicator slots, including the one revealed at the deal.
    pub max_indicators: u8,
}

impl Default for RoundRule {
    fn default() -> Self {
        Self::default_replay()
    }
}

impl RoundRule {
    /// Log-driven replay: strict invariants, real dead wall.
    pub fn default_replay() -> Self {
        Self {
            strict_invariants: true,
            fold_dead_wall: false,
            starting_points: 25_000,
            riichi_cost: 1_000,
            query_timeout_ms: 5_000,
            random_fallback_on_empty: false,
            max_indicators: 5,
        }
    }

    /// Manual editing: advisory invariants, folded dead wall.
    pub fn default_manual() -> Self {
        Self {
            strict_invariants: false,
            fold_dead_wall: true,
            ..Self::default_replay()
        }
    }

    pub fn from_json_str(json: &str) -> KifuResult<Self> {
        let rule: RoundRule = serde_json::from_str(json).map_err(|e| KifuError::Config {
            message: e.to_string(),
        })?;
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> KifuResult<()> {
        if self.max_indicators == 0 || self.max_indicators > 5 {
            return Err(KifuError::Config {
                message: format!("max_indicators must be 1-5, got {}", self.max_indicators),
            });
        }
        if self.riichi_cost < 0 || self.starting_points < 0 {
            return Err(KifuError::Config {
                message: "points and riichi cost must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_where_expected() {
        let replay = RoundRule::default_replay();
        let manual = RoundRule::default_manual();
        assert!(replay.strict_invariants && !manual.strict_invariants);
        assert!(manual.fold_dead_wall && !replay.fold_dead_wall);
        assert_eq!(replay.query_timeout_ms, manual.query_timeout_ms);
        assert!(!replay.random_fallback_on_empty);
    }

    #[test]
    fn json_fills_defaults() {
        let rule = RoundRule::from_json_str(r#"{"strict_invariants": false, "riichi_cost": 1500}"#).unwrap();
        assert!(!rule.strict_invariants);
        assert_eq!(rule.riichi_cost, 1500);
        assert_eq!(rule.starting_points, 25_000);
    }

    #[test]
    fn json_rejects_bad_values() {
        assert!(RoundRule::from_json_str(r#"{"max_indicators": 9}"#).is_err());
        assert!(RoundRule::from_json_str("not json").is_err());
    }
}
