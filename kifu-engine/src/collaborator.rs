//! Contracts for the two external analysis services.
//!
//! Tenpai analysis and hand scoring are black boxes. The engine only builds
//! requests, reads responses, and treats every failure, including a timeout,
//! as "unknown" rather than "no".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tile::{Tile, TileKind};
use crate::types::{Meld, Seat, Wind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("request timed out")]
    Timeout,
    #[error("request cancelled")]
    Cancelled,
    #[error("service error: {0}")]
    Service(String),
}

/// Shared cancellation flag handed to in-flight queries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tenpai
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeldShape {
    /// `CHI`, `PON` or `KAN`.
    pub kind: String,
    pub tiles: Vec<TileKind>,
}

impl MeldShape {
    pub fn from_meld(meld: &Meld) -> Self {
        let kind = if meld.is_quad() { "KAN" } else { meld.kind.label() };
        let mut tiles: Vec<TileKind> = meld.tiles.iter().map(|t| t.kind()).collect();
        tiles.sort();
        Self {
            kind: kind.to_string(),
            tiles,
        }
    }
}

/// Tiles are red-folded kinds; the cache relies on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenpaiRequest {
    pub tiles: Vec<TileKind>,
    pub melds: Vec<MeldShape>,
}

impl TenpaiRequest {
    pub fn new<'a>(tiles: impl IntoIterator<Item = &'a Tile>, melds: &[Meld]) -> Self {
        let mut kinds: Vec<TileKind> = tiles.into_iter().map(|t| t.kind()).collect();
        kinds.sort();
        Self {
            tiles: kinds,
            melds: melds.iter().map(MeldShape::from_meld).collect(),
        }
    }

    /// Normalized hand plus meld signature, e.g. `1m1m2m...#PON:5p5p5p`.
    pub fn cache_key(&self) -> String {
        let hand: String = self.tiles.iter().map(|k| k.to_string()).collect();
        let melds: Vec<String> = self
            .melds
            .iter()
            .map(|m| {
                let tiles: String = m.tiles.iter().map(|k| k.to_string()).collect();
                format!("{}:{}", m.kind, tiles)
            })
            .collect();
        format!("{}#{}", hand, melds.join("|"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenpaiResponse {
    /// 0 = tenpai, -1 = already complete.
    pub shanten: i8,
    #[serde(default)]
    pub waits: Vec<TileKind>,
}

impl TenpaiResponse {
    pub fn is_tenpai(&self) -> bool {
        self.shanten == 0 && !self.waits.is_empty()
    }
}

pub trait TenpaiService: Send + Sync {
    fn query(&self, request: &TenpaiRequest, cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError>;
}

impl<F> TenpaiService for F
where
    F: Fn(&TenpaiRequest, &CancelToken) -> Result<TenpaiResponse, CollaboratorError> + Send + Sync,
{
    fn query(&self, request: &TenpaiRequest, cancel: &CancelToken) -> Result<TenpaiResponse, CollaboratorError> {
        self(request, cancel)
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinType {
    Ron,
    Tsumo,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreMeld {
    pub kind: String,
    pub tiles: Vec<Tile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_tile: Option<Tile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub called_from: Option<Seat>,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub hand: Vec<Tile>,
    pub melds: Vec<ScoreMeld>,
    pub win_tile: Tile,
    pub win_type: WinType,
    pub is_closed: bool,
    pub riichi: bool,
    pub ippatsu: bool,
    pub round_wind: Wind,
    pub seat_wind: Wind,
    pub dora_indicators: Vec<Tile>,
    pub ura_dora_indicators: Vec<Tile>,
    pub honba: u32,
    pub riichi_sticks: u32,
    pub dealer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub menzen_tsumo: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub main: i32,
    /// Paid by each non-dealer on a non-dealer tsumo.
    #[serde(default)]
    pub additional: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub han: u32,
    pub fu: u32,
    #[serde(default)]
    pub yaku: Vec<String>,
    pub cost: Cost,
}

pub trait HandScorer: Send + Sync {
    fn score(&self, request: &ScoreRequest) -> Result<ScoreResponse, CollaboratorError>;
}

impl<F> HandScorer for F
where
    F: Fn(&ScoreRequest) -> Result<ScoreResponse, CollaboratorError> + Send + Sync,
{
    fn score(&self, request: &ScoreRequest) -> Result<ScoreResponse, CollaboratorError> {
        self(request)
    }
}
