//! Kifu runtime
//!
//! Drives the `kifu-engine` round state machine: concurrent capability
//! surveys with timeout and cancellation, record replay, and batch self-play
//! used to check the engine's invariants at scale.

pub mod analysis;
pub mod broker;
pub mod replay;
pub mod simulator;
