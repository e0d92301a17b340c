pub mod collaborator;
pub mod errors;
pub mod readiness;
pub mod scoring;
pub mod tile;
pub mod types;

pub mod action;
pub mod parser;
pub mod rule;
pub mod seeding;
pub mod state;

pub use action::{Action, ActionType, Phase};
pub use errors::{KifuError, KifuResult};
pub use readiness::ReadinessSnapshot;
pub use state::legal_actions::GameStateLegalActions;
pub use state::transitions::{ApplyContext, GameStateTransitions, Transition};
pub use state::GameState;
