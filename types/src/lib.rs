//! Shared vocabulary of the arcade engine: game kinds, session keys, player
//! actions, the events published to collaborators, and engine configuration.

mod config;
mod constants;
mod event;
mod game;

pub use config::*;
pub use constants::*;
pub use event::*;
pub use game::*;
