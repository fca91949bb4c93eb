pub mod engine;
pub mod games;
pub mod ledger;
pub mod sessions;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

mod error;
mod metrics;
mod rng;
mod scheduler;

pub use engine::{Engine, Progress};
pub use error::EngineError;
pub use ledger::{Ledger, LedgerError, Memory, Store};
pub use metrics::Metrics;
pub use rng::GameRng;
