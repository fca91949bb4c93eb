//! Per-session timer tasks.
//!
//! Each stored session owns one task that sleeps until its next tick or its
//! hard deadline, whichever comes first. Resolving the session drops the stop
//! handle, which ends the task at its next suspension point.

use crate::{
    engine::{Engine, Live},
    ledger::Store,
};
use std::sync::Arc;
use tokio::{sync::oneshot, time::sleep_until};
use tracing::debug;

pub(crate) fn spawn<S: Store>(engine: Engine<S>, live: Arc<Live>, stop: oneshot::Receiver<()>) {
    tokio::spawn(run(engine, live, stop));
}

async fn run<S: Store>(engine: Engine<S>, live: Arc<Live>, mut stop: oneshot::Receiver<()>) {
    debug!(key = %live.key, "timer started");
    while let Some(due) = live.due().await {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = live.wake.notified() => continue,
            _ = sleep_until(due) => engine.on_timer(&live).await,
        }
    }
    debug!(key = %live.key, "timer stopped");
}
