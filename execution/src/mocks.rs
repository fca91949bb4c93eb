use crate::{Engine, GameRng, Memory};
use arcade_types::{EngineConfig, Event, Outcome, Participant, UserId};
use tokio::sync::broadcast;

/// Creates an engine over an empty in-memory ledger
pub fn create_engine(config: EngineConfig, rng: GameRng) -> Engine<Memory> {
    Engine::new(config, Memory::default(), rng)
}

/// Creates an engine whose ledger already holds `balances`
pub async fn create_funded_engine(
    config: EngineConfig,
    rng: GameRng,
    balances: &[(UserId, u64)],
) -> Engine<Memory> {
    let engine = create_engine(config, rng);
    for (user, amount) in balances {
        engine
            .ledger()
            .credit(*user, *amount, "grant", "test funds")
            .await
            .expect("failed to fund test account");
    }
    engine
}

/// Creates a regular (non-premium) participant
pub fn create_participant(id: UserId) -> Participant {
    Participant::new(id)
}

/// Drains every event currently buffered on `receiver`
pub fn drain_events(receiver: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Outcome events among `events`
pub fn outcomes(events: &[Event]) -> Vec<Outcome> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Outcome(outcome) => Some(outcome.clone()),
            Event::Render(_) => None,
        })
        .collect()
}
