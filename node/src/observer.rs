//! Engine event consumer.
//!
//! Stands in for the presentation and statistics collaborators: renders are
//! logged, outcomes are logged and folded into per-player tallies.

use arcade_types::{Event, Outcome, UserId, Verdict};
use std::collections::BTreeMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Running totals for one player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub played: u64,
    pub won: u64,
    pub lost: u64,
    pub refunded: u64,
    pub net: i64,
}

/// Per-player statistics built from outcome events.
#[derive(Debug, Default)]
pub struct Tally {
    players: BTreeMap<UserId, Stats>,
}

impl Tally {
    pub fn record(&mut self, outcome: &Outcome) {
        let stats = self.players.entry(outcome.participant).or_default();
        stats.played += 1;
        match outcome.verdict {
            Verdict::Win => stats.won += 1,
            Verdict::Loss => stats.lost += 1,
            Verdict::Refund => stats.refunded += 1,
        }
        stats.net += outcome.net_change;
    }

    pub fn get(&self, user: UserId) -> Option<&Stats> {
        self.players.get(&user)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &Stats)> {
        self.players.iter()
    }
}

/// Consume events until the engine (every sender) is dropped.
pub async fn run(mut events: broadcast::Receiver<Event>) -> Tally {
    let mut tally = Tally::default();
    loop {
        match events.recv().await {
            Ok(Event::Render(render)) => {
                debug!(key = %render.key, kind = %render.kind, display = ?render.display, "render");
            }
            Ok(Event::Outcome(outcome)) => {
                info!(
                    user = outcome.participant,
                    kind = %outcome.kind,
                    stake = outcome.stake,
                    verdict = ?outcome.verdict,
                    net = outcome.net_change,
                    forced = outcome.forced,
                    "outcome"
                );
                tally.record(&outcome);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "observer lagged, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_execution::{mocks::create_funded_engine, GameRng};
    use arcade_types::{EngineConfig, GameKind, Participant, StartRequest};

    fn outcome(participant: UserId, verdict: Verdict, net_change: i64) -> Outcome {
        Outcome {
            participant,
            kind: GameKind::Slot,
            stake: 10,
            verdict,
            net_change,
            multiplier: 0.0,
            forced: false,
        }
    }

    #[test]
    fn test_tally() {
        let mut tally = Tally::default();
        tally.record(&outcome(1, Verdict::Win, 15));
        tally.record(&outcome(1, Verdict::Loss, -10));
        tally.record(&outcome(2, Verdict::Refund, 0));

        assert_eq!(
            tally.get(1),
            Some(&Stats {
                played: 2,
                won: 1,
                lost: 1,
                refunded: 0,
                net: 5
            })
        );
        assert_eq!(tally.get(2).unwrap().refunded, 1);
        assert_eq!(tally.get(3), None);
        assert_eq!(tally.iter().count(), 2);
    }

    #[tokio::test]
    async fn test_run_until_engine_dropped() {
        let engine = create_funded_engine(
            EngineConfig::default(),
            GameRng::scripted([0.9, 0.0], 0),
            &[(1, 100)],
        )
        .await;
        let observer = tokio::spawn(run(engine.subscribe()));

        let request = StartRequest::solo(GameKind::CoinFlip, Participant::new(1), 10);
        engine.start_game(request).await.unwrap();
        engine.start_game(request).await.unwrap();
        drop(engine);

        let tally = observer.await.unwrap();
        let stats = tally.get(1).unwrap();
        assert_eq!(stats.played, 2);
        assert_eq!(stats.won, 1);
        assert_eq!(stats.lost, 1);
        // Lost 10, then won 19 (int(10 * 2.0) taxed at 5%) on a stake of 10.
        assert_eq!(stats.net, -10 + 9);
    }
}
