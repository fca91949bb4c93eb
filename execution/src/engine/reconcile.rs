//! Settlement of terminal sessions into the ledger.

use super::Engine;
use crate::{
    games::{Claim, Resolution, Share},
    ledger::{Store, WinPolicy},
};
use arcade_types::{Event, GameKind, Outcome, Participant, Verdict, REFUND_SOURCE};
use tracing::{error, warn};

impl<S: Store> Engine<S> {
    /// Apply every share of `resolution` and publish one outcome per participant.
    ///
    /// A payout the ledger refuses is compensated by refunding the stake.
    pub(super) async fn reconcile(
        &self,
        kind: GameKind,
        resolution: &Resolution,
        forced: bool,
    ) -> Vec<Outcome> {
        let policy = WinPolicy::for_game(&self.config, kind);
        let mut outcomes = Vec::with_capacity(resolution.shares.len());
        for Share {
            participant,
            stake,
            claim,
        } in resolution.shares.iter().copied()
        {
            let lost = -(stake as i64);
            let (verdict, net_change) = match claim {
                Claim::Winnings(gross) => {
                    match self
                        .ledger
                        .settle_win(participant.id, gross, participant.premium, &policy, kind.name())
                        .await
                    {
                        Ok(settlement) => {
                            self.metrics.paid_out.inc_by(settlement.net);
                            (Verdict::Win, settlement.net as i64 - stake as i64)
                        }
                        Err(err) => {
                            warn!(user = participant.id, %kind, gross, ?err, "payout failed, refunding stake");
                            self.metrics.compensations.inc();
                            let refunded = self.refund(kind, participant, stake).await;
                            (Verdict::Refund, if refunded { 0 } else { lost })
                        }
                    }
                }
                Claim::Refund => {
                    let refunded = self.refund(kind, participant, stake).await;
                    (Verdict::Refund, if refunded { 0 } else { lost })
                }
                Claim::Forfeit => (Verdict::Loss, lost),
            };

            let outcome = Outcome {
                participant: participant.id,
                kind,
                stake,
                verdict,
                net_change,
                multiplier: resolution.multiplier,
                forced,
            };
            self.publish(Event::Outcome(outcome.clone()));
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Return a stake untaxed. A failure is logged for manual correction.
    pub(super) async fn refund(&self, kind: GameKind, participant: Participant, amount: u64) -> bool {
        if amount == 0 {
            return true;
        }
        match self
            .ledger
            .credit(participant.id, amount, REFUND_SOURCE, kind.name())
            .await
        {
            Ok(_) => {
                self.metrics.refunded.inc_by(amount);
                true
            }
            Err(err) => {
                error!(
                    user = participant.id,
                    amount,
                    %kind,
                    ?err,
                    "refund failed, manual correction required"
                );
                false
            }
        }
    }
}
