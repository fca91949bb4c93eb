//! Escalating-risk games (risk levels, mines).
//!
//! Each `Continue` survives with probability `1 - bust_probability(step)`;
//! survival grows the multiplier by the tier's growth factor. Cashing out pays
//! the stake at the current multiplier.

use super::{payout, Context, Game, GameError, Resolution, Step};
use arcade_types::{Action, ActionKind, Display, Participant, RiskTier, MAX_BUST_PROBABILITY};

/// Bust probability of the next step. Never exceeds the tier cap (itself < 1).
pub fn bust_probability(tier: &RiskTier, step: u32) -> f64 {
    (tier.base + step as f64 * tier.increment)
        .min(tier.cap)
        .min(MAX_BUST_PROBABILITY)
}

#[derive(Clone, Debug)]
pub struct Ladder {
    player: Participant,
    stake: u64,
    tier: RiskTier,
    penalty: f64,
    step: u32,
    multiplier: f64,
}

impl Ladder {
    pub fn new(player: Participant, stake: u64, tier: RiskTier, penalty: f64) -> Self {
        Self {
            player,
            stake,
            tier,
            penalty,
            step: 0,
            multiplier: 1.0,
        }
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    fn cash_out(&self) -> Resolution {
        let gross = payout(self.stake, self.multiplier, self.penalty);
        Resolution::win(self.player, self.stake, gross, self.multiplier)
    }
}

impl Game for Ladder {
    fn apply(&mut self, action: Action, ctx: &Context<'_>) -> Result<Step, GameError> {
        match action {
            Action::Continue => {
                if ctx.rng.chance(bust_probability(&self.tier, self.step)) {
                    return Ok(Step::Resolved(Resolution::loss(
                        self.player,
                        self.stake,
                        self.multiplier,
                    )));
                }
                self.step += 1;
                self.multiplier *= self.tier.growth;
                Ok(Step::Continue)
            }
            Action::CashOut => Ok(Step::Resolved(self.cash_out())),
            _ => Err(GameError::Unsupported),
        }
    }

    fn expire(&mut self, _ctx: &Context<'_>) -> Resolution {
        self.cash_out()
    }

    fn cancel(&mut self) -> Result<Resolution, GameError> {
        if self.step > 0 {
            return Err(GameError::CancelTooLate);
        }
        Ok(Resolution::refund([(self.player, self.stake)]))
    }

    fn display(&self) -> Display {
        Display::Ladder {
            stake: self.stake,
            step: self.step,
            multiplier: self.multiplier,
            bust_chance: bust_probability(&self.tier, self.step),
        }
    }

    fn actions(&self) -> Vec<ActionKind> {
        let mut actions = vec![ActionKind::Continue, ActionKind::CashOut];
        if self.step == 0 {
            actions.push(ActionKind::Cancel);
        }
        actions
    }

    fn at_risk(&self) -> u64 {
        self.stake
    }
}
