//! Negotiation market.
//!
//! The player is shown a listing derived from their budget and may reroll it,
//! haggle once, or buy. Buying debits the price and resolves the resale in a
//! single draw. Nothing is at risk before `Buy`.

use super::{Context, Game, GameError, Resolution, Step};
use arcade_types::{
    Action, ActionKind, Display, Listing, MarketConfig, Participant, MAX_MARKET_SUCCESS,
};

/// Resale success probability for a quality rating.
pub fn success_probability(config: &MarketConfig, quality: u8) -> f64 {
    let steps = quality.saturating_sub(1) as f64;
    (config.success_base + steps * config.success_per_quality).min(MAX_MARKET_SUCCESS)
}

fn generate(budget: u64, ctx: &Context<'_>) -> Listing {
    let config = &ctx.config.market;
    let quality = ctx.rng.weighted(&config.quality_weights).unwrap_or(0) as u8 + 1;
    let price = (budget as f64 * ctx.rng.uniform(config.price_floor, 1.0)) as u64;
    Listing {
        quality,
        price: price.max(1),
        negotiable: true,
    }
}

#[derive(Clone, Debug)]
pub struct Market {
    player: Participant,
    budget: u64,
    listing: Listing,
    rerolls_left: u32,
}

impl Market {
    pub fn new(player: Participant, budget: u64, ctx: &Context<'_>) -> Self {
        Self {
            player,
            budget,
            listing: generate(budget, ctx),
            rerolls_left: ctx.config.market.max_rerolls,
        }
    }

    pub fn listing(&self) -> Listing {
        self.listing
    }

    fn abandon(&self) -> Resolution {
        Resolution::refund([(self.player, 0)])
    }
}

impl Game for Market {
    fn price(&self, action: &Action) -> Result<Option<(Participant, u64)>, GameError> {
        match action {
            Action::Buy => Ok(Some((self.player, self.listing.price))),
            Action::Reroll if self.rerolls_left == 0 => Err(GameError::NoRerolls),
            Action::Haggle if !self.listing.negotiable => Err(GameError::HaggleLocked),
            Action::Reroll | Action::Haggle => Ok(None),
            _ => Err(GameError::Unsupported),
        }
    }

    fn apply(&mut self, action: Action, ctx: &Context<'_>) -> Result<Step, GameError> {
        let config = &ctx.config.market;
        match action {
            Action::Reroll => {
                if self.rerolls_left == 0 {
                    return Err(GameError::NoRerolls);
                }
                let negotiable = self.listing.negotiable;
                self.listing = Listing {
                    negotiable,
                    ..generate(self.budget, ctx)
                };
                self.rerolls_left -= 1;
                Ok(Step::Continue)
            }
            Action::Haggle => {
                if !self.listing.negotiable {
                    return Err(GameError::HaggleLocked);
                }
                // One attempt per session, whatever the result.
                self.listing.negotiable = false;
                if ctx.rng.chance(config.haggle_chance) {
                    let discount = ctx.rng.uniform(config.min_discount, config.max_discount);
                    let price = (self.listing.price as f64 * (1.0 - discount)) as u64;
                    self.listing.price = price.max(1);
                }
                Ok(Step::Continue)
            }
            Action::Buy => {
                let price = self.listing.price;
                if ctx.rng.chance(success_probability(config, self.listing.quality)) {
                    let profit = ctx.rng.uniform(config.min_profit, config.max_profit);
                    let gross = (price as f64 * profit) as u64;
                    Ok(Step::Resolved(Resolution::win(self.player, price, gross, profit)))
                } else {
                    Ok(Step::Resolved(Resolution::loss(self.player, price, 0.0)))
                }
            }
            _ => Err(GameError::Unsupported),
        }
    }

    fn expire(&mut self, _ctx: &Context<'_>) -> Resolution {
        self.abandon()
    }

    fn cancel(&mut self) -> Result<Resolution, GameError> {
        Ok(self.abandon())
    }

    fn display(&self) -> Display {
        Display::Market {
            budget: self.budget,
            listing: self.listing,
            rerolls_left: self.rerolls_left,
        }
    }

    fn actions(&self) -> Vec<ActionKind> {
        let mut actions = vec![ActionKind::Buy];
        if self.rerolls_left > 0 {
            actions.push(ActionKind::Reroll);
        }
        if self.listing.negotiable {
            actions.push(ActionKind::Haggle);
        }
        actions.push(ActionKind::Cancel);
        actions
    }

    fn at_risk(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{games::Claim, GameRng};
    use arcade_types::EngineConfig;

    #[test]
    fn test_success_probability() {
        let config = MarketConfig::default();
        assert!((success_probability(&config, 1) - 0.35).abs() < 1e-9);
        assert!((success_probability(&config, 5) - 0.75).abs() < 1e-9);
        let generous = MarketConfig {
            success_base: 0.9,
            ..MarketConfig::default()
        };
        assert_eq!(success_probability(&generous, 5), MAX_MARKET_SUCCESS);
    }

    #[test]
    fn test_listing_within_budget() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(21);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        for _ in 0..500 {
            let listing = generate(1_000, &ctx);
            assert!((1..=5).contains(&listing.quality));
            assert!((600..=1_000).contains(&listing.price));
        }
    }

    #[test]
    fn test_reroll_limit() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(2);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut market = Market::new(Participant::new(1), 1_000, &ctx);
        for _ in 0..config.market.max_rerolls {
            assert_eq!(market.price(&Action::Reroll), Ok(None));
            assert_eq!(market.apply(Action::Reroll, &ctx), Ok(Step::Continue));
        }
        assert_eq!(market.price(&Action::Reroll), Err(GameError::NoRerolls));
        assert_eq!(market.apply(Action::Reroll, &ctx), Err(GameError::NoRerolls));
        assert!(!market.actions().contains(&ActionKind::Reroll));
    }

    #[test]
    fn test_haggle_once() {
        let config = EngineConfig::default();
        // Listing: quality 1, price 0.6 + 0.5 * 0.4 = 80% of budget.
        // Haggle succeeds (0.1 < 0.4) with discount 0.05 + 0.5 * 0.2 = 15%.
        let rng = GameRng::scripted([0.0, 0.5, 0.1, 0.5], 0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut market = Market::new(Participant::new(1), 1_000, &ctx);
        assert_eq!(market.listing().price, 800);
        assert_eq!(market.apply(Action::Haggle, &ctx), Ok(Step::Continue));
        assert_eq!(market.listing().price, 680);
        assert!(!market.listing().negotiable);
        assert_eq!(market.price(&Action::Haggle), Err(GameError::HaggleLocked));
        assert_eq!(market.apply(Action::Haggle, &ctx), Err(GameError::HaggleLocked));
    }

    #[test]
    fn test_failed_haggle_locks() {
        let config = EngineConfig::default();
        let rng = GameRng::scripted([0.0, 0.5, 0.9], 0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut market = Market::new(Participant::new(1), 1_000, &ctx);
        market.apply(Action::Haggle, &ctx).unwrap();
        assert_eq!(market.listing().price, 800);
        assert!(!market.actions().contains(&ActionKind::Haggle));

        // Rerolling does not unlock haggling.
        market.apply(Action::Reroll, &ctx).unwrap();
        assert!(!market.listing().negotiable);
    }

    #[test]
    fn test_buy() {
        let config = EngineConfig::default();
        // Quality 5 (weights 30/25/20/15/10), full price, resale succeeds at
        // 0.5 < 0.75, profit 1.2 + 0.5 * 1.3 = 1.85.
        let rng = GameRng::scripted([0.95, 0.999_999, 0.5, 0.5], 0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut market = Market::new(Participant::new(1), 1_000, &ctx);
        assert_eq!(market.listing().quality, 5);
        let price = market.listing().price;
        assert_eq!(market.price(&Action::Buy), Ok(Some((Participant::new(1), price))));
        let Ok(Step::Resolved(resolution)) = market.apply(Action::Buy, &ctx) else {
            panic!("buy must resolve");
        };
        let share = resolution.shares[0];
        assert_eq!(share.stake, price);
        assert_eq!(share.claim, Claim::Winnings((price as f64 * 1.85) as u64));
    }

    #[test]
    fn test_buy_failure_and_abandon() {
        let config = EngineConfig::default();
        let rng = GameRng::scripted([0.0, 0.5, 0.99], 0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut market = Market::new(Participant::new(1), 1_000, &ctx);
        let abandoned = market.cancel().unwrap();
        assert_eq!(abandoned.shares[0].stake, 0);
        assert_eq!(abandoned.shares[0].claim, Claim::Refund);

        let Ok(Step::Resolved(resolution)) = market.apply(Action::Buy, &ctx) else {
            panic!("buy must resolve");
        };
        assert_eq!(resolution.shares[0].claim, Claim::Forfeit);
        assert_eq!(resolution.shares[0].stake, 800);
    }
}
