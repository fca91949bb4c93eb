//! Crash: a multiplier climbing once per tick until a point fixed at creation.

use super::{payout, Context, Game, GameError, Resolution, Step};
use arcade_types::{Action, ActionKind, CrashConfig, Display, Participant};
use std::time::Duration;

/// Weight boost for the lowest bucket at this stake (1.0 below the first step).
pub fn low_boost(config: &CrashConfig, stake: u64) -> f64 {
    config
        .skew
        .iter()
        .rev()
        .find(|step| stake >= step.min_stake)
        .map(|step| step.low_boost)
        .unwrap_or(1.0)
}

/// Draw a crash point: pick a bucket by (skewed) weight, then uniform within it.
pub fn draw_point(config: &CrashConfig, stake: u64, ctx: &Context<'_>) -> f64 {
    let mut weights: Vec<f64> = config.buckets.iter().map(|b| b.weight).collect();
    if let Some(first) = weights.first_mut() {
        *first *= low_boost(config, stake);
    }
    match ctx.rng.weighted(&weights).and_then(|i| config.buckets.get(i)) {
        Some(bucket) => ctx.rng.uniform(bucket.from, bucket.to),
        None => 1.0,
    }
}

/// First tick whose multiplier reaches `point`. Always at least 1.
pub fn crash_tick(point: f64, step: f64) -> u32 {
    (((point - 1.0) / step).ceil().max(1.0)).min(u32::MAX as f64) as u32
}

#[derive(Clone, Debug)]
pub struct Crash {
    player: Participant,
    stake: u64,
    penalty: f64,
    step: f64,
    interval: Duration,
    point: f64,
    crash_tick: u32,
    tick: u32,
}

impl Crash {
    pub fn new(player: Participant, stake: u64, ctx: &Context<'_>) -> Self {
        let config = &ctx.config.crash;
        let point = draw_point(config, stake, ctx);
        Self {
            player,
            stake,
            penalty: ctx.config.penalty(stake),
            step: config.step,
            interval: Duration::from_millis(config.tick_ms),
            point,
            crash_tick: crash_tick(point, config.step),
            tick: 0,
        }
    }

    pub fn point(&self) -> f64 {
        self.point
    }

    pub fn crash_tick(&self) -> u32 {
        self.crash_tick
    }

    pub fn multiplier(&self) -> f64 {
        1.0 + self.tick as f64 * self.step
    }

    fn cash_out(&self) -> Resolution {
        let multiplier = self.multiplier();
        let gross = payout(self.stake, multiplier, self.penalty);
        Resolution::win(self.player, self.stake, gross, multiplier)
    }
}

impl Game for Crash {
    fn apply(&mut self, action: Action, _ctx: &Context<'_>) -> Result<Step, GameError> {
        match action {
            Action::CashOut => Ok(Step::Resolved(self.cash_out())),
            _ => Err(GameError::Unsupported),
        }
    }

    fn tick(&mut self, _ctx: &Context<'_>) -> Step {
        self.tick += 1;
        if self.tick >= self.crash_tick {
            return Step::Resolved(Resolution::loss(self.player, self.stake, self.point));
        }
        Step::Continue
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn expire(&mut self, _ctx: &Context<'_>) -> Resolution {
        self.cash_out()
    }

    fn cancel(&mut self) -> Result<Resolution, GameError> {
        if self.tick > 0 {
            return Err(GameError::CancelTooLate);
        }
        Ok(Resolution::refund([(self.player, self.stake)]))
    }

    fn display(&self) -> Display {
        Display::Crash {
            stake: self.stake,
            tick: self.tick,
            multiplier: self.multiplier(),
        }
    }

    fn actions(&self) -> Vec<ActionKind> {
        if self.tick == 0 {
            vec![ActionKind::CashOut, ActionKind::Cancel]
        } else {
            vec![ActionKind::CashOut]
        }
    }

    fn at_risk(&self) -> u64 {
        self.stake
    }
}
