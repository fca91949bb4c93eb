use crate::{
    GameKind, BASIS_POINTS, DEFAULT_PREMIUM_TAX_BPS, DEFAULT_SESSION_DEADLINE_MS,
    DEFAULT_TAX_BPS, MAX_BUST_PROBABILITY, RISK_LEVELS,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;

/// Read-only tuning consumed by the engine.
///
/// Every table here is configuration rather than code so it can be retuned
/// without touching game logic. Missing sections fall back to [Default].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard lifetime of every session.
    pub session_deadline_ms: u64,
    /// Capacity of the render/outcome broadcast channel.
    pub event_buffer: usize,
    pub tax: TaxConfig,
    /// Limits for any game without an entry in `limits`.
    pub default_limits: Limits,
    pub limits: BTreeMap<GameKind, Limits>,
    /// Payout damping for large stakes, ordered by ascending `min_stake`.
    pub stake_penalty: Vec<PenaltyStep>,
    pub single: SingleShotConfig,
    pub ladders: LadderConfig,
    pub crash: CrashConfig,
    pub pools: PoolConfig,
    pub market: MarketConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    pub base_bps: u64,
    pub premium_bps: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub min_stake: u64,
    pub max_stake: u64,
    /// Largest gross payout a single session may credit (before tax).
    pub max_payout: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PenaltyStep {
    pub min_stake: u64,
    pub factor: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub win_probability: f64,
    pub multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub symbol: String,
    /// Zero marks a losing symbol.
    pub multiplier: f64,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleShotConfig {
    pub coin_flip: Odds,
    pub dice: Odds,
    pub slot: Vec<Prize>,
}

/// Bust curve of one escalating-risk variant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskTier {
    pub base: f64,
    pub increment: f64,
    pub cap: f64,
    pub growth: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    pub risk: Vec<RiskTier>,
    pub mines: Vec<RiskTier>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrashBucket {
    pub from: f64,
    pub to: f64,
    pub weight: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkewStep {
    pub min_stake: u64,
    /// Multiplier applied to the weight of the lowest bucket.
    pub low_boost: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    pub tick_ms: u64,
    /// Multiplier gained per tick.
    pub step: f64,
    pub buckets: Vec<CrashBucket>,
    pub skew: Vec<SkewStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRules {
    pub min_participants: usize,
    pub max_participants: usize,
    /// Elimination interval, or the selection delay for weighted pots.
    pub tick_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub rulet: PoolRules,
    pub frekaz: PoolRules,
    pub duel: PoolRules,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub max_rerolls: u32,
    /// Cheapest listing as a fraction of the budget.
    pub price_floor: f64,
    pub haggle_chance: f64,
    pub min_discount: f64,
    pub max_discount: f64,
    /// Relative weights of quality ratings 1..=5.
    pub quality_weights: Vec<f64>,
    pub success_base: f64,
    pub success_per_quality: f64,
    pub min_profit: f64,
    pub max_profit: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    NonZero { field: String },
    #[error("{field} must be <= 10000 basis points (got {value})")]
    Rate { field: String, value: u64 },
    #[error("premium tax ({premium} bps) exceeds base tax ({base} bps)")]
    PremiumTax { base: u64, premium: u64 },
    #[error("{field} must be a probability within [0, {max}] (got {value})")]
    Probability { field: String, value: f64, max: f64 },
    #[error("{field} must be > 1.0 (got {value})")]
    Growth { field: String, value: f64 },
    #[error("{field} must not be empty")]
    Empty { field: String },
    #[error("{field} range is invalid ({low} > {high})")]
    Range { field: String, low: f64, high: f64 },
    #[error("stake bounds for {kind} are invalid (min {min}, max {max})")]
    StakeBounds { kind: String, min: u64, max: u64 },
    #[error("{field} participants are invalid (min {min}, max {max})")]
    Participants { field: String, min: usize, max: usize },
    #[error("{field} must have {expected} entries (got {got})")]
    Length {
        field: String,
        expected: usize,
        got: usize,
    },
    #[error("stake_penalty[{index}] must have ascending stakes and non-increasing factors in (0, 1]")]
    Penalty { index: usize },
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_deadline_ms: DEFAULT_SESSION_DEADLINE_MS,
            event_buffer: 1_024,
            tax: TaxConfig::default(),
            default_limits: Limits::default(),
            limits: BTreeMap::new(),
            stake_penalty: vec![
                PenaltyStep {
                    min_stake: 10_000,
                    factor: 0.95,
                },
                PenaltyStep {
                    min_stake: 50_000,
                    factor: 0.9,
                },
                PenaltyStep {
                    min_stake: 100_000,
                    factor: 0.8,
                },
            ],
            single: SingleShotConfig::default(),
            ladders: LadderConfig::default(),
            crash: CrashConfig::default(),
            pools: PoolConfig::default(),
            market: MarketConfig::default(),
        }
    }
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            base_bps: DEFAULT_TAX_BPS,
            premium_bps: DEFAULT_PREMIUM_TAX_BPS,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_stake: 10,
            max_stake: 100_000,
            max_payout: 1_000_000,
        }
    }
}

impl Default for SingleShotConfig {
    fn default() -> Self {
        let prize = |symbol: &str, multiplier: f64, weight: f64| Prize {
            symbol: symbol.to_string(),
            multiplier,
            weight,
        };
        Self {
            coin_flip: Odds {
                win_probability: 0.48,
                multiplier: 2.0,
            },
            dice: Odds {
                win_probability: 1.0 / 6.0,
                multiplier: 5.5,
            },
            slot: vec![
                prize("seven", 25.0, 1.0),
                prize("bar", 10.0, 3.0),
                prize("bell", 5.0, 6.0),
                prize("cherry", 2.0, 15.0),
                prize("miss", 0.0, 75.0),
            ],
        }
    }
}

impl Default for LadderConfig {
    fn default() -> Self {
        // Higher levels start riskier, escalate faster, and grow faster.
        let risk = (0..RISK_LEVELS)
            .map(|level| {
                let level = level as f64;
                RiskTier {
                    base: 0.05 + 0.01 * level,
                    increment: 0.02 + 0.002 * level,
                    cap: 0.9,
                    growth: 1.1 + 0.025 * level,
                }
            })
            .collect();
        // One tier per number of mines on the field (1..=5).
        let mines = (1..=5)
            .map(|mines| {
                let mines = mines as f64;
                RiskTier {
                    base: 0.04 * mines,
                    increment: 0.01 * mines,
                    cap: 0.85,
                    growth: 1.0 + 0.06 * mines,
                }
            })
            .collect();
        Self { risk, mines }
    }
}

impl Default for CrashConfig {
    fn default() -> Self {
        let bucket = |from: f64, to: f64, weight: f64| CrashBucket { from, to, weight };
        Self {
            tick_ms: 1_000,
            step: 0.1,
            buckets: vec![
                bucket(1.0, 1.5, 45.0),
                bucket(1.5, 2.0, 25.0),
                bucket(2.0, 3.0, 15.0),
                bucket(3.0, 5.0, 9.0),
                bucket(5.0, 10.0, 5.0),
                bucket(10.0, 20.0, 1.0),
            ],
            skew: vec![
                SkewStep {
                    min_stake: 5_000,
                    low_boost: 1.5,
                },
                SkewStep {
                    min_stake: 20_000,
                    low_boost: 2.0,
                },
                SkewStep {
                    min_stake: 100_000,
                    low_boost: 3.0,
                },
            ],
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            rulet: PoolRules {
                min_participants: 2,
                max_participants: 10,
                tick_ms: 10_000,
            },
            frekaz: PoolRules {
                min_participants: 2,
                max_participants: 20,
                tick_ms: 30_000,
            },
            duel: PoolRules {
                min_participants: 2,
                max_participants: 2,
                tick_ms: 3_000,
            },
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_rerolls: 3,
            price_floor: 0.6,
            haggle_chance: 0.4,
            min_discount: 0.05,
            max_discount: 0.25,
            quality_weights: vec![30.0, 25.0, 20.0, 15.0, 10.0],
            success_base: 0.35,
            success_per_quality: 0.1,
            min_profit: 1.2,
            max_profit: 2.5,
        }
    }
}

impl EngineConfig {
    pub fn session_deadline(&self) -> Duration {
        Duration::from_millis(self.session_deadline_ms)
    }

    pub fn limits(&self, kind: GameKind) -> Limits {
        self.limits.get(&kind).copied().unwrap_or(self.default_limits)
    }

    /// Win tax in basis points for the given account type.
    pub fn tax_bps(&self, premium: bool) -> u64 {
        if premium {
            self.tax.premium_bps
        } else {
            self.tax.base_bps
        }
    }

    /// Payout damping factor for a stake (1.0 below the first step).
    pub fn penalty(&self, stake: u64) -> f64 {
        self.stake_penalty
            .iter()
            .rev()
            .find(|step| stake >= step.min_stake)
            .map(|step| step.factor)
            .unwrap_or(1.0)
    }

    pub fn ladder_tier(&self, kind: GameKind, variant: u8) -> Option<&RiskTier> {
        match kind {
            GameKind::Risk => self.ladders.risk.get(variant as usize),
            GameKind::Mines => self.ladders.mines.get(variant as usize),
            _ => None,
        }
    }

    pub fn pool_rules(&self, kind: GameKind) -> Option<&PoolRules> {
        match kind {
            GameKind::Rulet => Some(&self.pools.rulet),
            GameKind::Frekaz => Some(&self.pools.frekaz),
            GameKind::Duel => Some(&self.pools.duel),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_deadline_ms == 0 {
            return Err(non_zero("session_deadline_ms"));
        }
        if self.event_buffer == 0 {
            return Err(non_zero("event_buffer"));
        }

        // Tax
        for (field, value) in [
            ("tax.base_bps", self.tax.base_bps),
            ("tax.premium_bps", self.tax.premium_bps),
        ] {
            if value > BASIS_POINTS {
                return Err(ConfigError::Rate {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if self.tax.premium_bps > self.tax.base_bps {
            return Err(ConfigError::PremiumTax {
                base: self.tax.base_bps,
                premium: self.tax.premium_bps,
            });
        }

        // Limits
        validate_limits("default", &self.default_limits)?;
        for (kind, limits) in &self.limits {
            validate_limits(kind.name(), limits)?;
        }

        // Stake penalty
        let mut previous: Option<&PenaltyStep> = None;
        for (index, step) in self.stake_penalty.iter().enumerate() {
            let in_range = step.factor > 0.0 && step.factor <= 1.0;
            let ordered = previous
                .map(|p| step.min_stake > p.min_stake && step.factor <= p.factor)
                .unwrap_or(true);
            if !in_range || !ordered {
                return Err(ConfigError::Penalty { index });
            }
            previous = Some(step);
        }

        // Single-shot games
        for (field, odds) in [
            ("single.coin_flip", &self.single.coin_flip),
            ("single.dice", &self.single.dice),
        ] {
            probability(&format!("{field}.win_probability"), odds.win_probability, 1.0)?;
            if odds.multiplier <= 1.0 {
                return Err(ConfigError::Growth {
                    field: format!("{field}.multiplier"),
                    value: odds.multiplier,
                });
            }
        }
        if self.single.slot.is_empty() {
            return Err(empty("single.slot"));
        }
        for (i, prize) in self.single.slot.iter().enumerate() {
            if prize.weight <= 0.0 || prize.multiplier < 0.0 {
                return Err(non_zero(&format!("single.slot[{i}].weight")));
            }
        }

        // Ladders
        for (field, tiers) in [
            ("ladders.risk", &self.ladders.risk),
            ("ladders.mines", &self.ladders.mines),
        ] {
            if tiers.is_empty() {
                return Err(empty(field));
            }
            for (i, tier) in tiers.iter().enumerate() {
                validate_tier(&format!("{field}[{i}]"), tier)?;
            }
        }

        // Crash
        if self.crash.tick_ms == 0 {
            return Err(non_zero("crash.tick_ms"));
        }
        if self.crash.step <= 0.0 {
            return Err(non_zero("crash.step"));
        }
        if self.crash.buckets.is_empty() {
            return Err(empty("crash.buckets"));
        }
        for (i, bucket) in self.crash.buckets.iter().enumerate() {
            if bucket.weight <= 0.0 {
                return Err(non_zero(&format!("crash.buckets[{i}].weight")));
            }
            if bucket.from < 1.0 || bucket.from > bucket.to {
                return Err(ConfigError::Range {
                    field: format!("crash.buckets[{i}]"),
                    low: bucket.from,
                    high: bucket.to,
                });
            }
        }
        for (i, skew) in self.crash.skew.iter().enumerate() {
            if skew.low_boost < 1.0 {
                return Err(ConfigError::Growth {
                    field: format!("crash.skew[{i}].low_boost"),
                    value: skew.low_boost,
                });
            }
        }

        // Pools
        for (field, rules) in [
            ("pools.rulet", &self.pools.rulet),
            ("pools.frekaz", &self.pools.frekaz),
            ("pools.duel", &self.pools.duel),
        ] {
            if rules.min_participants < 2 || rules.max_participants < rules.min_participants {
                return Err(ConfigError::Participants {
                    field: field.to_string(),
                    min: rules.min_participants,
                    max: rules.max_participants,
                });
            }
            if rules.tick_ms == 0 {
                return Err(non_zero(&format!("{field}.tick_ms")));
            }
        }

        // Market
        let market = &self.market;
        probability("market.price_floor", market.price_floor, 1.0)?;
        probability("market.haggle_chance", market.haggle_chance, 1.0)?;
        probability("market.min_discount", market.min_discount, 1.0)?;
        probability("market.max_discount", market.max_discount, 1.0)?;
        probability("market.success_base", market.success_base, 1.0)?;
        probability("market.success_per_quality", market.success_per_quality, 1.0)?;
        if market.price_floor == 0.0 {
            return Err(non_zero("market.price_floor"));
        }
        if market.min_discount > market.max_discount {
            return Err(ConfigError::Range {
                field: "market.discount".to_string(),
                low: market.min_discount,
                high: market.max_discount,
            });
        }
        if market.min_profit <= 1.0 {
            return Err(ConfigError::Growth {
                field: "market.min_profit".to_string(),
                value: market.min_profit,
            });
        }
        if market.min_profit > market.max_profit {
            return Err(ConfigError::Range {
                field: "market.profit".to_string(),
                low: market.min_profit,
                high: market.max_profit,
            });
        }
        if market.quality_weights.len() != 5 {
            return Err(ConfigError::Length {
                field: "market.quality_weights".to_string(),
                expected: 5,
                got: market.quality_weights.len(),
            });
        }
        if market.quality_weights.iter().any(|w| *w < 0.0)
            || market.quality_weights.iter().all(|w| *w == 0.0)
        {
            return Err(non_zero("market.quality_weights"));
        }

        Ok(())
    }
}

fn non_zero(field: &str) -> ConfigError {
    ConfigError::NonZero {
        field: field.to_string(),
    }
}

fn empty(field: &str) -> ConfigError {
    ConfigError::Empty {
        field: field.to_string(),
    }
}

fn probability(field: &str, value: f64, max: f64) -> Result<(), ConfigError> {
    if !(0.0..=max).contains(&value) {
        return Err(ConfigError::Probability {
            field: field.to_string(),
            value,
            max,
        });
    }
    Ok(())
}

fn validate_limits(kind: &str, limits: &Limits) -> Result<(), ConfigError> {
    if limits.min_stake == 0 || limits.max_stake < limits.min_stake || limits.max_payout == 0 {
        return Err(ConfigError::StakeBounds {
            kind: kind.to_string(),
            min: limits.min_stake,
            max: limits.max_stake,
        });
    }
    Ok(())
}

fn validate_tier(field: &str, tier: &RiskTier) -> Result<(), ConfigError> {
    probability(&format!("{field}.base"), tier.base, MAX_BUST_PROBABILITY)?;
    probability(&format!("{field}.increment"), tier.increment, 1.0)?;
    probability(&format!("{field}.cap"), tier.cap, MAX_BUST_PROBABILITY)?;
    if tier.base > tier.cap {
        return Err(ConfigError::Range {
            field: field.to_string(),
            low: tier.base,
            high: tier.cap,
        });
    }
    if tier.growth <= 1.0 {
        return Err(ConfigError::Growth {
            field: format!("{field}.growth"),
            value: tier.growth,
        });
    }
    Ok(())
}
