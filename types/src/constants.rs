/// Denominator for every rate expressed in basis points.
pub const BASIS_POINTS: u64 = 10_000;

/// Hard ceiling for any bust probability: no step may be a certain loss.
pub const MAX_BUST_PROBABILITY: f64 = 0.95;

/// Ceiling for the market's resale success probability.
pub const MAX_MARKET_SUCCESS: f64 = 0.95;

/// Maximum lifetime of any session before the scheduler force-resolves it (3 minutes).
pub const DEFAULT_SESSION_DEADLINE_MS: u64 = 3 * 60 * 1_000;

/// Win tax for regular accounts (5%).
pub const DEFAULT_TAX_BPS: u64 = 500;

/// Win tax for premium accounts (2.5%).
pub const DEFAULT_PREMIUM_TAX_BPS: u64 = 250;

/// Number of levels in the default risk ladder table.
pub const RISK_LEVELS: usize = 40;

/// Ledger source used when a stake is returned.
pub const REFUND_SOURCE: &str = "refund";

/// Ledger source used when a transfer's debit is undone.
pub const ROLLBACK_SOURCE: &str = "rollback";

/// Error codes surfaced to the presentation layer.
pub const ERROR_INSUFFICIENT_FUNDS: u8 = 1;
pub const ERROR_SESSION_CONFLICT: u8 = 2;
pub const ERROR_SESSION_NOT_FOUND: u8 = 3;
pub const ERROR_INVALID_ACTION: u8 = 4;
pub const ERROR_STAKE_OUT_OF_BOUNDS: u8 = 5;
pub const ERROR_INTERNAL: u8 = 6;
