//! Game state machines.
//!
//! Each archetype is a plain struct implementing [Game]; [Session] is the
//! tagged union the engine stores. Games never touch the ledger: they report
//! what each participant is owed through a [Resolution] and the engine
//! settles it.
//!
//! - Single-shot (slot, coin flip, dice): [single]
//! - Escalating risk (risk, mines): [ladder]
//! - Crash: [crash]
//! - Multiplayer pots (rulet, frekaz, duel): [pool]
//! - Negotiation (market): [market]

pub mod crash;
pub mod ladder;
pub mod market;
pub mod pool;
pub mod single;

use crate::GameRng;
use arcade_types::{
    Action, ActionKind, Display, EngineConfig, GameKind, Participant, StartRequest, Table, UserId,
};
use std::time::Duration;
use thiserror::Error;

/// Shared inputs to every transition.
pub struct Context<'a> {
    pub config: &'a EngineConfig,
    pub rng: &'a GameRng,
}

/// What a participant is owed when a session ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Claim {
    /// Gross payout, capped and taxed at settlement.
    Winnings(u64),
    /// Stake returned untaxed.
    Refund,
    /// Stake kept by the house (or redistributed through a pot).
    Forfeit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Share {
    pub participant: Participant,
    pub stake: u64,
    pub claim: Claim,
}

/// Terminal result of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub shares: Vec<Share>,
    pub winner: Option<UserId>,
    pub multiplier: f64,
}

impl Resolution {
    pub fn win(participant: Participant, stake: u64, gross: u64, multiplier: f64) -> Self {
        Self {
            shares: vec![Share {
                participant,
                stake,
                claim: Claim::Winnings(gross),
            }],
            winner: Some(participant.id),
            multiplier,
        }
    }

    pub fn loss(participant: Participant, stake: u64, multiplier: f64) -> Self {
        Self {
            shares: vec![Share {
                participant,
                stake,
                claim: Claim::Forfeit,
            }],
            winner: None,
            multiplier,
        }
    }

    pub fn refund(shares: impl IntoIterator<Item = (Participant, u64)>) -> Self {
        Self {
            shares: shares
                .into_iter()
                .map(|(participant, stake)| Share {
                    participant,
                    stake,
                    claim: Claim::Refund,
                })
                .collect(),
            winner: None,
            multiplier: 0.0,
        }
    }
}

/// Result of applying an action or a tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Session still running, state updated.
    Continue,
    /// Session reached a terminal state.
    Resolved(Resolution),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    #[error("action not supported by this game")]
    Unsupported,
    #[error("unknown variant")]
    UnknownVariant,
    #[error("a duel needs a named opponent")]
    MissingOpponent,
    #[error("pot is no longer accepting players")]
    PotClosed,
    #[error("pot is full")]
    PotFull,
    #[error("already seated in this pot")]
    AlreadyJoined,
    #[error("only the challenged player may accept")]
    NotInvited,
    #[error("stake must match the challenge")]
    StakeMismatch,
    #[error("no rerolls left")]
    NoRerolls,
    #[error("haggling already attempted")]
    HaggleLocked,
    #[error("too late to cancel")]
    CancelTooLate,
    #[error("game cannot be played at this table")]
    WrongTable,
}

impl GameError {
    /// Static reason surfaced to players.
    pub fn reason(&self) -> &'static str {
        match self {
            GameError::Unsupported => "action not supported by this game",
            GameError::UnknownVariant => "unknown variant",
            GameError::MissingOpponent => "a duel needs a named opponent",
            GameError::PotClosed => "pot is no longer accepting players",
            GameError::PotFull => "pot is full",
            GameError::AlreadyJoined => "already seated in this pot",
            GameError::NotInvited => "only the challenged player may accept",
            GameError::StakeMismatch => "stake must match the challenge",
            GameError::NoRerolls => "no rerolls left",
            GameError::HaggleLocked => "haggling already attempted",
            GameError::CancelTooLate => "too late to cancel",
            GameError::WrongTable => "game cannot be played at this table",
        }
    }
}

/// Check that `request` is seated at a table its game allows.
///
/// Personal games are keyed by player, so they only run solo. A duel is
/// keyed by the pair and pots by chat (or by their creator).
pub fn check_table(request: &StartRequest) -> Result<(), GameError> {
    match (request.kind, request.table) {
        (GameKind::Duel, Table::Versus(other)) if other != request.player.id => Ok(()),
        (GameKind::Duel, _) => Err(GameError::MissingOpponent),
        (GameKind::Rulet | GameKind::Frekaz, Table::Solo | Table::Chat(_)) => Ok(()),
        (GameKind::Rulet | GameKind::Frekaz, Table::Versus(_)) => Err(GameError::WrongTable),
        (_, Table::Solo) => Ok(()),
        (_, Table::Chat(_) | Table::Versus(_)) => Err(GameError::WrongTable),
    }
}

/// A multi-step game held in the session store.
pub trait Game {
    /// Validate a paid action and return who must pay how much before it is
    /// applied. Free actions return `Ok(None)`.
    fn price(&self, _action: &Action) -> Result<Option<(Participant, u64)>, GameError> {
        Ok(None)
    }

    fn apply(&mut self, action: Action, ctx: &Context<'_>) -> Result<Step, GameError>;

    /// Advance one scheduler tick.
    fn tick(&mut self, _ctx: &Context<'_>) -> Step {
        Step::Continue
    }

    /// Interval between ticks, if the game currently advances on its own.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    /// Force-resolve at the hard deadline using the current state as-is.
    fn expire(&mut self, ctx: &Context<'_>) -> Resolution;

    /// Abort before any irrevocable step, refunding every stake.
    fn cancel(&mut self) -> Result<Resolution, GameError>;

    fn display(&self) -> Display;

    fn actions(&self) -> Vec<ActionKind>;

    /// Coins currently at risk across all participants.
    fn at_risk(&self) -> u64;
}

/// Live state of every multi-step archetype.
#[derive(Clone, Debug)]
pub enum Session {
    Ladder(ladder::Ladder),
    Crash(crash::Crash),
    Pool(pool::Pool),
    Market(market::Market),
}

impl Session {
    /// Build the initial state for a stored (non single-shot) game.
    pub fn create(request: &StartRequest, ctx: &Context<'_>) -> Result<Self, GameError> {
        let StartRequest {
            kind,
            player,
            stake,
            table,
            variant,
        } = *request;
        match kind {
            GameKind::Risk | GameKind::Mines => {
                let tier = ctx
                    .config
                    .ladder_tier(kind, variant)
                    .ok_or(GameError::UnknownVariant)?;
                Ok(Session::Ladder(ladder::Ladder::new(
                    player,
                    stake,
                    *tier,
                    ctx.config.penalty(stake),
                )))
            }
            GameKind::Crash => Ok(Session::Crash(crash::Crash::new(player, stake, ctx))),
            GameKind::Rulet | GameKind::Frekaz | GameKind::Duel => {
                let rules = *ctx.config.pool_rules(kind).ok_or(GameError::Unsupported)?;
                let opponent = match (kind, table) {
                    (GameKind::Duel, Table::Versus(other)) if other != player.id => Some(other),
                    (GameKind::Duel, _) => return Err(GameError::MissingOpponent),
                    _ => None,
                };
                Ok(Session::Pool(pool::Pool::new(
                    kind, rules, player, stake, opponent,
                )))
            }
            GameKind::Market => Ok(Session::Market(market::Market::new(player, stake, ctx))),
            GameKind::Slot | GameKind::CoinFlip | GameKind::Dice => Err(GameError::Unsupported),
        }
    }

    fn game(&self) -> &dyn Game {
        match self {
            Session::Ladder(game) => game,
            Session::Crash(game) => game,
            Session::Pool(game) => game,
            Session::Market(game) => game,
        }
    }

    fn game_mut(&mut self) -> &mut dyn Game {
        match self {
            Session::Ladder(game) => game,
            Session::Crash(game) => game,
            Session::Pool(game) => game,
            Session::Market(game) => game,
        }
    }

    pub fn price(&self, action: &Action) -> Result<Option<(Participant, u64)>, GameError> {
        self.game().price(action)
    }

    pub fn apply(&mut self, action: Action, ctx: &Context<'_>) -> Result<Step, GameError> {
        self.game_mut().apply(action, ctx)
    }

    pub fn tick(&mut self, ctx: &Context<'_>) -> Step {
        self.game_mut().tick(ctx)
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        self.game().tick_interval()
    }

    pub fn expire(&mut self, ctx: &Context<'_>) -> Resolution {
        self.game_mut().expire(ctx)
    }

    pub fn cancel(&mut self) -> Result<Resolution, GameError> {
        self.game_mut().cancel()
    }

    pub fn display(&self) -> Display {
        self.game().display()
    }

    pub fn actions(&self) -> Vec<ActionKind> {
        self.game().actions()
    }

    pub fn at_risk(&self) -> u64 {
        self.game().at_risk()
    }
}

/// Payout for `stake` at `multiplier`, damped for large stakes and truncated.
pub fn payout(stake: u64, multiplier: f64, penalty: f64) -> u64 {
    (stake as f64 * multiplier * penalty) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_types::SessionKey;

    #[test]
    fn test_payout_truncates() {
        assert_eq!(payout(100, 1.1f64.powi(3), 1.0), 133);
        assert_eq!(payout(20, 7.5, 1.0), 150);
        assert_eq!(payout(10_000, 2.0, 0.95), 19_000);
        assert_eq!(payout(3, 0.5, 1.0), 1);
        assert_eq!(payout(0, 25.0, 1.0), 0);
    }

    #[test]
    fn test_create_dispatch() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let player = Participant::new(1);

        let risk = StartRequest::solo(GameKind::Risk, player, 100).with_variant(39);
        assert!(matches!(Session::create(&risk, &ctx), Ok(Session::Ladder(_))));
        let risk = StartRequest::solo(GameKind::Risk, player, 100).with_variant(40);
        assert_eq!(Session::create(&risk, &ctx).unwrap_err(), GameError::UnknownVariant);
        let mines = StartRequest::solo(GameKind::Mines, player, 100).with_variant(5);
        assert_eq!(Session::create(&mines, &ctx).unwrap_err(), GameError::UnknownVariant);

        let slot = StartRequest::solo(GameKind::Slot, player, 100);
        assert_eq!(Session::create(&slot, &ctx).unwrap_err(), GameError::Unsupported);

        let duel = StartRequest::solo(GameKind::Duel, player, 100);
        assert_eq!(Session::create(&duel, &ctx).unwrap_err(), GameError::MissingOpponent);
        let duel = duel.with_table(Table::Versus(1));
        assert_eq!(Session::create(&duel, &ctx).unwrap_err(), GameError::MissingOpponent);
        let duel = duel.with_table(Table::Versus(2));
        assert!(matches!(Session::create(&duel, &ctx), Ok(Session::Pool(_))));
        assert_eq!(duel.key(), SessionKey::pair(GameKind::Duel.family(), 2, 1));

        let market = StartRequest::solo(GameKind::Market, player, 1_000);
        let session = Session::create(&market, &ctx).unwrap();
        assert_eq!(session.at_risk(), 0);
        assert!(session.actions().contains(&ActionKind::Buy));
    }

    #[test]
    fn test_check_table() {
        let player = Participant::new(1);
        for kind in [
            GameKind::Slot,
            GameKind::CoinFlip,
            GameKind::Dice,
            GameKind::Risk,
            GameKind::Mines,
            GameKind::Crash,
            GameKind::Market,
        ] {
            let request = StartRequest::solo(kind, player, 100);
            assert_eq!(check_table(&request), Ok(()));
            let chat = request.with_table(Table::Chat(5));
            assert_eq!(check_table(&chat), Err(GameError::WrongTable));
            let versus = request.with_table(Table::Versus(9));
            assert_eq!(check_table(&versus), Err(GameError::WrongTable));
        }

        for kind in [GameKind::Rulet, GameKind::Frekaz] {
            let request = StartRequest::solo(kind, player, 100);
            assert_eq!(check_table(&request), Ok(()));
            assert_eq!(check_table(&request.with_table(Table::Chat(-100))), Ok(()));
            assert_eq!(
                check_table(&request.with_table(Table::Versus(2))),
                Err(GameError::WrongTable)
            );
        }

        let duel = StartRequest::solo(GameKind::Duel, player, 100);
        assert_eq!(check_table(&duel), Err(GameError::MissingOpponent));
        assert_eq!(
            check_table(&duel.with_table(Table::Chat(5))),
            Err(GameError::MissingOpponent)
        );
        assert_eq!(
            check_table(&duel.with_table(Table::Versus(1))),
            Err(GameError::MissingOpponent)
        );
        assert_eq!(check_table(&duel.with_table(Table::Versus(2))), Ok(()));
    }

    #[test]
    fn test_reasons_match_messages() {
        for error in [
            GameError::WrongTable,
            GameError::Unsupported,
            GameError::PotClosed,
            GameError::HaggleLocked,
            GameError::CancelTooLate,
        ] {
            assert_eq!(error.reason(), error.to_string());
        }
    }
}
