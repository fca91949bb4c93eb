//! Multiplayer pots.
//!
//! A pot forms until `min_participants` have joined, then runs: elimination
//! pots drop one random seat per tick until a single survivor takes the whole
//! pot; weighted pots draw one winner, proportionally to stake, after one tick.

use super::{Claim, Context, Game, GameError, Resolution, Share, Step};
use arcade_types::{
    Action, ActionKind, Display, GameKind, Participant, PoolRules, PotPhase, Seat, UserId,
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// One uniformly random seat removed per tick.
    Elimination,
    /// A single draw weighted by stake.
    Weighted,
}

impl Mode {
    pub fn of(kind: GameKind) -> Self {
        match kind {
            GameKind::Rulet => Mode::Elimination,
            _ => Mode::Weighted,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Pool {
    mode: Mode,
    rules: PoolRules,
    phase: PotPhase,
    seats: Vec<(Participant, u64)>,
    eliminated: Vec<(Participant, u64)>,
    /// Duels: the only player allowed to take the second seat.
    opponent: Option<UserId>,
}

impl Pool {
    /// Open a pot with its creator already seated.
    pub fn new(
        kind: GameKind,
        rules: PoolRules,
        creator: Participant,
        stake: u64,
        opponent: Option<UserId>,
    ) -> Self {
        Self {
            mode: Mode::of(kind),
            rules,
            phase: PotPhase::Forming,
            seats: vec![(creator, stake)],
            eliminated: Vec::new(),
            opponent,
        }
    }

    pub fn phase(&self) -> PotPhase {
        self.phase
    }

    /// Sum of every accepted stake, eliminated seats included.
    pub fn pot(&self) -> u64 {
        self.seats
            .iter()
            .chain(self.eliminated.iter())
            .map(|(_, stake)| stake)
            .sum()
    }

    pub fn survivors(&self) -> Vec<UserId> {
        self.seats.iter().map(|(p, _)| p.id).collect()
    }

    fn check_join(&self, player: &Participant, stake: u64) -> Result<(), GameError> {
        if self.phase != PotPhase::Forming {
            return Err(GameError::PotClosed);
        }
        if self.seats.iter().any(|(p, _)| p.id == player.id) {
            return Err(GameError::AlreadyJoined);
        }
        if self.seats.len() >= self.rules.max_participants {
            return Err(GameError::PotFull);
        }
        if let Some(opponent) = self.opponent {
            if player.id != opponent {
                return Err(GameError::NotInvited);
            }
            let challenge = self.seats.first().map(|(_, stake)| *stake);
            if challenge != Some(stake) {
                return Err(GameError::StakeMismatch);
            }
        }
        Ok(())
    }

    /// Winner takes the whole pot as gross winnings; every other seat forfeits.
    fn award(&self, winner: usize) -> Resolution {
        let pot = self.pot();
        let mut shares = Vec::with_capacity(self.seats.len() + self.eliminated.len());
        let mut multiplier = 0.0;
        let mut winner_id = None;
        for (index, (participant, stake)) in self.seats.iter().enumerate() {
            let claim = if index == winner {
                multiplier = pot as f64 / *stake as f64;
                winner_id = Some(participant.id);
                Claim::Winnings(pot)
            } else {
                Claim::Forfeit
            };
            shares.push(Share {
                participant: *participant,
                stake: *stake,
                claim,
            });
        }
        shares.extend(self.eliminated.iter().map(|(participant, stake)| Share {
            participant: *participant,
            stake: *stake,
            claim: Claim::Forfeit,
        }));
        Resolution {
            shares,
            winner: winner_id,
            multiplier,
        }
    }

    fn draw_weighted(&self, ctx: &Context<'_>) -> usize {
        let weights: Vec<f64> = self.seats.iter().map(|(_, stake)| *stake as f64).collect();
        ctx.rng.weighted(&weights).unwrap_or(0)
    }

    fn draw_uniform(&self, ctx: &Context<'_>) -> usize {
        ctx.rng.int(0, self.seats.len().saturating_sub(1) as u64) as usize
    }

    fn refund_all(&self) -> Resolution {
        Resolution::refund(self.seats.iter().copied())
    }
}

impl Game for Pool {
    fn price(&self, action: &Action) -> Result<Option<(Participant, u64)>, GameError> {
        match action {
            Action::Join { player, stake } => {
                self.check_join(player, *stake)?;
                Ok(Some((*player, *stake)))
            }
            _ => Err(GameError::Unsupported),
        }
    }

    fn apply(&mut self, action: Action, _ctx: &Context<'_>) -> Result<Step, GameError> {
        let Action::Join { player, stake } = action else {
            return Err(GameError::Unsupported);
        };
        self.check_join(&player, stake)?;
        self.seats.push((player, stake));
        if self.seats.len() >= self.rules.min_participants {
            self.phase = PotPhase::Running;
        }
        Ok(Step::Continue)
    }

    fn tick(&mut self, ctx: &Context<'_>) -> Step {
        if self.phase != PotPhase::Running {
            return Step::Continue;
        }
        match self.mode {
            Mode::Weighted => Step::Resolved(self.award(self.draw_weighted(ctx))),
            Mode::Elimination => {
                if self.seats.len() > 1 {
                    let out = self.draw_uniform(ctx);
                    let seat = self.seats.remove(out);
                    self.eliminated.push(seat);
                }
                if self.seats.len() <= 1 {
                    return Step::Resolved(self.award(0));
                }
                Step::Continue
            }
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        match self.phase {
            PotPhase::Running => Some(Duration::from_millis(self.rules.tick_ms)),
            PotPhase::Forming => None,
        }
    }

    fn expire(&mut self, ctx: &Context<'_>) -> Resolution {
        match (self.phase, self.mode) {
            (PotPhase::Forming, _) => self.refund_all(),
            (PotPhase::Running, Mode::Elimination) => self.award(self.draw_uniform(ctx)),
            (PotPhase::Running, Mode::Weighted) => self.award(self.draw_weighted(ctx)),
        }
    }

    fn cancel(&mut self) -> Result<Resolution, GameError> {
        if self.phase != PotPhase::Forming {
            return Err(GameError::CancelTooLate);
        }
        Ok(self.refund_all())
    }

    fn display(&self) -> Display {
        let seat = |(participant, stake): &(Participant, u64)| Seat {
            user: participant.id,
            stake: *stake,
        };
        Display::Pot {
            phase: self.phase,
            seats: self.seats.iter().map(seat).collect(),
            eliminated: self.eliminated.iter().map(seat).collect(),
            pot: self.pot(),
            min_participants: self.rules.min_participants,
            max_participants: self.rules.max_participants,
        }
    }

    fn actions(&self) -> Vec<ActionKind> {
        match self.phase {
            PotPhase::Forming => vec![ActionKind::Join, ActionKind::Cancel],
            PotPhase::Running => Vec::new(),
        }
    }

    fn at_risk(&self) -> u64 {
        self.pot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameRng;
    use arcade_types::EngineConfig;

    fn join(user: UserId, stake: u64) -> Action {
        Action::Join {
            player: Participant::new(user),
            stake,
        }
    }

    fn rulet(min: usize, max: usize) -> Pool {
        let rules = PoolRules {
            min_participants: min,
            max_participants: max,
            tick_ms: 1_000,
        };
        Pool::new(GameKind::Rulet, rules, Participant::new(1), 100, None)
    }

    #[test]
    fn test_forming_to_running() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut pool = rulet(3, 4);
        assert_eq!(pool.tick_interval(), None);

        assert_eq!(pool.price(&join(2, 50)), Ok(Some((Participant::new(2), 50))));
        assert_eq!(pool.apply(join(2, 50), &ctx), Ok(Step::Continue));
        assert_eq!(pool.phase(), PotPhase::Forming);
        assert_eq!(pool.price(&join(2, 50)), Err(GameError::AlreadyJoined));

        assert_eq!(pool.apply(join(3, 25), &ctx), Ok(Step::Continue));
        assert_eq!(pool.phase(), PotPhase::Running);
        assert_eq!(pool.tick_interval(), Some(Duration::from_secs(1)));
        assert_eq!(pool.price(&join(4, 10)), Err(GameError::PotClosed));
        assert_eq!(pool.cancel(), Err(GameError::CancelTooLate));
        assert!(pool.actions().is_empty());
        assert_eq!(pool.pot(), 175);
    }

    #[test]
    fn test_full_pot_rejects() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut pool = rulet(2, 2);
        pool.apply(join(2, 10), &ctx).unwrap();
        // Running now; a full pot is also closed.
        assert_eq!(pool.price(&join(3, 10)), Err(GameError::PotClosed));

        let mut forming = rulet(5, 2);
        forming.apply(join(2, 10), &ctx).unwrap();
        assert_eq!(forming.price(&join(3, 10)), Err(GameError::PotFull));
    }

    #[test]
    fn test_elimination_until_one() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(4);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut pool = rulet(4, 4);
        for (user, stake) in [(2, 20), (3, 30), (4, 40)] {
            pool.apply(join(user, stake), &ctx).unwrap();
        }

        assert_eq!(pool.tick(&ctx), Step::Continue);
        assert_eq!(pool.tick(&ctx), Step::Continue);
        let Step::Resolved(resolution) = pool.tick(&ctx) else {
            panic!("third elimination leaves one survivor");
        };

        // Every stake is accounted for; only the survivor is paid, with the pot.
        assert_eq!(resolution.shares.len(), 4);
        let paid: Vec<_> = resolution
            .shares
            .iter()
            .filter_map(|share| match share.claim {
                Claim::Winnings(gross) => Some((share.participant.id, gross)),
                _ => None,
            })
            .collect();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].1, 190);
        assert_eq!(resolution.winner, Some(paid[0].0));
        let staked: u64 = resolution.shares.iter().map(|share| share.stake).sum();
        assert_eq!(staked, 190);
    }

    #[test]
    fn test_weighted_draw() {
        let config = EngineConfig::default();
        // 0.5 of a 100 + 300 pot lands in the second seat.
        let rng = GameRng::scripted([0.5], 0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let rules = config.pools.frekaz;
        let mut pool = Pool::new(GameKind::Frekaz, rules, Participant::new(1), 100, None);
        pool.apply(join(2, 300), &ctx).unwrap();
        let Step::Resolved(resolution) = pool.tick(&ctx) else {
            panic!("weighted pots resolve on their first tick");
        };
        assert_eq!(resolution.winner, Some(2));
        assert_eq!(resolution.shares[1].claim, Claim::Winnings(400));
        assert_eq!(resolution.shares[0].claim, Claim::Forfeit);
    }

    #[test]
    fn test_duel_acceptance() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let rules = config.pools.duel;
        let mut duel = Pool::new(GameKind::Duel, rules, Participant::new(1), 100, Some(2));
        assert_eq!(duel.price(&join(3, 100)), Err(GameError::NotInvited));
        assert_eq!(duel.price(&join(2, 99)), Err(GameError::StakeMismatch));
        assert_eq!(duel.apply(join(2, 100), &ctx), Ok(Step::Continue));
        assert_eq!(duel.phase(), PotPhase::Running);
        assert_eq!(duel.tick_interval(), Some(Duration::from_millis(3_000)));
    }

    #[test]
    fn test_expire() {
        let config = EngineConfig::default();
        let rng = GameRng::seeded(0);
        let ctx = Context {
            config: &config,
            rng: &rng,
        };
        let mut forming = rulet(3, 5);
        forming.apply(join(2, 10), &ctx).unwrap();
        let refund = forming.expire(&ctx);
        assert_eq!(refund.shares.len(), 2);
        assert!(refund.shares.iter().all(|s| s.claim == Claim::Refund));

        let mut running = rulet(2, 5);
        running.apply(join(2, 10), &ctx).unwrap();
        let resolution = running.expire(&ctx);
        assert!(resolution.winner.is_some());
        assert_eq!(
            resolution
                .shares
                .iter()
                .filter(|s| s.claim == Claim::Winnings(110))
                .count(),
            1
        );
    }
}
