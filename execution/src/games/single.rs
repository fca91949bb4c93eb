//! Single-shot games: one draw, resolved before the start call returns.

use super::{payout, Context, GameError, Resolution};
use arcade_types::{Display, GameKind, Participant};

/// Play a single-shot game to completion.
pub fn play(
    kind: GameKind,
    player: Participant,
    stake: u64,
    ctx: &Context<'_>,
) -> Result<(Resolution, Display), GameError> {
    let config = &ctx.config.single;
    let (symbol, multiplier) = match kind {
        GameKind::CoinFlip => {
            let won = ctx.rng.chance(config.coin_flip.win_probability);
            let symbol = if won { "heads" } else { "tails" };
            (symbol.to_string(), won.then_some(config.coin_flip.multiplier))
        }
        GameKind::Dice => {
            let won = ctx.rng.chance(config.dice.win_probability);
            let symbol = if won { "hit" } else { "miss" };
            (symbol.to_string(), won.then_some(config.dice.multiplier))
        }
        GameKind::Slot => {
            let weights: Vec<f64> = config.slot.iter().map(|prize| prize.weight).collect();
            let prize = ctx
                .rng
                .weighted(&weights)
                .and_then(|index| config.slot.get(index))
                .ok_or(GameError::UnknownVariant)?;
            let multiplier = (prize.multiplier > 0.0).then_some(prize.multiplier);
            (prize.symbol.clone(), multiplier)
        }
        _ => return Err(GameError::Unsupported),
    };

    let resolution = match multiplier {
        Some(multiplier) => {
            let gross = payout(stake, multiplier, ctx.config.penalty(stake));
            Resolution::win(player, stake, gross, multiplier)
        }
        None => Resolution::loss(player, stake, 0.0),
    };
    let display = Display::Spin {
        symbol,
        multiplier: multiplier.unwrap_or(0.0),
    };
    Ok((resolution, display))
}
