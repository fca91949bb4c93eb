use crate::{ActionKind, GameKind, SessionKey, UserId};
use serde::{Deserialize, Serialize};

/// How a resolved session ended for one participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Win,
    Loss,
    /// Stake returned untaxed (cancellation, an unfilled pot, a failed payout).
    Refund,
}

/// One participant's result, published once per resolved session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub participant: UserId,
    pub kind: GameKind,
    pub stake: u64,
    pub verdict: Verdict,
    /// Balance change over the whole session (payout minus stake).
    pub net_change: i64,
    pub multiplier: f64,
    /// Resolved by the scheduler's hard deadline rather than by a player.
    pub forced: bool,
}

/// Phase of a multiplayer pot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotPhase {
    Forming,
    Running,
}

/// A seat in a multiplayer pot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub user: UserId,
    pub stake: u64,
}

/// Market listing as shown to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Quality rating, 1 (junk) to 5 (pristine).
    pub quality: u8,
    pub price: u64,
    pub negotiable: bool,
}

/// Everything the presentation layer needs to draw a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Display {
    Spin {
        symbol: String,
        multiplier: f64,
    },
    Ladder {
        stake: u64,
        step: u32,
        multiplier: f64,
        bust_chance: f64,
    },
    Crash {
        stake: u64,
        tick: u32,
        multiplier: f64,
    },
    Pot {
        phase: PotPhase,
        seats: Vec<Seat>,
        eliminated: Vec<Seat>,
        pot: u64,
        min_participants: usize,
        max_participants: usize,
    },
    Market {
        budget: u64,
        listing: Listing,
        rerolls_left: u32,
    },
    Resolved {
        winner: Option<UserId>,
        multiplier: f64,
        forced: bool,
    },
}

/// Request to (re)draw a session after a state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Render {
    pub key: SessionKey,
    pub kind: GameKind,
    pub display: Display,
    pub actions: Vec<ActionKind>,
}

/// Everything the engine publishes to its collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Render(Render),
    Outcome(Outcome),
}

/// Snapshot returned by status queries and non-terminal transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub key: SessionKey,
    pub kind: GameKind,
    /// Coins currently at risk across all participants.
    pub stake: u64,
    /// Milliseconds left before the scheduler force-resolves the session.
    pub remaining_ms: u64,
    pub display: Display,
    pub actions: Vec<ActionKind>,
}

/// Result of a session reaching a terminal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub key: SessionKey,
    pub kind: GameKind,
    pub outcomes: Vec<Outcome>,
    pub display: Display,
}

impl Report {
    /// Outcome for a given participant, if they took part.
    pub fn outcome(&self, user: UserId) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.participant == user)
    }
}
