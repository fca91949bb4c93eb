use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a chat user.
pub type UserId = i64;

/// Identity of a chat (group or private) hosting a multiplayer pot.
pub type ChatId = i64;

/// Every mini-game the engine can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Slot,
    CoinFlip,
    Dice,
    Risk,
    Mines,
    Crash,
    Rulet,
    Frekaz,
    Duel,
    Market,
}

impl GameKind {
    pub const ALL: [GameKind; 10] = [
        GameKind::Slot,
        GameKind::CoinFlip,
        GameKind::Dice,
        GameKind::Risk,
        GameKind::Mines,
        GameKind::Crash,
        GameKind::Rulet,
        GameKind::Frekaz,
        GameKind::Duel,
        GameKind::Market,
    ];

    /// The archetype (and session-key namespace) a game belongs to.
    pub fn family(self) -> Family {
        match self {
            GameKind::Slot | GameKind::CoinFlip | GameKind::Dice => Family::SingleShot,
            GameKind::Risk | GameKind::Mines => Family::Ladder,
            GameKind::Crash => Family::Crash,
            GameKind::Rulet | GameKind::Frekaz | GameKind::Duel => Family::Pool,
            GameKind::Market => Family::Market,
        }
    }

    /// Name used as the ledger `source` of every stake and payout.
    pub fn name(self) -> &'static str {
        match self {
            GameKind::Slot => "slot",
            GameKind::CoinFlip => "coin_flip",
            GameKind::Dice => "dice",
            GameKind::Risk => "risk",
            GameKind::Mines => "mines",
            GameKind::Crash => "crash",
            GameKind::Rulet => "rulet",
            GameKind::Frekaz => "frekaz",
            GameKind::Duel => "duel",
            GameKind::Market => "market",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Game archetypes. At most one session may exist per participant per family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    SingleShot,
    Ladder,
    Crash,
    Pool,
    Market,
}

/// Identity under which at most one active session may exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKey {
    User { family: Family, user: UserId },
    Pair { family: Family, user: UserId, other: UserId },
    Chat { family: Family, chat: ChatId },
}

impl SessionKey {
    pub fn user(family: Family, user: UserId) -> Self {
        Self::User { family, user }
    }

    /// Pair keys are order-independent: a duel between A and B has one key.
    pub fn pair(family: Family, a: UserId, b: UserId) -> Self {
        let (user, other) = if a <= b { (a, b) } else { (b, a) };
        Self::Pair {
            family,
            user,
            other,
        }
    }

    pub fn chat(family: Family, chat: ChatId) -> Self {
        Self::Chat { family, chat }
    }

    pub fn family(&self) -> Family {
        match self {
            Self::User { family, .. } | Self::Pair { family, .. } | Self::Chat { family, .. } => {
                *family
            }
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { family, user } => write!(f, "{family:?}:{user}"),
            Self::Pair {
                family,
                user,
                other,
            } => write!(f, "{family:?}:{user}x{other}"),
            Self::Chat { family, chat } => write!(f, "{family:?}:chat{chat}"),
        }
    }
}

/// A player as seen by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    /// Premium accounts pay the reduced win tax.
    pub premium: bool,
}

impl Participant {
    pub fn new(id: UserId) -> Self {
        Self { id, premium: false }
    }

    pub fn premium(id: UserId) -> Self {
        Self { id, premium: true }
    }
}

/// Where a new session lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// A personal game keyed by the starting player.
    Solo,
    /// A pot shared by everyone in a chat.
    Chat(ChatId),
    /// A duel against a named opponent.
    Versus(UserId),
}

/// Request to open a new session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub kind: GameKind,
    pub player: Participant,
    /// Coins put at risk. For the market this is the budget the listing is generated from.
    pub stake: u64,
    pub table: Table,
    /// Tier index for ladder games (risk level, number of mines). Ignored elsewhere.
    pub variant: u8,
}

impl StartRequest {
    pub fn solo(kind: GameKind, player: Participant, stake: u64) -> Self {
        Self {
            kind,
            player,
            stake,
            table: Table::Solo,
            variant: 0,
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = table;
        self
    }

    pub fn with_variant(mut self, variant: u8) -> Self {
        self.variant = variant;
        self
    }

    /// Key the session will be stored under.
    pub fn key(&self) -> SessionKey {
        let family = self.kind.family();
        match self.table {
            Table::Solo => SessionKey::user(family, self.player.id),
            Table::Chat(chat) => SessionKey::chat(family, chat),
            Table::Versus(other) => SessionKey::pair(family, self.player.id, other),
        }
    }
}

/// A player action routed to an active session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Take the next escalating-risk step (or dig the next tile).
    Continue,
    /// Lock in the current multiplier.
    CashOut,
    /// Buy a seat in a forming pot.
    Join { player: Participant, stake: u64 },
    /// Replace the market listing.
    Reroll,
    /// Attempt a discount on the market listing.
    Haggle,
    /// Buy the market listing.
    Buy,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Continue => ActionKind::Continue,
            Action::CashOut => ActionKind::CashOut,
            Action::Join { .. } => ActionKind::Join,
            Action::Reroll => ActionKind::Reroll,
            Action::Haggle => ActionKind::Haggle,
            Action::Buy => ActionKind::Buy,
        }
    }
}

/// Buttons the presentation layer may offer for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Continue,
    CashOut,
    Join,
    Reroll,
    Haggle,
    Buy,
    Cancel,
}
