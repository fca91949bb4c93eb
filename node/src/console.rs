//! Line-oriented command driver.
//!
//! Stands in for the chat router: each line names a player, a game and what
//! to do, and is routed to the [Engine]. Grammar:
//!
//! ```text
//! start   <user> <game> <stake> [chat=<id>] [vs=<user>] [variant=<n>] [premium]
//! act     <user> <game> <continue|cashout|reroll|haggle|buy> [chat=<id>] [vs=<user>]
//! join    <user> <game> <stake> [chat=<id>] [vs=<user>] [premium]
//! cancel  <user> <game> [chat=<id>] [vs=<user>]
//! status  <user> <game> [chat=<id>] [vs=<user>]
//! grant   <user> <amount>
//! balance <user>
//! history <user>
//! sessions
//! quit
//! ```

use arcade_execution::{Engine, EngineError, Progress, Store};
use arcade_types::{
    Action, Display, GameKind, Participant, Report, SessionKey, StartRequest, Summary, Table,
    UserId, Verdict,
};
use std::{fmt::Write, str::FromStr};
use thiserror::Error;

/// Ledger source for coins granted from the console.
pub const GRANT_SOURCE: &str = "grant";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Start(StartRequest),
    Act { key: SessionKey, action: Action },
    Cancel(SessionKey),
    Status(SessionKey),
    Grant { user: UserId, amount: u64 },
    Balance(UserId),
    History(UserId),
    Sessions,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("unknown game: {0}")]
    UnknownGame(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConsoleError {
    /// Numeric code shown next to the message (0 for malformed input).
    pub fn code(&self) -> u8 {
        match self {
            ConsoleError::Command(_) => 0,
            ConsoleError::Engine(err) => err.code(),
        }
    }
}

/// Trailing `key=value` options shared by session commands.
#[derive(Default)]
struct Options {
    table: Option<Table>,
    variant: u8,
    premium: bool,
}

fn number<T: FromStr>(field: &'static str, value: Option<&str>) -> Result<T, CommandError> {
    let value = value.ok_or(CommandError::Missing(field))?;
    value.parse().map_err(|_| CommandError::Invalid {
        field,
        value: value.to_string(),
    })
}

fn game(value: Option<&str>) -> Result<GameKind, CommandError> {
    let value = value.ok_or(CommandError::Missing("game"))?;
    GameKind::ALL
        .into_iter()
        .find(|kind| kind.name() == value)
        .ok_or_else(|| CommandError::UnknownGame(value.to_string()))
}

fn action(value: Option<&str>) -> Result<Action, CommandError> {
    match value.ok_or(CommandError::Missing("action"))? {
        "continue" => Ok(Action::Continue),
        "cashout" => Ok(Action::CashOut),
        "reroll" => Ok(Action::Reroll),
        "haggle" => Ok(Action::Haggle),
        "buy" => Ok(Action::Buy),
        other => Err(CommandError::UnknownAction(other.to_string())),
    }
}

fn options<'a>(rest: impl Iterator<Item = &'a str>) -> Result<Options, CommandError> {
    let mut options = Options::default();
    for token in rest {
        match token.split_once('=') {
            Some(("chat", chat)) => options.table = Some(Table::Chat(number("chat", Some(chat))?)),
            Some(("vs", user)) => options.table = Some(Table::Versus(number("vs", Some(user))?)),
            Some(("variant", variant)) => options.variant = number("variant", Some(variant))?,
            None if token == "premium" => options.premium = true,
            _ => {
                return Err(CommandError::Invalid {
                    field: "option",
                    value: token.to_string(),
                })
            }
        }
    }
    Ok(options)
}

fn participant(user: UserId, premium: bool) -> Participant {
    if premium {
        Participant::premium(user)
    } else {
        Participant::new(user)
    }
}

/// Key of the session `user` refers to when playing `kind` at `table`.
fn session_key(kind: GameKind, user: UserId, table: Option<Table>) -> SessionKey {
    StartRequest::solo(kind, Participant::new(user), 0)
        .with_table(table.unwrap_or(Table::Solo))
        .key()
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().ok_or(CommandError::Empty)?;
        let command = match name {
            "start" => {
                let user = number("user", tokens.next())?;
                let kind = game(tokens.next())?;
                let stake = number("stake", tokens.next())?;
                let options = options(tokens)?;
                let request = StartRequest::solo(kind, participant(user, options.premium), stake)
                    .with_table(options.table.unwrap_or(Table::Solo))
                    .with_variant(options.variant);
                Command::Start(request)
            }
            "act" => {
                let user = number("user", tokens.next())?;
                let kind = game(tokens.next())?;
                let action = action(tokens.next())?;
                let options = options(tokens)?;
                Command::Act {
                    key: session_key(kind, user, options.table),
                    action,
                }
            }
            "join" => {
                let user = number("user", tokens.next())?;
                let kind = game(tokens.next())?;
                let stake = number("stake", tokens.next())?;
                let options = options(tokens)?;
                Command::Act {
                    key: session_key(kind, user, options.table),
                    action: Action::Join {
                        player: participant(user, options.premium),
                        stake,
                    },
                }
            }
            "cancel" | "status" => {
                let user = number("user", tokens.next())?;
                let kind = game(tokens.next())?;
                let key = session_key(kind, user, options(tokens)?.table);
                if name == "cancel" {
                    Command::Cancel(key)
                } else {
                    Command::Status(key)
                }
            }
            "grant" => Command::Grant {
                user: number("user", tokens.next())?,
                amount: number("amount", tokens.next())?,
            },
            "balance" => Command::Balance(number("user", tokens.next())?),
            "history" => Command::History(number("user", tokens.next())?),
            "sessions" => Command::Sessions,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn describe(display: &Display) -> String {
    match display {
        Display::Spin { symbol, multiplier } => format!("{symbol} x{multiplier:.2}"),
        Display::Ladder {
            stake,
            step,
            multiplier,
            bust_chance,
        } => format!(
            "step {step}, x{multiplier:.2} on {stake} (bust {:.0}%)",
            bust_chance * 100.0
        ),
        Display::Crash {
            stake,
            tick,
            multiplier,
        } => format!("tick {tick}, x{multiplier:.2} on {stake}"),
        Display::Pot {
            phase,
            seats,
            eliminated,
            pot,
            min_participants,
            max_participants,
        } => format!(
            "{phase:?} pot {pot}, {}/{max_participants} seats (min {min_participants}), {} out",
            seats.len(),
            eliminated.len()
        ),
        Display::Market {
            budget,
            listing,
            rerolls_left,
        } => format!(
            "quality {} for {} (budget {budget}, {rerolls_left} rerolls{})",
            listing.quality,
            listing.price,
            if listing.negotiable { ", negotiable" } else { "" }
        ),
        Display::Resolved {
            winner,
            multiplier,
            forced,
        } => {
            let mut text = match winner {
                Some(winner) => format!("won by {winner} at x{multiplier:.2}"),
                None => format!("ended at x{multiplier:.2}"),
            };
            if *forced {
                text.push_str(" (deadline)");
            }
            text
        }
    }
}

fn summary(summary: &Summary) -> String {
    let actions: Vec<String> = summary
        .actions
        .iter()
        .map(|action| format!("{action:?}").to_lowercase())
        .collect();
    format!(
        "{} {}: {}; {} at risk, {}s left [{}]",
        summary.kind,
        summary.key,
        describe(&summary.display),
        summary.stake,
        summary.remaining_ms / 1_000,
        actions.join(" ")
    )
}

fn report(report: &Report) -> String {
    let mut text = format!("{} {}: {}", report.kind, report.key, describe(&report.display));
    for outcome in &report.outcomes {
        let verdict = match outcome.verdict {
            Verdict::Win => "win",
            Verdict::Loss => "loss",
            Verdict::Refund => "refund",
        };
        let _ = write!(
            text,
            "\n  {}: {verdict} {:+}",
            outcome.participant, outcome.net_change
        );
    }
    text
}

fn progress(progress: &Progress) -> String {
    match progress {
        Progress::Active(active) => summary(active),
        Progress::Resolved(resolved) => report(resolved),
    }
}

/// Run one command and render the reply. [Command::Quit] is handled by the caller.
pub async fn execute<S: Store>(
    engine: &Engine<S>,
    command: Command,
) -> Result<String, ConsoleError> {
    let reply = match command {
        Command::Start(request) => progress(&engine.start_game(request).await?),
        Command::Act { key, action } => progress(&engine.apply_action(key, action).await?),
        Command::Cancel(key) => report(&engine.cancel(key).await?),
        Command::Status(key) => summary(&engine.status(key).await?),
        Command::Grant { user, amount } => {
            let receipt = engine
                .ledger()
                .credit(user, amount, GRANT_SOURCE, "console")
                .await
                .map_err(EngineError::from)?;
            format!("{user}: {}", receipt.balance_after)
        }
        Command::Balance(user) => {
            let balance = engine
                .ledger()
                .balance(user)
                .await
                .map_err(EngineError::from)?;
            format!("{user}: {balance}")
        }
        Command::History(user) => {
            let entries = engine
                .ledger()
                .history(user)
                .await
                .map_err(EngineError::from)?;
            let mut text = format!("{user}: {} entries", entries.len());
            for entry in entries {
                let _ = write!(
                    text,
                    "\n  #{} {:+} -> {} ({}, {:?})",
                    entry.id, entry.amount, entry.balance_after, entry.source, entry.status
                );
            }
            text
        }
        Command::Sessions => {
            let keys = engine.active();
            let mut text = format!("{} active", keys.len());
            for key in keys {
                let _ = write!(text, "\n  {key}");
            }
            text
        }
        Command::Quit => String::new(),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_execution::{
        mocks::{create_engine, create_funded_engine},
        GameRng,
    };
    use arcade_types::{EngineConfig, Family, ERROR_SESSION_NOT_FOUND};

    #[test]
    fn test_parse_start() {
        let command: Command = "start 1 risk 100 variant=2 premium".parse().unwrap();
        let expected = StartRequest::solo(GameKind::Risk, Participant::premium(1), 100)
            .with_variant(2);
        assert_eq!(command, Command::Start(expected));

        let command: Command = "start 1 duel 50 vs=2".parse().unwrap();
        let Command::Start(request) = command else {
            panic!("expected a start command");
        };
        assert_eq!(request.key(), SessionKey::pair(Family::Pool, 2, 1));
    }

    #[test]
    fn test_parse_session_commands() {
        assert_eq!(
            "act 3 crash cashout".parse::<Command>().unwrap(),
            Command::Act {
                key: SessionKey::user(Family::Crash, 3),
                action: Action::CashOut
            }
        );
        assert_eq!(
            "join 4 rulet 50 chat=-100".parse::<Command>().unwrap(),
            Command::Act {
                key: SessionKey::chat(Family::Pool, -100),
                action: Action::Join {
                    player: Participant::new(4),
                    stake: 50
                }
            }
        );
        assert_eq!(
            "cancel 2 duel vs=1".parse::<Command>().unwrap(),
            Command::Cancel(SessionKey::pair(Family::Pool, 1, 2))
        );
        assert_eq!(
            "status 1 market".parse::<Command>().unwrap(),
            Command::Status(SessionKey::user(Family::Market, 1))
        );
        assert_eq!("sessions".parse::<Command>().unwrap(), Command::Sessions);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "dance 1".parse::<Command>(),
            Err(CommandError::Unknown("dance".to_string()))
        );
        assert_eq!(
            "start 1 poker 10".parse::<Command>(),
            Err(CommandError::UnknownGame("poker".to_string()))
        );
        assert_eq!(
            "start 1 slot".parse::<Command>(),
            Err(CommandError::Missing("stake"))
        );
        assert_eq!(
            "grant one 10".parse::<Command>(),
            Err(CommandError::Invalid {
                field: "user",
                value: "one".to_string()
            })
        );
        assert_eq!(
            "act 1 risk fold".parse::<Command>(),
            Err(CommandError::UnknownAction("fold".to_string()))
        );
        assert_eq!(
            "start 1 risk 10 turbo".parse::<Command>(),
            Err(CommandError::Invalid {
                field: "option",
                value: "turbo".to_string()
            })
        );
    }

    async fn run<S: Store>(engine: &Engine<S>, line: &str) -> Result<String, ConsoleError> {
        execute(engine, line.parse()?).await
    }

    #[tokio::test]
    async fn test_execute_round() {
        let engine = create_funded_engine(
            EngineConfig::default(),
            GameRng::scripted([0.99, 0.99], 0),
            &[(1, 1_000)],
        )
        .await;

        let reply = run(&engine, "start 1 risk 100").await.unwrap();
        assert!(reply.starts_with("risk"));
        assert!(reply.contains("step 0"));
        run(&engine, "act 1 risk continue").await.unwrap();
        assert_eq!(run(&engine, "sessions").await.unwrap().lines().count(), 2);

        // int(100 * 1.1) = 110 gross, 104 net.
        let reply = run(&engine, "act 1 risk cashout").await.unwrap();
        assert!(reply.contains("1: win +4"));
        assert_eq!(run(&engine, "balance 1").await.unwrap(), "1: 1004");
        assert_eq!(run(&engine, "sessions").await.unwrap(), "0 active");
    }

    #[tokio::test]
    async fn test_execute_errors_carry_codes() {
        let engine = create_engine(EngineConfig::default(), GameRng::seeded(0));
        let err = run(&engine, "act 1 crash cashout").await.unwrap_err();
        assert_eq!(err.code(), ERROR_SESSION_NOT_FOUND);
        let err = run(&engine, "bogus").await.unwrap_err();
        assert_eq!(err.code(), 0);
    }

    #[tokio::test]
    async fn test_grant_and_history() {
        let engine = create_engine(EngineConfig::default(), GameRng::seeded(0));
        assert_eq!(run(&engine, "grant 5 250").await.unwrap(), "5: 250");
        assert_eq!(run(&engine, "grant 5 50").await.unwrap(), "5: 300");
        let history = run(&engine, "history 5").await.unwrap();
        assert!(history.starts_with("5: 2 entries"));
        assert!(history.contains("grant"));
    }
}
