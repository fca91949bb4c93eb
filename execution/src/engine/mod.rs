//! Session engine.
//!
//! The engine owns the session store, the scheduler tasks and the ledger
//! handle. Every transition of a session runs under that session's async lock;
//! the first transition to reach a terminal state sets `closed`, settles the
//! outcome and removes the session, so later triggers (a late action, a timer
//! tick, the deadline) observe a closed or missing session and do nothing.

mod reconcile;

use crate::{
    games::{self, single, Context, Resolution, Session, Step},
    ledger::{Ledger, Store},
    scheduler,
    sessions::SessionStore,
    EngineError, GameRng, Metrics,
};
use arcade_types::{
    Action, Display, EngineConfig, Event, Family, GameKind, Participant, Render, Report,
    SessionKey, StartRequest, Summary,
};
use futures::future::join_all;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex as SyncMutex, PoisonError,
};
use tokio::{
    sync::{broadcast, oneshot, Mutex, Notify},
    time::Instant,
};
use tracing::{debug, info, warn};

/// Result of a transition that may or may not end the session.
#[derive(Clone, Debug, PartialEq)]
pub enum Progress {
    Active(Summary),
    Resolved(Report),
}

impl Progress {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Progress::Resolved(_))
    }
}

/// Mutable part of a stored session.
pub(crate) struct Board {
    pub(crate) game: Session,
    /// Set exactly once, by whichever transition resolves the session.
    pub(crate) closed: bool,
    pub(crate) next_tick: Option<Instant>,
}

/// A stored session.
pub(crate) struct Live {
    pub(crate) id: u64,
    pub(crate) key: SessionKey,
    pub(crate) kind: GameKind,
    pub(crate) deadline: Instant,
    pub(crate) state: Mutex<Board>,
    /// Wakes the timer task when the tick schedule changes.
    pub(crate) wake: Notify,
    stop: SyncMutex<Option<oneshot::Sender<()>>>,
}

impl Live {
    /// Next instant the timer task must act, or [None] once closed.
    pub(crate) async fn due(&self) -> Option<Instant> {
        let board = self.state.lock().await;
        if board.closed {
            return None;
        }
        Some(match board.next_tick {
            Some(tick) => tick.min(self.deadline),
            None => self.deadline,
        })
    }

    /// Release the timer task.
    fn halt(&self) {
        let stop = self
            .stop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(stop);
    }
}

fn summarize(key: SessionKey, kind: GameKind, deadline: Instant, game: &Session) -> Summary {
    Summary {
        key,
        kind,
        stake: game.at_risk(),
        remaining_ms: deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
        display: game.display(),
        actions: game.actions(),
    }
}

/// Concurrent game-session engine over a ledger [Store].
pub struct Engine<S: Store> {
    config: Arc<EngineConfig>,
    ledger: Arc<Ledger<S>>,
    rng: GameRng,
    sessions: Arc<SessionStore<Live>>,
    events: broadcast::Sender<Event>,
    metrics: Metrics,
    next_id: Arc<AtomicU64>,
}

impl<S: Store> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            ledger: self.ledger.clone(),
            rng: self.rng.clone(),
            sessions: self.sessions.clone(),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            next_id: self.next_id.clone(),
        }
    }
}

impl<S: Store> Engine<S> {
    /// Create an engine. `config` is expected to be validated.
    pub fn new(config: EngineConfig, store: S, rng: GameRng) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            config: Arc::new(config),
            ledger: Arc::new(Ledger::new(store)),
            rng,
            sessions: Arc::new(SessionStore::new()),
            events,
            metrics: Metrics::default(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Render and outcome events. Lagging receivers miss events; game state
    /// never depends on delivery.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Keys of every visible session.
    pub fn active(&self) -> Vec<SessionKey> {
        self.sessions.keys()
    }

    fn context(&self) -> Context<'_> {
        Context {
            config: &self.config,
            rng: &self.rng,
        }
    }

    pub(crate) fn publish(&self, event: Event) {
        if let Err(err) = self.events.send(event) {
            debug!(?err, "no event subscribers");
        }
    }

    fn render(&self, key: SessionKey, kind: GameKind, game: &Session) {
        self.publish(Event::Render(Render {
            key,
            kind,
            display: game.display(),
            actions: game.actions(),
        }));
    }

    fn check_stake(&self, kind: GameKind, stake: u64) -> Result<(), EngineError> {
        let limits = self.config.limits(kind);
        if stake < limits.min_stake || stake > limits.max_stake {
            return Err(EngineError::StakeOutOfBounds {
                stake,
                min: limits.min_stake,
                max: limits.max_stake,
            });
        }
        Ok(())
    }

    async fn take_stake(
        &self,
        player: Participant,
        amount: u64,
        kind: GameKind,
        comment: &str,
    ) -> Result<(), EngineError> {
        let receipt = self
            .ledger
            .debit(player.id, amount, kind.name(), comment)
            .await?;
        if !receipt.applied {
            debug!(user = player.id, amount, balance = receipt.balance_before, "stake rejected");
            return Err(EngineError::InsufficientFunds {
                have: receipt.balance_before,
                need: amount,
            });
        }
        Ok(())
    }

    /// Open a session, debiting the stake before it becomes visible.
    ///
    /// Single-shot games resolve before this returns.
    pub async fn start_game(&self, request: StartRequest) -> Result<Progress, EngineError> {
        let StartRequest {
            kind,
            player,
            stake,
            ..
        } = request;
        self.check_stake(kind, stake)?;
        games::check_table(&request)?;
        let key = request.key();
        let reservation = self.sessions.reserve(key).map_err(|conflict| {
            self.metrics.conflicts.inc();
            debug!(%key, user = player.id, "session already active");
            EngineError::SessionConflict(conflict.0)
        })?;

        if kind.family() == Family::SingleShot {
            self.take_stake(player, stake, kind, "stake").await?;
            self.metrics.started.inc();
            let (resolution, display) = match single::play(kind, player, stake, &self.context()) {
                Ok(played) => played,
                Err(err) => {
                    self.refund(kind, player, stake).await;
                    return Err(err.into());
                }
            };
            let outcomes = self.reconcile(kind, &resolution, false).await;
            drop(reservation);
            self.publish(Event::Render(Render {
                key,
                kind,
                display: display.clone(),
                actions: Vec::new(),
            }));
            self.metrics.resolved.inc();
            info!(%key, %kind, user = player.id, stake, winner = ?resolution.winner, "single-shot resolved");
            return Ok(Progress::Resolved(Report {
                key,
                kind,
                outcomes,
                display,
            }));
        }

        let game = Session::create(&request, &self.context())?;
        if kind != GameKind::Market {
            self.take_stake(player, stake, kind, "stake").await?;
        }

        let now = Instant::now();
        let deadline = now + self.config.session_deadline();
        let next_tick = game.tick_interval().map(|interval| now + interval);
        let summary = summarize(key, kind, deadline, &game);
        self.render(key, kind, &game);

        let (stop, stopped) = oneshot::channel();
        let live = Arc::new(Live {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            key,
            kind,
            deadline,
            state: Mutex::new(Board {
                game,
                closed: false,
                next_tick,
            }),
            wake: Notify::new(),
            stop: SyncMutex::new(Some(stop)),
        });
        let live = reservation.commit(live);
        scheduler::spawn(self.clone(), live, stopped);
        self.metrics.started.inc();
        info!(%key, %kind, user = player.id, stake, "session started");
        Ok(Progress::Active(summary))
    }

    /// Route a player action to the session under `key`.
    pub async fn apply_action(
        &self,
        key: SessionKey,
        action: Action,
    ) -> Result<Progress, EngineError> {
        let live = self
            .sessions
            .get(&key)
            .ok_or(EngineError::SessionNotFound(key))?;
        let mut board = live.state.lock().await;
        if board.closed {
            return Err(EngineError::SessionNotFound(key));
        }
        debug!(%key, action = ?action.kind(), "applying action");

        // Paid actions debit under the session lock, before the transition.
        let paid = board.game.price(&action)?;
        if let Some((participant, amount)) = paid {
            if let Action::Join { .. } = action {
                self.check_stake(live.kind, amount)?;
            }
            self.take_stake(participant, amount, live.kind, "action")
                .await?;
        }

        let step = board.game.apply(action, &self.context());
        match step {
            Ok(Step::Continue) => {
                self.arm(&live, &mut board);
                self.render(live.key, live.kind, &board.game);
                Ok(Progress::Active(summarize(
                    live.key,
                    live.kind,
                    live.deadline,
                    &board.game,
                )))
            }
            Ok(Step::Resolved(resolution)) => Ok(Progress::Resolved(
                self.finish(&live, &mut board, resolution, false).await,
            )),
            Err(err) => {
                if let Some((participant, amount)) = paid {
                    warn!(%key, user = participant.id, amount, %err, "action failed after debit, refunding");
                    self.refund(live.kind, participant, amount).await;
                }
                Err(err.into())
            }
        }
    }

    /// Cancel before any irrevocable step, refunding every stake.
    pub async fn cancel(&self, key: SessionKey) -> Result<Report, EngineError> {
        let live = self
            .sessions
            .get(&key)
            .ok_or(EngineError::SessionNotFound(key))?;
        let mut board = live.state.lock().await;
        if board.closed {
            return Err(EngineError::SessionNotFound(key));
        }
        let resolution = board.game.cancel()?;
        self.metrics.cancelled.inc();
        Ok(self.finish(&live, &mut board, resolution, false).await)
    }

    pub async fn status(&self, key: SessionKey) -> Result<Summary, EngineError> {
        let live = self
            .sessions
            .get(&key)
            .ok_or(EngineError::SessionNotFound(key))?;
        let board = live.state.lock().await;
        if board.closed {
            return Err(EngineError::SessionNotFound(key));
        }
        Ok(summarize(live.key, live.kind, live.deadline, &board.game))
    }

    /// Force-resolve every live session (graceful stop).
    pub async fn shutdown(&self) -> Vec<Report> {
        let live = self.sessions.values();
        info!(sessions = live.len(), "force-resolving live sessions");
        join_all(live.iter().map(|live| async move {
            let mut board = live.state.lock().await;
            if board.closed {
                return None;
            }
            Some(self.expire(live, &mut board).await)
        }))
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    /// Scheduler entry point: tick or expire the session if due.
    ///
    /// A tick falling due at or before the deadline runs first, so a crash
    /// point reached on the final tick still busts.
    pub(crate) async fn on_timer(&self, live: &Live) {
        let mut board = live.state.lock().await;
        if board.closed {
            return;
        }
        let now = Instant::now();
        if let Some(due) = board.next_tick.filter(|due| *due <= now && *due <= live.deadline) {
            match board.game.tick(&self.context()) {
                Step::Continue => {
                    board.next_tick = board.game.tick_interval().map(|interval| due + interval);
                    self.render(live.key, live.kind, &board.game);
                }
                Step::Resolved(resolution) => {
                    self.finish(live, &mut board, resolution, false).await;
                    return;
                }
            }
        }
        if now >= live.deadline {
            self.expire(live, &mut board).await;
        }
    }

    /// Start the tick clock if the game just began advancing on its own.
    fn arm(&self, live: &Live, board: &mut Board) {
        if board.next_tick.is_some() {
            return;
        }
        if let Some(interval) = board.game.tick_interval() {
            board.next_tick = Some(Instant::now() + interval);
            live.wake.notify_one();
            debug!(key = %live.key, ?interval, "tick clock started");
        }
    }

    async fn expire(&self, live: &Live, board: &mut Board) -> Report {
        let resolution = board.game.expire(&self.context());
        self.metrics.expired.inc();
        info!(key = %live.key, kind = %live.kind, "session deadline reached");
        self.finish(live, board, resolution, true).await
    }

    /// Close, settle, and remove a session. Callers hold the session lock and
    /// have checked `closed`.
    async fn finish(
        &self,
        live: &Live,
        board: &mut Board,
        resolution: Resolution,
        forced: bool,
    ) -> Report {
        board.closed = true;
        board.next_tick = None;
        live.halt();

        let outcomes = self.reconcile(live.kind, &resolution, forced).await;
        self.sessions.remove_if(&live.key, |other| other.id == live.id);

        let display = Display::Resolved {
            winner: resolution.winner,
            multiplier: resolution.multiplier,
            forced,
        };
        self.publish(Event::Render(Render {
            key: live.key,
            kind: live.kind,
            display: display.clone(),
            actions: Vec::new(),
        }));
        self.metrics.resolved.inc();
        info!(key = %live.key, kind = %live.kind, forced, winner = ?resolution.winner, "session resolved");
        Report {
            key: live.key,
            kind: live.kind,
            outcomes,
            display,
        }
    }
}
