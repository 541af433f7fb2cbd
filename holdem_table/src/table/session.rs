//! Who is at the table, as opposed to who is in the hand.
//!
//! A [`TableSession`] wraps one [`HandEngine`] with everything that depends
//! on connections coming and going: display names, reconnection grace
//! windows, the spectator queue, and starting hands once enough players are
//! present.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    mem,
};
use tokio::time::Instant;

use super::config::TableConfig;
use crate::{
    game::{
        GameEvent, HandEngine, SeatOutcome, UserError,
        entities::{Action, Entrant, Phase, PlayerId, SeatIndex, TableSnapshot, Username},
    },
    schedule::{Scheduler, TaskHandle},
};

/// Where a joining participant ended up.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum JoinOutcome {
    /// Took back the seat they dropped from.
    Reconnected(SeatIndex),
    Seated(SeatIndex),
    /// Dealt in at the next hand start.
    Pending,
    /// The table is full.
    Spectating,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SessionTask {
    /// Release the seat held for a dropped connection.
    Grace(PlayerId),
    AutoStart,
}

/// A seated player whose connection dropped.
#[derive(Debug)]
struct Departure {
    id: PlayerId,
    handle: TaskHandle,
}

#[derive(Debug)]
pub struct TableSession {
    config: TableConfig,
    engine: HandEngine,
    /// Display names of connected participants.
    names: HashMap<PlayerId, Username>,
    /// Held seats, keyed by display name.
    departed: HashMap<Username, Departure>,
    spectators: VecDeque<Entrant>,
    scheduler: Scheduler<SessionTask>,
    auto_start: Option<TaskHandle>,
    clock: Option<Instant>,
    events: VecDeque<GameEvent>,
}

impl TableSession {
    #[must_use]
    pub fn new(config: TableConfig) -> Self {
        let engine = HandEngine::new(config.game_settings());
        Self {
            config,
            engine,
            names: HashMap::new(),
            departed: HashMap::new(),
            spectators: VecDeque::new(),
            scheduler: Scheduler::new(),
            auto_start: None,
            clock: None,
            events: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &HandEngine {
        &self.engine
    }

    /// Mutable access to the engine, e.g. to stack the next deck.
    pub fn engine_mut(&mut self) -> &mut HandEngine {
        &mut self.engine
    }

    #[must_use]
    pub fn spectators(&self) -> &VecDeque<Entrant> {
        &self.spectators
    }

    #[must_use]
    pub fn is_connected(&self, id: &PlayerId) -> bool {
        self.names.contains_key(id)
    }

    /// Whether a seat is being held for `name`.
    #[must_use]
    pub fn is_held(&self, name: &Username) -> bool {
        self.departed.contains_key(name)
    }

    /// Everyone who should receive snapshots.
    pub fn viewers(&self) -> impl Iterator<Item = &PlayerId> {
        self.names.keys()
    }

    pub fn join(&mut self, id: PlayerId, name: Username) -> Result<JoinOutcome, UserError> {
        if name.is_empty() {
            return Err(UserError::InvalidName);
        }
        if self.names.contains_key(&id) {
            return Err(UserError::UserAlreadyExists);
        }

        if let Some(departure) = self.departed.remove(&name) {
            self.scheduler.cancel(departure.handle);
            match self.engine.reconnect_identity(&departure.id, id.clone()) {
                Ok(()) => {
                    let seat_idx = self
                        .engine
                        .player(&id)
                        .map(|p| p.seat_idx)
                        .ok_or(UserError::UserDoesNotExist)?;
                    self.names.insert(id, name);
                    self.after_change();
                    return Ok(JoinOutcome::Reconnected(seat_idx));
                }
                Err(err) => {
                    // The seat is gone (busted out, most likely); start over.
                    warn!("couldn't restore {name}'s seat: {err}");
                    if let Err(err) = self.engine.unseat(&departure.id) {
                        debug!("nothing left to clear for {name}: {err}");
                    }
                }
            }
        }

        if self.names.values().any(|n| n == &name) {
            return Err(UserError::UserAlreadyExists);
        }

        let outcome = if self.engine.occupancy() >= self.config.max_players {
            self.spectate(id.clone(), name.clone());
            JoinOutcome::Spectating
        } else {
            match self.engine.seat(id.clone(), name.clone()) {
                Ok(SeatOutcome::Seated(seat_idx)) => JoinOutcome::Seated(seat_idx),
                Ok(SeatOutcome::Pending) => JoinOutcome::Pending,
                Err(UserError::CapacityReached) => {
                    self.spectate(id.clone(), name.clone());
                    JoinOutcome::Spectating
                }
                Err(err) => return Err(err),
            }
        };
        self.names.insert(id, name);
        self.after_change();
        Ok(outcome)
    }

    /// Handle a dropped connection. Seated players keep their seat for the
    /// grace period; everyone else is removed at once.
    pub fn leave(&mut self, id: &PlayerId) -> Result<(), UserError> {
        let name = self.names.remove(id).ok_or(UserError::UserDoesNotExist)?;

        if let Some(pos) = self.spectators.iter().position(|e| &e.id == id) {
            self.spectators.remove(pos);
            info!("spectator {name} left");
            return Ok(());
        }

        if self.engine.is_seated(id) {
            let grace = self.config.timings.reconnect_grace;
            let due = self.now() + grace;
            let handle = self
                .scheduler
                .schedule_at(due, SessionTask::Grace(id.clone()));
            let departure = Departure {
                id: id.clone(),
                handle,
            };
            if let Some(previous) = self.departed.insert(name.clone(), departure) {
                self.scheduler.cancel(previous.handle);
            }
            info!("{name} disconnected, holding their seat for {grace:?}");
            self.events.push_back(GameEvent::Disconnected(name));
            return Ok(());
        }

        self.engine.unseat(id)?;
        self.after_change();
        Ok(())
    }

    pub fn rebuy(&mut self, id: &PlayerId) -> Result<SeatOutcome, UserError> {
        let outcome = self.engine.rebuy(id)?;
        self.after_change();
        Ok(outcome)
    }

    pub fn act(&mut self, id: &PlayerId, action: Action) -> Result<(), UserError> {
        self.engine.apply_action(id, action)?;
        self.after_change();
        Ok(())
    }

    #[must_use]
    pub fn snapshot_for(&self, viewer: &PlayerId) -> TableSnapshot {
        self.engine.snapshot_for(viewer)
    }

    /// Earliest pending deadline of the session or its engine.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.engine.next_deadline(), self.scheduler.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run every session and engine task due at or before `now`, in
    /// deadline order. Returns how many fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        loop {
            let engine_due = self.engine.next_deadline().filter(|due| *due <= now);
            let session_due = self.scheduler.next_deadline().filter(|due| *due <= now);
            let (due, engine_first) = match (engine_due, session_due) {
                (None, None) => break,
                (Some(e), Some(s)) => (e.min(s), e <= s),
                (Some(e), None) => (e, true),
                (None, Some(s)) => (s, false),
            };

            self.clock = Some(due);
            if engine_first {
                self.engine.fire_next(now);
            } else {
                self.fire_session_task(now);
            }
            self.after_change();
            self.clock = None;
            fired += 1;
        }
        fired
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        self.events.extend(self.engine.drain_events());
        mem::take(&mut self.events)
    }

    fn now(&self) -> Instant {
        self.clock.unwrap_or_else(Instant::now)
    }

    fn spectate(&mut self, id: PlayerId, name: Username) {
        info!("{name} is spectating, table is full");
        self.events.push_back(GameEvent::Spectating(name.clone()));
        self.spectators.push_back(Entrant { id, name });
    }

    fn fire_session_task(&mut self, now: Instant) {
        let Some((due, handle, task)) = self.scheduler.pop_due(now) else {
            return;
        };
        if self.auto_start == Some(handle) {
            self.auto_start = None;
        }
        match task {
            SessionTask::Grace(id) => self.release_seat(&id, due),
            SessionTask::AutoStart => {
                if self.engine.phase() != Phase::Waiting || !self.enough_players() {
                    debug!("auto-start no longer needed");
                    return;
                }
                if let Err(err) = self.engine.with_clock(due, HandEngine::start_hand) {
                    debug!("auto-start didn't deal a hand: {err}");
                }
            }
        }
    }

    fn release_seat(&mut self, id: &PlayerId, due: Instant) {
        let Some(name) = self
            .departed
            .iter()
            .find(|(_, departure)| &departure.id == id)
            .map(|(name, _)| name.clone())
        else {
            return;
        };
        self.departed.remove(&name);
        info!("{name} didn't come back, releasing their seat");
        if let Err(err) = self.engine.with_clock(due, |engine| engine.unseat(id)) {
            debug!("{name} was already gone: {err}");
        }
    }

    fn enough_players(&self) -> bool {
        self.engine.players().len() + self.engine.pending().len() >= 2
    }

    /// Bookkeeping after anything changed: collect engine events, fill
    /// freed capacity from the spectators, and arm the auto-start.
    fn after_change(&mut self) {
        self.events.extend(self.engine.drain_events());
        self.promote_spectators();
        self.arm_auto_start();
    }

    fn promote_spectators(&mut self) {
        while self.engine.occupancy() < self.config.max_players {
            let Some(entrant) = self.spectators.pop_front() else {
                break;
            };
            match self.engine.seat(entrant.id.clone(), entrant.name.clone()) {
                Ok(outcome) => {
                    info!("promoted spectator {} ({outcome:?})", entrant.name);
                    self.events.extend(self.engine.drain_events());
                }
                Err(err) => {
                    warn!("couldn't seat spectator {}: {err}", entrant.name);
                    self.spectators.push_front(entrant);
                    break;
                }
            }
        }
    }

    fn arm_auto_start(&mut self) {
        if self.engine.phase() != Phase::Waiting || !self.enough_players() {
            return;
        }
        if self.auto_start.is_some_and(|handle| self.scheduler.is_pending(handle)) {
            return;
        }
        let due = self.now() + self.config.timings.auto_start_delay;
        debug!("starting a hand at {due:?}");
        self.scheduler
            .rearm(&mut self.auto_start, due, SessionTask::AutoStart);
    }
}
