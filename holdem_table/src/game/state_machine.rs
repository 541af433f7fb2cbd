//! Hand engine: the seats, chips, and state machine of a single table.
//!
//! The engine performs no I/O and never sleeps. Pauses (turn clocks, board
//! reveals, showdown displays) are tasks in an internal [`Scheduler`]; the
//! owner sleeps until [`HandEngine::next_deadline`] and then calls
//! [`HandEngine::fire_due`]. Everything observable is also pushed onto an
//! event queue drained with [`HandEngine::drain_events`].

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt, mem,
};
use thiserror::Error;
use tokio::time::{Duration, Instant};

use super::{
    constants::{HOLE_CARDS, MAX_PLAYERS},
    entities::{
        Action, ActionChoice, ActionChoices, Card, Chips, Deck, DeckError, Entrant, LastAction,
        Phase, Player, PlayerId, SeatIndex, SeatView, TableSnapshot, Username, Winner,
    },
    functional::{HandResult, evaluate},
    pots::{Contribution, build_side_pots, settle},
};
use crate::schedule::{Scheduler, TaskHandle};

pub const DEFAULT_SMALL_BLIND: Chips = 1;
pub const DEFAULT_BIG_BLIND: Chips = 2;
pub const DEFAULT_STARTING_STACK: Chips = 400;

/// Hand name recorded for a pot nobody contested.
pub const LAST_STANDING: &str = "Last standing";

/// Errors that can occur during user operations
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum UserError {
    #[error("table is full")]
    CapacityReached,
    #[error("cards are still being dealt")]
    DealingInProgress,
    #[error("invalid action")]
    InvalidAction,
    #[error("name can't be empty")]
    InvalidName,
    #[error("no betting during {0}")]
    NotBettingPhase(Phase),
    #[error("not eligible")]
    NotEligible,
    #[error("not your turn")]
    OutOfTurnAction,
    #[error("user already exists")]
    UserAlreadyExists,
    #[error("user does not exist")]
    UserDoesNotExist,
}

/// Internal failures. These mean an invariant was broken; the hand in
/// progress is abandoned and every contribution refunded.
#[derive(Debug, Eq, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// Events that occur during gameplay
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameEvent {
    Seated(Username, SeatIndex),
    Queued(Username),
    Rebought(Username),
    Reconnected(Username),
    Disconnected(Username),
    LeaveQueued(Username),
    Left(Username),
    Busted(Username),
    Spectating(Username),
    HandStarted { hand_number: u64, dealer_seat: SeatIndex },
    Acted(Username, LastAction),
    TimedOut(Username),
    StreetDealt(Phase),
    CardRevealed(Card),
    BettingOpened(Phase),
    Showdown,
    Won(Username, Chips, String),
    HandAbandoned(u64),
    Waiting,
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Seated(username, seat_idx) => format!("{username} took seat {seat_idx}"),
            Self::Queued(username) => format!("{username} will be dealt in next hand"),
            Self::Rebought(username) => format!("{username} rebought"),
            Self::Reconnected(username) => format!("{username} reconnected"),
            Self::Disconnected(username) => format!("{username} disconnected"),
            Self::LeaveQueued(username) => format!("{username} will leave after this hand"),
            Self::Left(username) => format!("{username} left the table"),
            Self::Busted(username) => format!("{username} is out of chips"),
            Self::Spectating(username) => format!("{username} is spectating"),
            Self::HandStarted {
                hand_number,
                dealer_seat,
            } => format!("hand #{hand_number} started, dealer at seat {dealer_seat}"),
            Self::Acted(username, action) => format!("{username}: {action}"),
            Self::TimedOut(username) => format!("{username} ran out of time"),
            Self::StreetDealt(phase) => format!("dealing the {phase}"),
            Self::CardRevealed(card) => format!("board: {}", card.to_string().trim()),
            Self::BettingOpened(phase) => format!("betting opens on the {phase}"),
            Self::Showdown => "showdown".to_string(),
            Self::Won(username, amount, hand) => format!("{username} won {amount} ({hand})"),
            Self::HandAbandoned(hand_number) => {
                format!("hand #{hand_number} abandoned, bets refunded")
            }
            Self::Waiting => "waiting for players".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// Pauses the engine schedules for itself.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandTimings {
    pub action_timeout: Duration,
    /// Before the first card of a street is turned.
    pub reveal_lead_in: Duration,
    pub reveal_interval: Duration,
    /// After the last card of a street, before betting opens.
    pub reveal_settle: Duration,
    /// Between streets when nobody can bet.
    pub runout_pause: Duration,
    /// Between revealing hands and paying the pots.
    pub showdown_settle: Duration,
    /// Between paying the pots and the next hand.
    pub showdown_display: Duration,
    pub uncontested_display: Duration,
}

impl Default for HandTimings {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(30),
            reveal_lead_in: Duration::from_millis(600),
            reveal_interval: Duration::from_millis(1000),
            reveal_settle: Duration::from_millis(1000),
            runout_pause: Duration::from_millis(800),
            showdown_settle: Duration::from_millis(2500),
            showdown_display: Duration::from_millis(5000),
            uncontested_display: Duration::from_millis(3000),
        }
    }
}

/// Game configuration settings
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameSettings {
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub starting_stack: Chips,
    /// Seats plus queued and busted entrants.
    pub max_players: usize,
    pub timings: HandTimings,
    /// Fixed seed for reproducible shuffles.
    pub seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            starting_stack: DEFAULT_STARTING_STACK,
            max_players: MAX_PLAYERS,
            timings: HandTimings::default(),
            seed: None,
        }
    }
}

/// Where a newly accepted entrant ended up.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SeatOutcome {
    Seated(SeatIndex),
    /// Dealt in at the next hand start.
    Pending,
}

/// Deferred engine work. Every task remembers the hand it was scheduled in
/// and is dropped if another hand has started since.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EngineTask {
    ActionTimeout { hand: u64, seat_idx: SeatIndex },
    RevealCard(u64),
    OpenStreet(u64),
    Runout(u64),
    Settle(u64),
    NextHand(u64),
}

impl EngineTask {
    fn hand(self) -> u64 {
        match self {
            Self::ActionTimeout { hand, .. }
            | Self::RevealCard(hand)
            | Self::OpenStreet(hand)
            | Self::Runout(hand)
            | Self::Settle(hand)
            | Self::NextHand(hand) => hand,
        }
    }
}

#[derive(Debug)]
pub struct HandEngine {
    settings: GameSettings,
    rng: StdRng,
    deck: Deck,
    next_deck: Option<Deck>,
    /// Seated players, sorted by seat index.
    players: Vec<Player>,
    pending: VecDeque<Entrant>,
    busted: VecDeque<Entrant>,
    phase: Phase,
    board: Vec<Card>,
    /// Dealt for the current street but not yet turned face up.
    unrevealed: VecDeque<Card>,
    is_dealing: bool,
    /// Bets swept from finished streets.
    pot: Chips,
    current_bet: Chips,
    min_raise: Chips,
    dealer_seat: Option<SeatIndex>,
    active_seat: Option<SeatIndex>,
    hand_number: u64,
    winners: Option<Vec<Winner>>,
    showdown_hands: BTreeMap<SeatIndex, HandResult>,
    action_deadline: Option<DateTime<Utc>>,
    scheduler: Scheduler<EngineTask>,
    action_timer: Option<TaskHandle>,
    flow_timer: Option<TaskHandle>,
    /// Due instant of the task being fired, if any.
    clock: Option<Instant>,
    events: VecDeque<GameEvent>,
}

impl Default for HandEngine {
    fn default() -> Self {
        Self::new(GameSettings::default())
    }
}

impl HandEngine {
    #[must_use]
    pub fn new(settings: GameSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let min_raise = settings.big_blind;
        Self {
            settings,
            rng,
            deck: Deck::default(),
            next_deck: None,
            players: Vec::with_capacity(MAX_PLAYERS),
            pending: VecDeque::new(),
            busted: VecDeque::new(),
            phase: Phase::Waiting,
            board: Vec::new(),
            unrevealed: VecDeque::new(),
            is_dealing: false,
            pot: 0,
            current_bet: 0,
            min_raise,
            dealer_seat: None,
            active_seat: None,
            hand_number: 0,
            winners: None,
            showdown_hands: BTreeMap::new(),
            action_deadline: None,
            scheduler: Scheduler::new(),
            action_timer: None,
            flow_timer: None,
            clock: None,
            events: VecDeque::new(),
        }
    }

    // === Queries ===

    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn pending(&self) -> &VecDeque<Entrant> {
        &self.pending
    }

    #[must_use]
    pub fn busted(&self) -> &VecDeque<Entrant> {
        &self.busted
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    /// Swept pot plus the bets still in front of players.
    #[must_use]
    pub fn total_pot(&self) -> Chips {
        self.pot + self.players.iter().map(|p| p.bet).sum::<Chips>()
    }

    #[must_use]
    pub fn current_bet(&self) -> Chips {
        self.current_bet
    }

    #[must_use]
    pub fn min_raise(&self) -> Chips {
        self.min_raise
    }

    #[must_use]
    pub fn dealer_seat(&self) -> Option<SeatIndex> {
        self.dealer_seat
    }

    #[must_use]
    pub fn active_seat(&self) -> Option<SeatIndex> {
        self.active_seat
    }

    #[must_use]
    pub fn is_dealing(&self) -> bool {
        self.is_dealing
    }

    #[must_use]
    pub fn winners(&self) -> Option<&[Winner]> {
        self.winners.as_deref()
    }

    #[must_use]
    pub fn showdown_hand(&self, seat_idx: SeatIndex) -> Option<&HandResult> {
        self.showdown_hands.get(&seat_idx)
    }

    #[must_use]
    pub fn action_deadline(&self) -> Option<DateTime<Utc>> {
        self.action_deadline
    }

    #[must_use]
    pub fn is_seated(&self, id: &PlayerId) -> bool {
        self.players.iter().any(|p| &p.id == id)
    }

    #[must_use]
    pub fn is_pending(&self, id: &PlayerId) -> bool {
        self.pending.iter().any(|e| &e.id == id)
    }

    #[must_use]
    pub fn is_busted(&self, id: &PlayerId) -> bool {
        self.busted.iter().any(|e| &e.id == id)
    }

    /// Seated, pending, and busted entrants count toward the table's
    /// capacity. Players on their way out do not.
    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.players.iter().filter(|p| !p.leaving).count() + self.pending.len() + self.busted.len()
    }

    /// Every chip on the table: stacks, live bets, and the swept pot.
    #[must_use]
    pub fn chips_in_play(&self) -> Chips {
        self.players.iter().map(|p| p.chips).sum::<Chips>() + self.total_pot()
    }

    #[must_use]
    pub fn small_blind_seat(&self) -> Option<SeatIndex> {
        let dealer = self.dealer_seat?;
        if self.players.len() == 2 {
            Some(dealer)
        } else {
            self.next_seat_after(dealer, |_| true)
        }
    }

    #[must_use]
    pub fn big_blind_seat(&self) -> Option<SeatIndex> {
        self.next_seat_after(self.small_blind_seat()?, |_| true)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        mem::take(&mut self.events)
    }

    /// Deal the next hand from `deck` instead of a fresh shuffle.
    pub fn set_next_deck(&mut self, deck: Deck) {
        self.next_deck = Some(deck);
    }

    // === Seat lifecycle ===

    pub fn seat(&mut self, id: PlayerId, name: Username) -> Result<SeatOutcome, UserError> {
        if name.is_empty() {
            return Err(UserError::InvalidName);
        }
        if self.occupancy() >= self.settings.max_players {
            return Err(UserError::CapacityReached);
        }
        if self.is_seated(&id) || self.is_pending(&id) || self.is_busted(&id) {
            return Err(UserError::UserAlreadyExists);
        }
        let entrant = Entrant { id, name };
        if self.phase != Phase::Waiting {
            info!("{} queued for the next hand", entrant.name);
            self.events.push_back(GameEvent::Queued(entrant.name.clone()));
            self.pending.push_back(entrant);
            return Ok(SeatOutcome::Pending);
        }
        let seat_idx = self.free_seat().ok_or(UserError::CapacityReached)?;
        self.seat_entrant(entrant, seat_idx);
        Ok(SeatOutcome::Seated(seat_idx))
    }

    /// Put a busted entrant back in with a fresh starting stack.
    pub fn rebuy(&mut self, id: &PlayerId) -> Result<SeatOutcome, UserError> {
        let pos = self
            .busted
            .iter()
            .position(|e| &e.id == id)
            .ok_or(UserError::NotEligible)?;
        let seat_idx = if self.phase == Phase::Waiting {
            Some(self.free_seat().ok_or(UserError::CapacityReached)?)
        } else {
            None
        };
        let entrant = self.busted.remove(pos).ok_or(UserError::NotEligible)?;
        info!("{} rebought", entrant.name);
        self.events.push_back(GameEvent::Rebought(entrant.name.clone()));
        match seat_idx {
            Some(seat_idx) => {
                self.seat_entrant(entrant, seat_idx);
                Ok(SeatOutcome::Seated(seat_idx))
            }
            None => {
                self.pending.push_back(entrant);
                Ok(SeatOutcome::Pending)
            }
        }
    }

    /// Rebind a seated player to a new identity, keeping their seat, stack,
    /// and cards. A pending departure is cancelled.
    pub fn reconnect_identity(&mut self, old: &PlayerId, new: PlayerId) -> Result<(), UserError> {
        let idx = self.index_of(old).ok_or(UserError::NotEligible)?;
        if old != &new && (self.is_seated(&new) || self.is_pending(&new) || self.is_busted(&new)) {
            return Err(UserError::UserAlreadyExists);
        }
        let player = &mut self.players[idx];
        player.id = new.clone();
        player.leaving = false;
        let name = player.name.clone();
        for winner in self.winners.iter_mut().flatten() {
            if &winner.id == old {
                winner.id = new.clone();
            }
        }
        info!("{name} reconnected as {new}");
        self.events.push_back(GameEvent::Reconnected(name));
        Ok(())
    }

    /// Take someone off the table. Mid-hand, a seated player is folded and
    /// removed when the next hand starts.
    pub fn unseat(&mut self, id: &PlayerId) -> Result<(), UserError> {
        for queue in [&mut self.pending, &mut self.busted] {
            if let Some(pos) = queue.iter().position(|e| &e.id == id) {
                if let Some(entrant) = queue.remove(pos) {
                    info!("{} left the queue", entrant.name);
                    self.events.push_back(GameEvent::Left(entrant.name));
                }
                return Ok(());
            }
        }

        let idx = self.index_of(id).ok_or(UserError::UserDoesNotExist)?;
        if self.phase == Phase::Waiting {
            let player = self.players.remove(idx);
            info!("{} left seat {}", player.name, player.seat_idx);
            self.events.push_back(GameEvent::Left(player.name));
            return Ok(());
        }

        let player = &mut self.players[idx];
        player.leaving = true;
        let forced_fold = !player.folded && self.phase != Phase::Showdown;
        if forced_fold {
            player.folded = true;
            player.last_action = Some(LastAction::Fold);
        }
        let (name, seat_idx) = (player.name.clone(), player.seat_idx);
        info!("{name} will leave after hand #{}", self.hand_number);
        self.events.push_back(GameEvent::LeaveQueued(name));
        if !forced_fold {
            return Ok(());
        }

        let result = if self.active_seat == Some(seat_idx) {
            self.advance_turn()
        } else {
            if self.live_count() <= 1 {
                self.award_uncontested();
            }
            Ok(())
        };
        if let Err(err) = result {
            self.abandon_hand(&err);
        }
        Ok(())
    }

    // === Hand flow ===

    /// Start a hand from [`Phase::Waiting`], or stay waiting when fewer than
    /// two players are seated. Once hands are running the engine deals the
    /// next one itself, so this is a no-op in any other phase.
    pub fn start_hand(&mut self) -> Result<(), EngineError> {
        if self.phase != Phase::Waiting {
            debug!("hand #{} is still in progress", self.hand_number);
            return Ok(());
        }
        self.deal_hand().inspect_err(|err| self.abandon_hand(err))
    }

    /// Options offered to `id`. Empty unless it's their turn and no cards
    /// are being turned.
    #[must_use]
    pub fn available_actions(&self, id: &PlayerId) -> ActionChoices {
        let Some(player) = self.player(id) else {
            return ActionChoices::default();
        };
        if !self.phase.is_betting()
            || self.is_dealing
            || self.active_seat != Some(player.seat_idx)
            || !player.can_act()
        {
            return ActionChoices::default();
        }

        let mut choices = vec![ActionChoice::Fold];
        let owed = self.current_bet.saturating_sub(player.bet);
        if owed == 0 {
            choices.push(ActionChoice::Check);
        } else if owed >= player.chips {
            choices.push(ActionChoice::AllIn {
                amount: player.chips,
            });
        } else {
            choices.push(ActionChoice::Call { amount: owed });
        }

        let min = self.current_bet + self.min_raise;
        let max = player.bet + player.chips;
        if player.chips > owed && max > self.current_bet {
            if max > min {
                choices.push(ActionChoice::Raise { min, max });
            }
            choices.push(ActionChoice::AllIn {
                amount: player.chips,
            });
        }
        ActionChoices(choices)
    }

    pub fn apply_action(&mut self, id: &PlayerId, action: Action) -> Result<(), UserError> {
        let idx = self.index_of(id).ok_or(UserError::UserDoesNotExist)?;
        if !self.phase.is_betting() {
            return Err(UserError::NotBettingPhase(self.phase));
        }
        if self.is_dealing {
            return Err(UserError::DealingInProgress);
        }
        if self.active_seat != Some(self.players[idx].seat_idx) {
            return Err(UserError::OutOfTurnAction);
        }
        if !self.available_actions(id).contains(&action) {
            return Err(UserError::InvalidAction);
        }
        if let Err(err) = self.act(idx, action) {
            self.abandon_hand(&err);
        }
        Ok(())
    }

    /// Run every task due at or before `now`, in order. Returns how many
    /// fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while self.fire_next(now) {
            fired += 1;
        }
        fired
    }

    /// Run the earliest task due at or before `now`, if any.
    pub fn fire_next(&mut self, now: Instant) -> bool {
        let Some((due, handle, task)) = self.scheduler.pop_due(now) else {
            return false;
        };
        for slot in [&mut self.action_timer, &mut self.flow_timer] {
            if *slot == Some(handle) {
                *slot = None;
            }
        }
        let outer = self.clock.replace(due);
        if let Err(err) = self.run_task(task) {
            self.abandon_hand(&err);
        }
        self.clock = outer;
        true
    }

    /// Run `f` as though the current time were `at`. Anything `f` schedules
    /// is measured from `at` instead of the wall clock.
    pub fn with_clock<R>(&mut self, at: Instant, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = self.clock.replace(at);
        let result = f(self);
        self.clock = outer;
        result
    }

    #[must_use]
    pub fn snapshot_for(&self, viewer: &PlayerId) -> TableSnapshot {
        let in_hand = self.phase != Phase::Waiting;
        let at_showdown = self.phase == Phase::Showdown;
        let is_player = self.is_seated(viewer);
        let seats = self
            .players
            .iter()
            .map(|p| {
                let visible = &p.id == viewer || (at_showdown && !p.folded);
                SeatView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    chips: p.chips,
                    bet: p.bet,
                    total_bet: p.total_bet,
                    folded: p.folded,
                    all_in: p.all_in,
                    seat_idx: p.seat_idx,
                    last_action: p.last_action,
                    is_dealer: self.dealer_seat == Some(p.seat_idx),
                    cards: visible.then(|| p.cards.clone()),
                }
            })
            .collect();
        let showdown_hands = if at_showdown {
            self.showdown_hands
                .iter()
                .map(|(seat_idx, result)| (*seat_idx, result.name.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };

        TableSnapshot {
            phase: self.phase,
            pot: self.total_pot(),
            board: self.board.clone(),
            current_bet: self.current_bet,
            dealer_seat: self.dealer_seat,
            small_blind_seat: self.small_blind_seat().filter(|_| in_hand),
            big_blind_seat: self.big_blind_seat().filter(|_| in_hand),
            active_seat: self.active_seat,
            hand_number: self.hand_number,
            viewer: viewer.clone(),
            is_player,
            is_pending: self.is_pending(viewer),
            is_spectator: !is_player,
            is_dealing: self.is_dealing,
            seats,
            available_actions: self.available_actions(viewer),
            winners: self.winners.clone(),
            showdown_hands,
            action_deadline: self.action_deadline,
            can_rebuy: self.is_busted(viewer),
        }
    }

    // === Internals ===

    fn now(&self) -> Instant {
        self.clock.unwrap_or_else(Instant::now)
    }

    fn index_of(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    fn index_at(&self, seat_idx: SeatIndex) -> Option<usize> {
        self.players
            .binary_search_by_key(&seat_idx, |p| p.seat_idx)
            .ok()
    }

    fn free_seat(&self) -> Option<SeatIndex> {
        (0..self.settings.max_players.min(MAX_PLAYERS)).find(|seat| self.index_at(*seat).is_none())
    }

    /// First seat after `seat_idx` (wrapping, `seat_idx` itself last) whose
    /// player satisfies `pred`.
    fn next_seat_after(
        &self,
        seat_idx: SeatIndex,
        pred: impl Fn(&Player) -> bool,
    ) -> Option<SeatIndex> {
        let start = self.players.partition_point(|p| p.seat_idx <= seat_idx);
        let n = self.players.len();
        (0..n)
            .map(|k| &self.players[(start + k) % n])
            .find(|p| pred(p))
            .map(|p| p.seat_idx)
    }

    fn live_count(&self) -> usize {
        self.players.iter().filter(|p| !p.folded).count()
    }

    fn round_complete(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.can_act())
            .all(|p| p.has_acted)
    }

    fn seat_entrant(&mut self, entrant: Entrant, seat_idx: SeatIndex) {
        info!("{} takes seat {seat_idx}", entrant.name);
        self.events
            .push_back(GameEvent::Seated(entrant.name.clone(), seat_idx));
        let player = Player::new(
            entrant.id,
            entrant.name,
            self.settings.starting_stack,
            seat_idx,
        );
        let pos = self.players.partition_point(|p| p.seat_idx < seat_idx);
        self.players.insert(pos, player);
    }

    fn arm_flow(&mut self, delay: Duration, task: fn(u64) -> EngineTask) {
        let due = self.now() + delay;
        let task = task(self.hand_number);
        self.scheduler.rearm(&mut self.flow_timer, due, task);
    }

    fn start_action_clock(&mut self) {
        let Some(seat_idx) = self.active_seat else {
            return;
        };
        let timeout = self.settings.timings.action_timeout;
        let due = self.now() + timeout;
        let task = EngineTask::ActionTimeout {
            hand: self.hand_number,
            seat_idx,
        };
        self.scheduler.rearm(&mut self.action_timer, due, task);
        let remaining = due.saturating_duration_since(Instant::now());
        self.action_deadline =
            Some(Utc::now() + TimeDelta::from_std(remaining).unwrap_or(TimeDelta::zero()));
    }

    fn stop_action_clock(&mut self) {
        self.scheduler.cancel_slot(&mut self.action_timer);
        self.action_deadline = None;
    }

    fn sweep_bets(&mut self) {
        for player in &mut self.players {
            self.pot += mem::take(&mut player.bet);
        }
    }

    fn run_task(&mut self, task: EngineTask) -> Result<(), EngineError> {
        if task.hand() != self.hand_number {
            debug!("dropping {task:?} from an earlier hand");
            return Ok(());
        }
        match task {
            EngineTask::ActionTimeout { seat_idx, .. } => self.expire_turn(seat_idx),
            EngineTask::RevealCard(_) => {
                self.reveal_next_card();
                Ok(())
            }
            EngineTask::OpenStreet(_) => {
                self.open_street();
                Ok(())
            }
            EngineTask::Runout(_) => {
                if self.phase.is_betting() && !self.is_dealing && self.active_seat.is_none() {
                    self.advance_phase()?;
                }
                Ok(())
            }
            EngineTask::Settle(_) => {
                if self.phase == Phase::Showdown && self.winners.is_none() {
                    self.distribute_pots();
                    self.arm_flow(
                        self.settings.timings.showdown_display,
                        EngineTask::NextHand,
                    );
                }
                Ok(())
            }
            EngineTask::NextHand(_) => {
                if self.phase == Phase::Showdown {
                    self.deal_hand()?;
                }
                Ok(())
            }
        }
    }

    fn deal_hand(&mut self) -> Result<(), EngineError> {
        self.stop_action_clock();
        self.scheduler.cancel_slot(&mut self.flow_timer);
        self.remove_departed();
        self.promote_pending();
        if self.players.len() < 2 {
            self.enter_waiting();
            return Ok(());
        }

        self.hand_number += 1;
        self.board.clear();
        self.unrevealed.clear();
        self.is_dealing = false;
        self.pot = 0;
        self.winners = None;
        self.showdown_hands.clear();
        self.active_seat = None;
        for player in &mut self.players {
            player.reset();
        }

        let dealer = self
            .dealer_seat
            .and_then(|prev| self.next_seat_after(prev, |_| true))
            .unwrap_or(self.players[0].seat_idx);
        self.dealer_seat = Some(dealer);
        self.deck = match self.next_deck.take() {
            Some(deck) => deck,
            None => Deck::shuffled(&mut self.rng),
        };
        self.post_blinds();
        for player in &mut self.players {
            player.cards = self.deck.deal(HOLE_CARDS)?;
        }
        self.phase = Phase::PreFlop;
        info!(
            "hand #{} starting with {} players, dealer at seat {dealer}",
            self.hand_number,
            self.players.len()
        );
        self.events.push_back(GameEvent::HandStarted {
            hand_number: self.hand_number,
            dealer_seat: dealer,
        });

        // Heads-up the seat after the big blind is the dealer.
        let first = self
            .big_blind_seat()
            .and_then(|bb| self.next_seat_after(bb, Player::can_act));
        match first {
            Some(seat_idx) if !self.round_complete() => {
                self.active_seat = Some(seat_idx);
                self.start_action_clock();
                Ok(())
            }
            _ => self.advance_phase(),
        }
    }

    fn remove_departed(&mut self) {
        let (departed, staying): (Vec<Player>, Vec<Player>) =
            mem::take(&mut self.players).into_iter().partition(|p| p.leaving);
        for player in departed {
            info!("{} left seat {}", player.name, player.seat_idx);
            self.events.push_back(GameEvent::Left(player.name));
        }
        let (broke, staying): (Vec<Player>, Vec<Player>) =
            staying.into_iter().partition(|p| p.chips == 0);
        for player in broke {
            info!("{} busted out", player.name);
            self.events.push_back(GameEvent::Busted(player.name.clone()));
            self.busted.push_back(Entrant {
                id: player.id,
                name: player.name,
            });
        }
        self.players = staying;
    }

    fn promote_pending(&mut self) {
        while let Some(seat_idx) = self.free_seat() {
            let Some(entrant) = self.pending.pop_front() else {
                break;
            };
            self.seat_entrant(entrant, seat_idx);
        }
    }

    fn post_blinds(&mut self) {
        let blinds = [
            (self.small_blind_seat(), self.settings.small_blind),
            (self.big_blind_seat(), self.settings.big_blind),
        ];
        let mut highest = 0;
        for (seat_idx, blind) in blinds {
            let Some(idx) = seat_idx.and_then(|seat| self.index_at(seat)) else {
                continue;
            };
            highest = highest.max(self.players[idx].place_bet(blind));
        }
        self.current_bet = highest;
        self.min_raise = self.settings.big_blind;
    }

    fn enter_waiting(&mut self) {
        self.stop_action_clock();
        self.scheduler.cancel_slot(&mut self.flow_timer);
        self.phase = Phase::Waiting;
        self.board.clear();
        self.unrevealed.clear();
        self.is_dealing = false;
        self.pot = 0;
        self.current_bet = 0;
        self.min_raise = self.settings.big_blind;
        self.active_seat = None;
        self.winners = None;
        self.showdown_hands.clear();
        for player in &mut self.players {
            player.reset();
        }
        debug!("waiting with {} seated", self.players.len());
        self.events.push_back(GameEvent::Waiting);
    }

    fn abandon_hand(&mut self, err: &EngineError) {
        error!("hand #{} abandoned: {err}", self.hand_number);
        for player in &mut self.players {
            player.chips += player.total_bet;
        }
        self.remove_departed();
        self.enter_waiting();
        self.events
            .push_back(GameEvent::HandAbandoned(self.hand_number));
    }

    fn act(&mut self, idx: usize, action: Action) -> Result<(), EngineError> {
        self.stop_action_clock();
        let current_bet = self.current_bet;
        let min_raise = self.min_raise;
        let player = &mut self.players[idx];
        let label = match action {
            Action::Fold => {
                player.folded = true;
                LastAction::Fold
            }
            Action::Check => LastAction::Check,
            Action::Call => {
                player.place_bet(current_bet.saturating_sub(player.bet));
                if player.all_in {
                    LastAction::AllIn
                } else {
                    LastAction::Call
                }
            }
            Action::Raise(amount) => {
                let target = amount.unwrap_or(0).max(current_bet + min_raise);
                player.place_bet(target.saturating_sub(player.bet));
                if player.all_in {
                    LastAction::AllIn
                } else {
                    LastAction::Raise
                }
            }
            Action::AllIn => {
                let stack = player.chips;
                player.place_bet(stack);
                LastAction::AllIn
            }
        };
        player.has_acted = true;
        player.last_action = Some(label);
        let (bet, name) = (player.bet, player.name.clone());

        if bet > current_bet {
            let raise = bet - current_bet;
            if raise >= min_raise {
                self.min_raise = raise;
            }
            self.current_bet = bet;
            for (i, other) in self.players.iter_mut().enumerate() {
                if i != idx && other.can_act() {
                    other.has_acted = false;
                }
            }
        }
        debug!("{name}: {label}, bet {bet}");
        self.events.push_back(GameEvent::Acted(name, label));
        self.advance_turn()
    }

    fn expire_turn(&mut self, seat_idx: SeatIndex) -> Result<(), EngineError> {
        if !self.phase.is_betting() || self.is_dealing || self.active_seat != Some(seat_idx) {
            return Ok(());
        }
        let Some(idx) = self.index_at(seat_idx) else {
            return Ok(());
        };
        let id = self.players[idx].id.clone();
        let name = self.players[idx].name.clone();
        let action = if self.available_actions(&id).contains(&Action::Check) {
            Action::Check
        } else {
            Action::Fold
        };
        info!("{name} timed out and {action}");
        self.events.push_back(GameEvent::TimedOut(name));
        self.act(idx, action)
    }

    fn advance_turn(&mut self) -> Result<(), EngineError> {
        if self.live_count() <= 1 {
            self.award_uncontested();
            return Ok(());
        }
        if self.round_complete() {
            return self.advance_phase();
        }
        self.active_seat = self
            .active_seat
            .and_then(|seat| self.next_seat_after(seat, Player::can_act));
        self.start_action_clock();
        Ok(())
    }

    fn advance_phase(&mut self) -> Result<(), EngineError> {
        self.stop_action_clock();
        self.active_seat = None;
        self.sweep_bets();
        let Some((next, count)) = self.phase.next_street() else {
            self.showdown();
            return Ok(());
        };
        let cards = self.deck.deal(count)?;
        debug!("hand #{}: dealing the {next}", self.hand_number);
        self.phase = next;
        self.unrevealed.extend(cards);
        self.is_dealing = true;
        self.events.push_back(GameEvent::StreetDealt(next));
        self.arm_flow(self.settings.timings.reveal_lead_in, EngineTask::RevealCard);
        Ok(())
    }

    fn reveal_next_card(&mut self) {
        if !self.is_dealing {
            return;
        }
        if let Some(card) = self.unrevealed.pop_front() {
            self.board.push(card);
            self.events.push_back(GameEvent::CardRevealed(card));
        }
        if self.unrevealed.is_empty() {
            self.arm_flow(self.settings.timings.reveal_settle, EngineTask::OpenStreet);
        } else {
            self.arm_flow(self.settings.timings.reveal_interval, EngineTask::RevealCard);
        }
    }

    /// The street's cards are all up: open betting, or keep running the
    /// board out when at most one player can still bet.
    fn open_street(&mut self) {
        if !self.is_dealing || !self.phase.is_betting() {
            return;
        }
        self.is_dealing = false;
        for player in &mut self.players {
            player.has_acted = false;
            player.last_action = None;
        }
        self.current_bet = 0;
        self.min_raise = self.settings.big_blind;

        let can_act = self.players.iter().filter(|p| p.can_act()).count();
        if can_act <= 1 {
            self.sweep_bets();
            self.arm_flow(self.settings.timings.runout_pause, EngineTask::Runout);
            return;
        }

        // Heads-up the big blind acts first after the flop.
        let first = if self.players.len() == 2 {
            self.big_blind_seat().and_then(|bb| {
                let bb_acts = self.index_at(bb).is_some_and(|i| self.players[i].can_act());
                if bb_acts {
                    Some(bb)
                } else {
                    self.next_seat_after(bb, Player::can_act)
                }
            })
        } else {
            self.dealer_seat
                .and_then(|dealer| self.next_seat_after(dealer, Player::can_act))
        };
        self.active_seat = first;
        self.events.push_back(GameEvent::BettingOpened(self.phase));
        self.start_action_clock();
    }

    fn showdown(&mut self) {
        self.stop_action_clock();
        self.active_seat = None;
        self.is_dealing = false;
        self.sweep_bets();
        self.phase = Phase::Showdown;
        self.winners = None;
        self.showdown_hands = self
            .players
            .iter()
            .filter(|p| !p.folded)
            .filter_map(|p| evaluate(&p.cards, &self.board).map(|result| (p.seat_idx, result)))
            .collect();
        for (seat_idx, result) in &self.showdown_hands {
            debug!("seat {seat_idx} shows {result}");
        }
        self.events.push_back(GameEvent::Showdown);
        self.arm_flow(self.settings.timings.showdown_settle, EngineTask::Settle);
    }

    fn award_uncontested(&mut self) {
        self.stop_action_clock();
        self.active_seat = None;
        self.is_dealing = false;
        self.unrevealed.clear();
        self.sweep_bets();
        let pot = mem::take(&mut self.pot);

        match self.players.iter().position(|p| !p.folded) {
            Some(idx) => {
                let player = &mut self.players[idx];
                player.chips += pot;
                let winner = Winner {
                    seat_idx: player.seat_idx,
                    id: player.id.clone(),
                    name: player.name.clone(),
                    amount: pot,
                    hand: LAST_STANDING.to_string(),
                };
                info!("{} takes {pot} uncontested", winner.name);
                self.events.push_back(GameEvent::Won(
                    winner.name.clone(),
                    pot,
                    winner.hand.clone(),
                ));
                self.winners = Some(vec![winner]);
            }
            None => {
                error!("no live player left for a pot of {pot}, refunding");
                for player in &mut self.players {
                    player.chips += player.total_bet;
                }
                self.winners = Some(Vec::new());
            }
        }
        self.phase = Phase::Showdown;
        self.arm_flow(self.settings.timings.uncontested_display, EngineTask::NextHand);
    }

    fn distribute_pots(&mut self) {
        let contributions: Vec<Contribution> = self
            .players
            .iter()
            .map(|p| Contribution {
                id: p.id.clone(),
                seat_idx: p.seat_idx,
                total: p.total_bet,
                folded: p.folded,
                all_in: p.all_in,
            })
            .collect();
        let results: HashMap<PlayerId, HandResult> = self
            .players
            .iter()
            .filter_map(|p| {
                self.showdown_hands
                    .get(&p.seat_idx)
                    .map(|result| (p.id.clone(), result.clone()))
            })
            .collect();

        let pots = build_side_pots(&contributions);
        let payouts = settle(&pots, &contributions, &results);
        let paid: Chips = payouts.iter().map(|p| p.amount).sum();
        if paid != self.pot {
            error!(
                "hand #{}: paid out {paid} from a pot of {}",
                self.hand_number, self.pot
            );
        }

        let mut winners = Vec::with_capacity(payouts.len());
        for payout in payouts {
            let Some(idx) = self.index_of(&payout.id) else {
                continue;
            };
            let player = &mut self.players[idx];
            player.chips += payout.amount;
            info!("{} wins {} with {}", player.name, payout.amount, payout.hand);
            winners.push(Winner {
                seat_idx: player.seat_idx,
                id: payout.id,
                name: player.name.clone(),
                amount: payout.amount,
                hand: payout.hand,
            });
        }
        for winner in &winners {
            self.events.push_back(GameEvent::Won(
                winner.name.clone(),
                winner.amount,
                winner.hand.clone(),
            ));
        }
        self.pot = self.pot.saturating_sub(paid);
        self.winners = Some(winners);
    }
}
