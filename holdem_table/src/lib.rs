//! # Hold'em Table
//!
//! A single shared no-limit Texas Hold'em table for up to ten players.
//!
//! The crate is split in two layers:
//!
//! - [`game`]: the rules. A synchronous [`HandEngine`] that deals, takes
//!   bets, reveals the board, builds side pots, and pays them out. It does no
//!   I/O; every delay (turn clocks, reveal pacing, showdown pauses) is a task
//!   in its own [`schedule::Scheduler`] that the owner fires when due.
//! - [`table`]: the people. A [`table::TableSession`] adds connections,
//!   reconnection grace windows, spectators, and automatic hand starts, and
//!   a [`table::TableActor`] runs it in a Tokio task behind a message inbox.
//!
//! ## Example
//!
//! ```
//! use holdem_table::{HandEngine, GameSettings, entities::{Action, Phase}};
//!
//! let mut engine = HandEngine::new(GameSettings::default());
//! engine.seat("a".into(), "alice".into()).unwrap();
//! engine.seat("b".into(), "bob".into()).unwrap();
//! engine.start_hand().unwrap();
//! assert_eq!(engine.phase(), Phase::PreFlop);
//!
//! // Heads-up, the dealer posts the small blind and acts first.
//! let first = engine.players()[0].id.clone();
//! engine.apply_action(&first, Action::Fold).unwrap();
//! assert_eq!(engine.players()[1].chips, 401);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    GameEvent, GameSettings, HandEngine, HandTimings, LAST_STANDING, SeatOutcome, UserError,
    constants::{self, MAX_PLAYERS},
    entities, functional, pots,
};

/// Cancellable delayed tasks.
pub mod schedule;

/// Seats, connections, and the async table actor.
pub mod table;
pub use table::{TableActor, TableConfig, TableHandle, TableSession};
