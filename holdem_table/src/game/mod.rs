//! Hold'em game engine.
//!
//! This module provides the rules of the game, independent of any transport:
//! - Cards, the deck, players, and the views handed to clients
//! - Hand evaluation and comparison
//! - Side pots and settlement
//! - The hand state machine, with its timers and events

pub mod constants;
pub mod entities;
pub mod functional;
pub mod pots;
pub mod state_machine;

pub use state_machine::{
    DEFAULT_BIG_BLIND, DEFAULT_SMALL_BLIND, DEFAULT_STARTING_STACK, EngineError, GameEvent,
    GameSettings, HandEngine, HandTimings, LAST_STANDING, SeatOutcome, UserError,
};
