//! Table configuration models.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

use crate::game::{
    DEFAULT_BIG_BLIND, DEFAULT_SMALL_BLIND, DEFAULT_STARTING_STACK, GameSettings, HandTimings,
    constants::MAX_PLAYERS, entities::Chips,
};

/// Configuration error types
#[derive(Debug, Eq, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: &str) -> Self {
        Self::Invalid {
            var: var.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Every pause at the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTimings {
    /// Time a player has to act before being checked or folded
    pub action_timeout: Duration,

    /// Delay before the first card of a street is turned
    pub reveal_lead_in: Duration,

    /// Delay between board cards
    pub reveal_interval: Duration,

    /// Delay after the last card of a street before betting opens
    pub reveal_settle: Duration,

    /// Delay between streets when the board is run out
    pub runout_pause: Duration,

    /// Delay between revealing hands and paying the pots
    pub showdown_settle: Duration,

    /// Delay between paying the pots and the next hand
    pub showdown_display: Duration,

    /// Delay after an uncontested pot before the next hand
    pub uncontested_display: Duration,

    /// How long a disconnected player keeps their seat
    pub reconnect_grace: Duration,

    /// Delay before a hand starts once enough players are present
    pub auto_start_delay: Duration,
}

impl Default for TableTimings {
    fn default() -> Self {
        let hand = HandTimings::default();
        Self {
            action_timeout: hand.action_timeout,
            reveal_lead_in: hand.reveal_lead_in,
            reveal_interval: hand.reveal_interval,
            reveal_settle: hand.reveal_settle,
            runout_pause: hand.runout_pause,
            showdown_settle: hand.showdown_settle,
            showdown_display: hand.showdown_display,
            uncontested_display: hand.uncontested_display,
            reconnect_grace: Duration::from_secs(30),
            auto_start_delay: Duration::from_secs(3),
        }
    }
}

impl TableTimings {
    /// The subset of pauses the hand engine schedules itself.
    #[must_use]
    pub fn hand_timings(&self) -> HandTimings {
        HandTimings {
            action_timeout: self.action_timeout,
            reveal_lead_in: self.reveal_lead_in,
            reveal_interval: self.reveal_interval,
            reveal_settle: self.reveal_settle,
            runout_pause: self.runout_pause,
            showdown_settle: self.showdown_settle,
            showdown_display: self.showdown_display,
            uncontested_display: self.uncontested_display,
        }
    }
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    /// Capacity: seated players plus queued and busted entrants (default: 10)
    pub max_players: usize,

    /// Small blind amount
    pub small_blind: Chips,

    /// Big blind amount
    pub big_blind: Chips,

    /// Stack given on joining and on rebuy
    pub starting_stack: Chips,

    /// Pauses and timeouts
    pub timings: TableTimings,

    /// Shuffle seed, for reproducible tables
    pub seed: Option<u64>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Main Table".to_string(),
            max_players: MAX_PLAYERS,
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            starting_stack: DEFAULT_STARTING_STACK,
            timings: TableTimings::default(),
            seed: None,
        }
    }
}

impl TableConfig {
    /// Load configuration from `HOLDEM_*` environment variables, falling
    /// back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TableConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            Duration::from_secs(parse_or(&lookup, key, default.as_secs()))
        };
        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(&lookup, key, default.as_millis() as u64))
        };

        let d = &defaults.timings;
        let timings = TableTimings {
            action_timeout: secs("HOLDEM_ACTION_TIMEOUT_SECS", d.action_timeout),
            reveal_lead_in: millis("HOLDEM_REVEAL_LEAD_IN_MS", d.reveal_lead_in),
            reveal_interval: millis("HOLDEM_REVEAL_INTERVAL_MS", d.reveal_interval),
            reveal_settle: millis("HOLDEM_REVEAL_SETTLE_MS", d.reveal_settle),
            runout_pause: millis("HOLDEM_RUNOUT_PAUSE_MS", d.runout_pause),
            showdown_settle: millis("HOLDEM_SHOWDOWN_SETTLE_MS", d.showdown_settle),
            showdown_display: millis("HOLDEM_SHOWDOWN_DISPLAY_MS", d.showdown_display),
            uncontested_display: millis("HOLDEM_UNCONTESTED_DISPLAY_MS", d.uncontested_display),
            reconnect_grace: secs("HOLDEM_RECONNECT_GRACE_SECS", d.reconnect_grace),
            auto_start_delay: millis("HOLDEM_AUTO_START_DELAY_MS", d.auto_start_delay),
        };

        let config = Self {
            name: lookup("HOLDEM_TABLE_NAME").unwrap_or(defaults.name.clone()),
            max_players: parse_or(&lookup, "HOLDEM_MAX_PLAYERS", defaults.max_players),
            small_blind: parse_or(&lookup, "HOLDEM_SMALL_BLIND", defaults.small_blind),
            big_blind: parse_or(&lookup, "HOLDEM_BIG_BLIND", defaults.big_blind),
            starting_stack: parse_or(&lookup, "HOLDEM_STARTING_STACK", defaults.starting_stack),
            timings,
            seed: lookup("HOLDEM_SEED").and_then(|v| v.parse().ok()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        if self.max_players < 2 || self.max_players > MAX_PLAYERS {
            return Err(ConfigError::invalid(
                "max_players",
                &format!("must be between 2 and {MAX_PLAYERS}"),
            ));
        }
        if self.small_blind == 0 {
            return Err(ConfigError::invalid("small_blind", "must be positive"));
        }
        if self.big_blind < self.small_blind {
            return Err(ConfigError::invalid(
                "big_blind",
                "must be at least the small blind",
            ));
        }
        if self.starting_stack < self.big_blind {
            return Err(ConfigError::invalid(
                "starting_stack",
                "must cover the big blind",
            ));
        }
        if self.timings.action_timeout.is_zero() {
            return Err(ConfigError::invalid("action_timeout", "must be positive"));
        }
        Ok(())
    }

    /// Settings for the table's hand engine.
    #[must_use]
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            starting_stack: self.starting_stack,
            max_players: self.max_players,
            timings: self.timings.hand_timings(),
            seed: self.seed,
        }
    }
}

/// Helper to parse a variable with default fallback
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
