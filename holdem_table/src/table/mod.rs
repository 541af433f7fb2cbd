//! One shared table, driven by an async actor.
//!
//! This module implements:
//! - TableSession: seats, reconnection grace, spectators, and auto-start
//!   around a single hand engine
//! - TableActor: owns a session in its own Tokio task, fed by an mpsc inbox
//! - Message-based communication with tokio channels
//! - Table configuration loaded from the environment
//!
//! ## Example
//!
//! ```no_run
//! use holdem_table::table::{TableActor, TableConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TableConfig::from_env().unwrap_or_default();
//!     let (actor, handle) = TableActor::new(config);
//!     tokio::spawn(actor.run());
//!
//!     let response = handle.join("conn-1".into(), "alice".into()).await;
//!     println!("{response:?}");
//! }
//! ```

pub mod actor;
pub mod config;
pub mod messages;
pub mod session;

pub use actor::{TableActor, TableHandle};
pub use config::{ConfigError, TableConfig, TableTimings};
pub use messages::{TableMessage, TableResponse, TableUpdate};
pub use session::{JoinOutcome, TableSession};
