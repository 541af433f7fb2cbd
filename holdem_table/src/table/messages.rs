//! Table actor message types.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use super::session::JoinOutcome;
use crate::game::{
    GameEvent, SeatOutcome, UserError,
    entities::{Action, ActionChoices, PlayerId, TableSnapshot, Username},
};

/// Messages that can be sent to a TableActor
#[derive(Debug)]
pub enum TableMessage {
    /// Take a seat, queue for the next hand, or watch if the table is full.
    /// Joining under the name of a held seat reclaims it.
    Join {
        id: PlayerId,
        name: Username,
        response: oneshot::Sender<TableResponse>,
    },

    /// Connection dropped or the participant walked away
    Leave {
        id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// Player action (fold, check, call, raise, all-in)
    TakeAction {
        id: PlayerId,
        action: Action,
        response: oneshot::Sender<TableResponse>,
    },

    /// Buy back in after busting
    Rebuy {
        id: PlayerId,
        response: oneshot::Sender<TableResponse>,
    },

    /// The table as `id` is allowed to see it
    GetSnapshot {
        id: PlayerId,
        response: oneshot::Sender<TableSnapshot>,
    },

    /// Options offered to `id` right now
    GetActions {
        id: PlayerId,
        response: oneshot::Sender<ActionChoices>,
    },

    /// Receive a [`TableUpdate`] after every change
    Subscribe {
        id: PlayerId,
        sender: mpsc::Sender<TableUpdate>,
    },

    Unsubscribe { id: PlayerId },

    /// Stop the actor
    Close {
        response: oneshot::Sender<TableResponse>,
    },
}

/// Pushed to each subscriber whenever the table changes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TableUpdate {
    /// What happened since the previous update
    pub events: Vec<GameEvent>,
    /// The table afterwards, from the subscriber's seat
    pub snapshot: TableSnapshot,
}

/// Response from table operations
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TableResponse {
    /// Operation succeeded
    Success,

    Joined(JoinOutcome),

    Rebought(SeatOutcome),

    /// Operation was rejected
    Error(UserError),
}

impl TableResponse {
    /// Check if response is success
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, TableResponse::Error(_))
    }

    /// Get error message if response is error
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match self {
            TableResponse::Error(err) => Some(err.to_string()),
            _ => None,
        }
    }
}

impl From<Result<(), UserError>> for TableResponse {
    fn from(result: Result<(), UserError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => Self::Error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        assert!(TableResponse::Success.is_success());
        assert!(TableResponse::Joined(JoinOutcome::Spectating).is_success());
        assert_eq!(TableResponse::Success.error_message(), None);

        let response = TableResponse::from(Err(UserError::OutOfTurnAction));
        assert!(!response.is_success());
        assert_eq!(response.error_message().as_deref(), Some("not your turn"));
    }

    #[test]
    fn test_update_wire_shape() {
        let engine = crate::game::HandEngine::default();
        let update = TableUpdate {
            events: vec![GameEvent::Waiting],
            snapshot: engine.snapshot_for(&PlayerId::new("watcher")),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["events"][0], "Waiting");
        assert_eq!(json["snapshot"]["phase"], "WAITING");
        assert_eq!(json["snapshot"]["viewer"], "watcher");
        assert_eq!(json["snapshot"]["is_spectator"], true);
        assert!(json["snapshot"]["action_deadline"].is_null());
    }
}
