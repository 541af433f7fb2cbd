//! Table actor implementation with async message handling.

use super::{
    config::TableConfig,
    messages::{TableMessage, TableResponse, TableUpdate},
    session::TableSession,
};
use crate::game::entities::{Action, ActionChoices, PlayerId, TableSnapshot, Username};
use std::collections::HashMap;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};

/// Capacity of a table's inbox.
const INBOX_SIZE: usize = 100;

/// Table actor handle for sending messages
#[derive(Clone, Debug)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
}

impl TableHandle {
    /// Create a new table handle
    pub fn new(sender: mpsc::Sender<TableMessage>) -> Self {
        Self { sender }
    }

    /// Send a message to the table
    pub async fn send(&self, message: TableMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .await
            .map_err(|_| "Table is closed".to_string())
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> TableMessage,
    ) -> Result<T, String> {
        let (response, rx) = oneshot::channel();
        self.send(message(response)).await?;
        rx.await.map_err(|_| "Table is closed".to_string())
    }

    pub async fn join(&self, id: PlayerId, name: Username) -> Result<TableResponse, String> {
        self.request(|response| TableMessage::Join { id, name, response })
            .await
    }

    pub async fn leave(&self, id: PlayerId) -> Result<TableResponse, String> {
        self.request(|response| TableMessage::Leave { id, response })
            .await
    }

    pub async fn act(&self, id: PlayerId, action: Action) -> Result<TableResponse, String> {
        self.request(|response| TableMessage::TakeAction {
            id,
            action,
            response,
        })
        .await
    }

    pub async fn rebuy(&self, id: PlayerId) -> Result<TableResponse, String> {
        self.request(|response| TableMessage::Rebuy { id, response })
            .await
    }

    pub async fn snapshot(&self, id: PlayerId) -> Result<TableSnapshot, String> {
        self.request(|response| TableMessage::GetSnapshot { id, response })
            .await
    }

    pub async fn actions(&self, id: PlayerId) -> Result<ActionChoices, String> {
        self.request(|response| TableMessage::GetActions { id, response })
            .await
    }

    /// Register for updates. The returned receiver gets one [`TableUpdate`]
    /// per batch of changes.
    pub async fn subscribe(
        &self,
        id: PlayerId,
        capacity: usize,
    ) -> Result<mpsc::Receiver<TableUpdate>, String> {
        let (sender, rx) = mpsc::channel(capacity);
        self.send(TableMessage::Subscribe { id, sender }).await?;
        Ok(rx)
    }

    pub async fn close(&self) -> Result<TableResponse, String> {
        self.request(|response| TableMessage::Close { response })
            .await
    }
}

/// Owns one table and serializes everything that happens to it: client
/// requests from the inbox and the session's own timers.
pub struct TableActor {
    /// Table configuration
    config: TableConfig,

    /// Seats, hands, and timers
    session: TableSession,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Is table closed
    is_closed: bool,

    /// Viewers receiving an update after every change
    subscribers: HashMap<PlayerId, mpsc::Sender<TableUpdate>>,
}

impl TableActor {
    /// Create a new table actor and the handle used to talk to it.
    pub fn new(config: TableConfig) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_SIZE);
        let session = TableSession::new(config.clone());
        let actor = Self {
            config,
            session,
            inbox,
            is_closed: false,
            subscribers: HashMap::new(),
        };
        (actor, TableHandle::new(sender))
    }

    /// Run the table actor event loop until it's closed or every handle
    /// is dropped.
    pub async fn run(mut self) {
        log::info!("Table '{}' starting", self.config.name);

        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },

                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let fired = self.session.fire_due(Instant::now());
                    log::trace!("Table '{}': {fired} timers fired", self.config.name);
                }
            }

            self.notify_state_change();
            if self.is_closed {
                break;
            }
        }

        log::info!("Table '{}' closed", self.config.name);
    }

    /// Handle a table message
    fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::Join { id, name, response } => {
                let result = match self.session.join(id, name) {
                    Ok(outcome) => TableResponse::Joined(outcome),
                    Err(err) => TableResponse::Error(err),
                };
                self.reply(response, result);
            }

            TableMessage::Leave { id, response } => {
                self.subscribers.remove(&id);
                let result = self.session.leave(&id).into();
                self.reply(response, result);
            }

            TableMessage::TakeAction {
                id,
                action,
                response,
            } => {
                let result = self.session.act(&id, action).into();
                self.reply(response, result);
            }

            TableMessage::Rebuy { id, response } => {
                let result = match self.session.rebuy(&id) {
                    Ok(outcome) => TableResponse::Rebought(outcome),
                    Err(err) => TableResponse::Error(err),
                };
                self.reply(response, result);
            }

            TableMessage::GetSnapshot { id, response } => {
                let _ = response.send(self.session.snapshot_for(&id));
            }

            TableMessage::GetActions { id, response } => {
                let _ = response.send(self.session.engine().available_actions(&id));
            }

            TableMessage::Subscribe { id, sender } => {
                log::debug!("{id} subscribed to table '{}'", self.config.name);
                self.subscribers.insert(id, sender);
            }

            TableMessage::Unsubscribe { id } => {
                log::debug!("{id} unsubscribed from table '{}'", self.config.name);
                self.subscribers.remove(&id);
            }

            TableMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(TableResponse::Success);
            }
        }
    }

    fn reply(&self, response: oneshot::Sender<TableResponse>, result: TableResponse) {
        if let TableResponse::Error(err) = &result {
            log::debug!("Table '{}': request rejected: {err}", self.config.name);
        }
        let _ = response.send(result);
    }

    /// Push what changed to every subscriber, each with their own view of
    /// the table.
    fn notify_state_change(&mut self) {
        let events: Vec<_> = self.session.drain_events().into();
        if events.is_empty() {
            return;
        }
        for event in &events {
            log::debug!("Table '{}': {event}", self.config.name);
        }

        let session = &self.session;
        self.subscribers.retain(|id, sender| {
            let update = TableUpdate {
                events: events.clone(),
                snapshot: session.snapshot_for(id),
            };
            match sender.try_send(update) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {id} channel full, dropping update");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {id} disconnected, removing");
                    false
                }
            }
        });
    }
}
