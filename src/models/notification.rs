//! Notifications delivered to a [`Listener`](crate::db::Listener).

use serde::Serialize;
use sqlx::postgres::PgNotification;

/// A single NOTIFY message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Channel the message was published on
    pub channel: String,
    /// Payload text, empty when NOTIFY was sent without one
    pub payload: String,
    /// Backend pid of the notifying session
    pub process_id: u32,
}

impl Notification {
    /// Raw payload bytes.
    pub fn payload_bytes(&self) -> &[u8] {
        self.payload.as_bytes()
    }
}

impl From<PgNotification> for Notification {
    fn from(n: PgNotification) -> Self {
        Self {
            channel: n.channel().to_string(),
            payload: n.payload().to_string(),
            process_id: n.process_id(),
        }
    }
}
