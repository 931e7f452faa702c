//! LISTEN/NOTIFY subscriptions on a dedicated connection.
//!
//! A [`Listener`] starts idle. The first [`Listener::listen`] opens a private
//! single-connection pool from the shared pool's connect options and attaches
//! a `PgListener` to it, so the subscribed connection is never handed to
//! other callers. [`Listener::close`] unsubscribes and closes that private
//! pool, which closes the physical connection.
//!
//! All operations take the same lock: a pending
//! [`Listener::wait_for_notification`] blocks `listen`, `unlisten` and `close`
//! until a notification arrives or the wait is cancelled.

use crate::error::{DalError, DalResult};
use crate::models::Notification;
use sqlx::PgPool;
use sqlx::postgres::{PgListener, PgPoolOptions};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Subscription object owning at most one dedicated connection.
pub struct Listener {
    pool: PgPool,
    state: Mutex<ListenerState>,
}

#[derive(Default)]
struct ListenerState {
    session: Option<Session>,
    topics: Vec<String>,
}

struct Session {
    listener: PgListener,
    /// Private pool holding the listener's only connection
    pool: PgPool,
}

impl Session {
    async fn open(shared: &PgPool) -> DalResult<Self> {
        let options = shared.connect_options();
        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with((*options).clone())
            .await?;
        match PgListener::connect_with(&pool).await {
            Ok(listener) => Ok(Self { listener, pool }),
            Err(e) => {
                pool.close().await;
                Err(e.into())
            }
        }
    }
}

impl Listener {
    /// Create an idle listener. No connection is taken until `listen`.
    pub fn new(pool: &PgPool) -> Self {
        Self {
            pool: pool.clone(),
            state: Mutex::new(ListenerState::default()),
        }
    }

    /// Subscribe to `topic`, acquiring the dedicated connection if needed.
    pub async fn listen(&self, topic: &str) -> DalResult<()> {
        if topic.is_empty() {
            return Err(DalError::bad_parameter("topic must not be empty"));
        }
        let mut state = self.state.lock().await;

        if state.session.is_none() {
            state.session = Some(Session::open(&self.pool).await?);
            info!("Listener connection acquired");
        }
        let Some(session) = state.session.as_mut() else {
            return Err(DalError::NotListening);
        };

        session.listener.listen(topic).await?;
        if !state.topics.iter().any(|t| t == topic) {
            state.topics.push(topic.to_string());
        }
        debug!(topic = %topic, "Listening");
        Ok(())
    }

    /// Unsubscribe from `topic`. Fails when no connection is held.
    pub async fn unlisten(&self, topic: &str) -> DalResult<()> {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().ok_or(DalError::NotListening)?;

        session.listener.unlisten(topic).await?;
        state.topics.retain(|t| t != topic);
        debug!(topic = %topic, "Stopped listening");
        Ok(())
    }

    /// Wait for the next notification on any subscribed topic.
    ///
    /// Dropping the returned future cancels the wait.
    pub async fn wait_for_notification(&self) -> DalResult<Notification> {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().ok_or(DalError::NotListening)?;

        let notification = session.listener.recv().await?;
        Ok(notification.into())
    }

    /// Wait for the next notification unless `cancel` completes first, in
    /// which case [`DalError::Cancelled`] is returned.
    pub async fn wait_for_notification_until<C>(&self, cancel: C) -> DalResult<Notification>
    where
        C: Future<Output = ()>,
    {
        let mut state = self.state.lock().await;
        let session = state.session.as_mut().ok_or(DalError::NotListening)?;

        tokio::select! {
            received = session.listener.recv() => Ok(received?.into()),
            () = cancel => Err(DalError::cancelled("wait for notification")),
        }
    }

    /// Unsubscribe everything and close the dedicated connection.
    ///
    /// The connection is closed even when unsubscribing fails; that error is
    /// returned afterwards. Closing an idle listener is a no-op.
    pub async fn close(&self) -> DalResult<()> {
        let mut state = self.state.lock().await;
        state.topics.clear();
        let Some(mut session) = state.session.take() else {
            return Ok(());
        };

        let unlisten = session.listener.unlisten_all().await;
        if let Err(e) = &unlisten {
            warn!(error = %e, "UNLISTEN * failed, closing connection anyway");
        }
        drop(session.listener);
        session.pool.close().await;
        info!("Listener connection closed");

        unlisten.map_err(DalError::from)
    }

    /// Topics currently subscribed, in subscription order.
    pub async fn topics(&self) -> Vec<String> {
        self.state.lock().await.topics.clone()
    }

    /// True while the dedicated connection is held.
    pub async fn is_listening(&self) -> bool {
        self.state.lock().await.session.is_some()
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if self.state.get_mut().session.is_some() {
            warn!("Listener dropped without close; connection is released by the driver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_listener() -> Listener {
        let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();
        Listener::new(&pool)
    }

    #[tokio::test]
    async fn test_unlisten_without_listen_fails() {
        let listener = idle_listener();
        let err = listener.unlisten("topic").await.unwrap_err();
        assert!(matches!(err, DalError::NotListening));
    }

    #[tokio::test]
    async fn test_wait_without_listen_fails() {
        let listener = idle_listener();
        let err = listener.wait_for_notification().await.unwrap_err();
        assert!(matches!(err, DalError::NotListening));
    }

    #[tokio::test]
    async fn test_close_idle_is_noop() {
        let listener = idle_listener();
        listener.close().await.unwrap();
        listener.close().await.unwrap();
        assert!(!listener.is_listening().await);
        assert!(listener.topics().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_topic_rejected() {
        let listener = idle_listener();
        let err = listener.listen("").await.unwrap_err();
        assert!(matches!(err, DalError::BadParameter { .. }));
        assert!(!listener.is_listening().await);
    }
}
