//! Session Registry
//!
//! Owns the active sessions of a peer and routes `session/update`
//! notifications to per-session subscribers in transport-receive order.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use crate::dispatcher::CloseListener;
use crate::protocol::{AcpError, AcpResult, SessionId, SessionNotification, SessionUpdate};
use crate::session::session::Session;

/// Registry of active sessions with per-session update fan-out
///
/// Updates are published from the dispatcher's inline notification path, so
/// subscriber delivery order equals transport-receive order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    subscribers: DashMap<SessionId, Vec<mpsc::UnboundedSender<SessionNotification>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session
    pub fn insert(&self, session: Arc<Session>) {
        debug!(session_id = %session.id(), "session registered");
        self.sessions.insert(session.id().clone(), session);
    }

    /// Look up a session by id
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up a session, failing with `SessionNotFound`
    pub fn require(&self, id: &SessionId) -> AcpResult<Arc<Session>> {
        self.get(id).ok_or_else(|| AcpError::session_not_found(id))
    }

    /// Look up an *active* session, failing with `SessionNotFound` or
    /// `InvalidSessionState`
    pub fn require_active(&self, id: &SessionId) -> AcpResult<Arc<Session>> {
        let session = self.require(id)?;
        session.ensure_active()?;
        Ok(session)
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Subscribe to a session's update stream
    ///
    /// Updates arrive in the order the transport received them.
    pub fn subscribe(&self, id: &SessionId) -> mpsc::UnboundedReceiver<SessionNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(id.clone()).or_default().push(tx);
        rx
    }

    /// Route one update to the session's subscribers
    ///
    /// Mode, config, and command updates are also applied to the local
    /// session state so both peers agree on the current tables. Unknown
    /// sessions drop the update with a trace log.
    pub async fn publish(&self, notification: SessionNotification) {
        let session_id = notification.session_id.clone();

        if let Some(session) = self.get(&session_id) {
            match &notification.update {
                SessionUpdate::CurrentModeUpdate(update) => {
                    // Remote already validated; apply unconditionally
                    let _ = session.set_mode(&update.current_mode_id).await;
                }
                SessionUpdate::ConfigOptionUpdate(update) => {
                    let _ = session
                        .set_config_option(&update.option_id, update.value.clone())
                        .await;
                }
                SessionUpdate::AvailableCommands(update) => {
                    session
                        .set_available_commands(update.available_commands.clone())
                        .await;
                }
                _ => {}
            }
        } else {
            trace!(%session_id, "update for unknown session");
        }

        if let Some(mut senders) = self.subscribers.get_mut(&session_id) {
            senders.retain(|sender| sender.send(notification.clone()).is_ok());
        }
    }

    /// Set the sticky cancelled flag on a session
    pub fn cancel(&self, id: &SessionId) -> AcpResult<()> {
        let session = self.require(id)?;
        session.cancel();
        Ok(())
    }

    /// Deactivate every session (transport closed or peer shutting down)
    pub fn deactivate_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().deactivate();
        }
        self.subscribers.clear();
    }
}

#[async_trait]
impl CloseListener for SessionRegistry {
    async fn on_transport_close(&self) {
        debug!("transport closed, deactivating all sessions");
        self.deactivate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ContentBlock, MessageChunk};
    use std::path::PathBuf;

    fn chunk_update(session_id: &SessionId, index: u64, text: &str) -> SessionNotification {
        SessionNotification::now(
            session_id.clone(),
            SessionUpdate::AgentMessageChunk(MessageChunk {
                content: ContentBlock::text(text),
                index,
                is_final: false,
            }),
        )
    }

    #[tokio::test]
    async fn test_require_unknown_session() {
        let registry = SessionRegistry::new();
        let err = registry.require(&SessionId::new("nope")).unwrap_err();
        assert_eq!(err.code, crate::protocol::codes::SESSION_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_updates_delivered_in_publish_order() {
        let registry = SessionRegistry::new();
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        let id = session.id().clone();
        registry.insert(session);

        let mut rx = registry.subscribe(&id);

        for i in 0..20 {
            registry.publish(chunk_update(&id, i, &format!("c{i}"))).await;
        }

        for i in 0..20 {
            let notification = rx.recv().await.unwrap();
            match notification.update {
                SessionUpdate::AgentMessageChunk(chunk) => assert_eq!(chunk.index, i),
                other => panic!("unexpected update {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_publish_applies_state_updates() {
        let registry = SessionRegistry::new();
        let session = Session::with_attributes(
            SessionId::new("s1"),
            PathBuf::from("/p"),
            Vec::new(),
            vec![crate::protocol::SessionMode {
                id: "plan".to_string(),
                label: None,
            }],
            None,
            Vec::new(),
            Vec::new(),
        );
        let id = session.id().clone();
        registry.insert(Arc::clone(&session));

        registry
            .publish(SessionNotification::now(
                id.clone(),
                SessionUpdate::CurrentModeUpdate(crate::protocol::CurrentModeUpdate {
                    current_mode_id: "plan".to_string(),
                }),
            ))
            .await;

        assert_eq!(session.current_mode_id().await.as_deref(), Some("plan"));
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let registry = SessionRegistry::new();
        let s1 = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        let s2 = Session::new(SessionId::new("s2"), PathBuf::from("/q"));
        registry.insert(Arc::clone(&s1));
        registry.insert(Arc::clone(&s2));

        registry.deactivate_all();

        assert!(!s1.is_active());
        assert!(!s2.is_active());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let registry = SessionRegistry::new();
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        let id = session.id().clone();
        registry.insert(session);

        let rx = registry.subscribe(&id);
        drop(rx);
        let mut live = registry.subscribe(&id);

        registry.publish(chunk_update(&id, 0, "x")).await;
        assert!(live.recv().await.is_some());
    }
}
