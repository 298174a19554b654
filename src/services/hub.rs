use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::services::notifications::{NotificationSink, ReminderPayload};

/// Registry of live WebSocket sessions and the fan-out path to them.
///
/// Sessions are handed an unbounded channel so a slow socket never blocks the
/// publish step; the forwarding task in `routes::ws` drains the channel into
/// the socket at its own pace. A send failure means the receiving task is gone
/// and the session is pruned.
pub struct SessionHub {
    sessions: RwLock<HashMap<Uuid, mpsc::UnboundedSender<String>>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session and return its id plus the receiving end the
    /// connection task should drain.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.write().await.insert(id, tx);
        tracing::info!("Client session {} connected", id);
        (id, rx)
    }

    pub async fn unregister(&self, id: Uuid) {
        if self.sessions.write().await.remove(&id).is_some() {
            tracing::info!("Client session {} disconnected", id);
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for SessionHub {
    /// Best-effort fan-out: one dead session must not affect delivery to the
    /// others, so failures are collected and pruned after the pass.
    async fn publish(&self, payload: &ReminderPayload) {
        let message = match serde_json::to_string(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Failed to serialize reminder payload: {:?}", e);
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, tx) in sessions.iter() {
                if tx.send(message.clone()).is_err() {
                    tracing::warn!("Dropping dead session {}", id);
                    dead.push(*id);
                }
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in dead {
                sessions.remove(&id);
            }
        }
    }
}
