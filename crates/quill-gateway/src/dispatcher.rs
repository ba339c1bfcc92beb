use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use quill_types::events::{OnlineStatus, SessionEvent};

use crate::presence::{Participant, PresenceRegistry};

/// Verified (user id, display name) pair attached to a connection at
/// upgrade time. Absent on anonymous connections.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub name: String,
}

/// Manages all connected clients, owns the presence registry, and fans
/// session events out to participants.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// All live connections: conn_id -> (identity, sender)
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,

    /// Note session membership. Mutated only through join/leave/disconnect.
    presence: RwLock<PresenceRegistry>,
}

struct ConnectionEntry {
    identity: Option<Identity>,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                presence: RwLock::new(PresenceRegistry::new()),
            }),
        }
    }

    /// Register a connection. Returns its id and the receiver the socket
    /// task drains.
    pub async fn register(
        &self,
        identity: Option<Identity>,
    ) -> (Uuid, mpsc::UnboundedReceiver<SessionEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .insert(conn_id, ConnectionEntry { identity, tx });
        (conn_id, rx)
    }

    /// Send a targeted event to one connection. A closed receiver is the
    /// recipient's problem, never the sender's.
    pub async fn send_to_conn(&self, conn_id: Uuid, event: SessionEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    /// Join a note's session: the joiner receives the current participant
    /// list, everyone else already there receives ParticipantJoined.
    pub async fn join_note(&self, note_id: Uuid, conn_id: Uuid, identity: &Identity) {
        let participants = {
            let mut presence = self.inner.presence.write().await;
            presence.join(
                note_id,
                Participant {
                    user_id: identity.user_id,
                    name: identity.name.clone(),
                    conn_id,
                },
            )
        };

        let connections = self.inner.connections.read().await;
        for p in &participants {
            if p.conn_id == conn_id {
                continue;
            }
            if let Some(entry) = connections.get(&p.conn_id) {
                let _ = entry.tx.send(SessionEvent::ParticipantJoined {
                    user_id: identity.user_id,
                    name: identity.name.clone(),
                });
            }
        }

        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.tx.send(SessionEvent::ParticipantList {
                participants: participants.iter().map(Participant::info).collect(),
            });
        }
    }

    /// Leave a note's session and tell the remaining participants.
    pub async fn leave_note(&self, note_id: Uuid, conn_id: Uuid) {
        let removed = {
            let mut presence = self.inner.presence.write().await;
            presence.leave(note_id, conn_id)
        };

        if let Some(participant) = removed {
            self.broadcast_to_note(
                note_id,
                conn_id,
                SessionEvent::ParticipantLeft {
                    user_id: participant.user_id,
                },
            )
            .await;
        }
    }

    /// Fan an event out to every participant of a note except `exclude`.
    pub async fn broadcast_to_note(&self, note_id: Uuid, exclude: Uuid, event: SessionEvent) {
        let participants = {
            let presence = self.inner.presence.read().await;
            presence.participants(note_id)
        };

        let connections = self.inner.connections.read().await;
        for p in participants {
            if p.conn_id == exclude {
                continue;
            }
            if let Some(entry) = connections.get(&p.conn_id) {
                let _ = entry.tx.send(event.clone());
            }
        }
    }

    /// Fan an event out to every live connection except `exclude`.
    pub async fn broadcast_global(&self, exclude: Uuid, event: SessionEvent) {
        let connections = self.inner.connections.read().await;
        for (&conn_id, entry) in connections.iter() {
            if conn_id == exclude {
                continue;
            }
            let _ = entry.tx.send(event.clone());
        }
    }

    /// Announce an authenticated connection as online to everyone else.
    pub async fn announce_online(&self, conn_id: Uuid, identity: &Identity) {
        self.broadcast_global(
            conn_id,
            SessionEvent::PresenceStatus {
                user_id: identity.user_id,
                name: identity.name.clone(),
                status: OnlineStatus::Online,
            },
        )
        .await;
    }

    /// Severed connection: sweep it from every note it joined, notify each
    /// affected room, drop the connection entry, and announce offline for
    /// authenticated identities. Idempotent: a second call finds nothing.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let removed = {
            let mut presence = self.inner.presence.write().await;
            presence.disconnect_all(conn_id)
        };

        for (note_id, participant) in removed {
            self.broadcast_to_note(
                note_id,
                conn_id,
                SessionEvent::ParticipantLeft {
                    user_id: participant.user_id,
                },
            )
            .await;
        }

        let entry = self.inner.connections.write().await.remove(&conn_id);

        if let Some(ConnectionEntry {
            identity: Some(identity),
            ..
        }) = entry
        {
            self.broadcast_global(
                conn_id,
                SessionEvent::PresenceStatus {
                    user_id: identity.user_id,
                    name: identity.name,
                    status: OnlineStatus::Offline,
                },
            )
            .await;
        }
    }

    /// Whether any participant is currently attached to the note.
    pub async fn note_has_participants(&self, note_id: Uuid) -> bool {
        self.inner.presence.read().await.contains(note_id)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
