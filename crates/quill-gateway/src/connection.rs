use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use quill_db::Database;
use quill_types::access::{self, NoteAction, NoteRole, Permission};
use quill_types::api::Claims;
use quill_types::events::{SessionCommand, SessionEvent, UpdatedBy};

use crate::dispatcher::{Dispatcher, Identity};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Decode the upgrade-time JWT into an identity. The caller decides what a
/// missing token means (anonymous connections are allowed for share-link
/// viewing); an invalid token is always a rejection.
pub fn authenticate(token: &str, jwt_secret: &str) -> Option<Identity> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(Identity {
        user_id: token_data.claims.sub,
        name: token_data.claims.name,
    })
}

/// Handle one WebSocket connection. Identity was already established at the
/// HTTP upgrade layer; `None` means anonymous.
pub async fn handle_socket(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    identity: Option<Identity>,
) {
    let (mut sender, mut receiver) = socket.split();

    match &identity {
        Some(id) => info!("{} ({}) connected to gateway", id.name, id.user_id),
        None => info!("anonymous client connected to gateway"),
    }

    let (conn_id, mut session_rx) = dispatcher.register(identity.clone()).await;

    if let Some(id) = &identity {
        let ready = SessionEvent::Ready {
            user_id: id.user_id,
            name: id.name.clone(),
        };
        if sender
            .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
            .await
            .is_err()
        {
            dispatcher.disconnect(conn_id).await;
            return;
        }

        // Everyone else learns this user is online
        dispatcher.announce_online(conn_id, id).await;
    }

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward session events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = session_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };

                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from the client, in order, one at a time
    let dispatcher_recv = dispatcher.clone();
    let identity_recv = identity.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<SessionCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(
                            &dispatcher_recv,
                            &db,
                            conn_id,
                            identity_recv.as_ref(),
                            cmd,
                        )
                        .await;
                    }
                    Err(e) => {
                        warn!(
                            "bad session command from {}: {} -- raw: {}",
                            conn_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(conn_id).await;

    match &identity {
        Some(id) => info!("{} ({}) disconnected from gateway", id.name, id.user_id),
        None => info!("anonymous client disconnected from gateway"),
    }
}

/// Process one client command. Anonymous connections may only watch: every
/// command below requires an identity and is ignored without one. Permission
/// state is re-read from the store on each command, so a grant revoked
/// after joining takes effect on the very next message.
pub async fn handle_command(
    dispatcher: &Dispatcher,
    db: &Database,
    conn_id: Uuid,
    identity: Option<&Identity>,
    cmd: SessionCommand,
) {
    let Some(identity) = identity else {
        trace!("ignoring session command from anonymous connection {}", conn_id);
        return;
    };

    match cmd {
        SessionCommand::JoinNote { note_id } => {
            match note_role(db, note_id, identity.user_id) {
                Ok(role) if access::allows(role, NoteAction::Read) => {
                    dispatcher.join_note(note_id, conn_id, identity).await;
                    info!("{} ({}) joined note {}", identity.name, identity.user_id, note_id);
                }
                Ok(_) => {
                    debug!(
                        "{} denied joining note {} (no read access)",
                        identity.user_id, note_id
                    );
                }
                Err(e) => warn!("join-note lookup failed for {}: {}", note_id, e),
            }
        }

        SessionCommand::LeaveNote { note_id } => {
            dispatcher.leave_note(note_id, conn_id).await;
            info!("{} ({}) left note {}", identity.name, identity.user_id, note_id);
        }

        SessionCommand::ContentUpdate {
            note_id,
            title,
            content,
        } => {
            match note_role(db, note_id, identity.user_id) {
                Ok(role) if access::allows(role, NoteAction::EditContent) => {
                    dispatcher
                        .broadcast_to_note(
                            note_id,
                            conn_id,
                            SessionEvent::ContentUpdated {
                                note_id,
                                title,
                                content,
                                updated_by: UpdatedBy {
                                    id: identity.user_id,
                                    name: identity.name.clone(),
                                },
                                timestamp: Utc::now(),
                            },
                        )
                        .await;
                }
                Ok(_) => {
                    // Dropped without telling the sender: the UI is not
                    // supposed to offer editing to read-only principals.
                    debug!(
                        "dropped unauthorized content update from {} on note {}",
                        identity.user_id, note_id
                    );
                }
                Err(e) => warn!("content-update lookup failed for {}: {}", note_id, e),
            }
        }

        SessionCommand::Typing { note_id, is_typing } => {
            // Carries no document state, so identity is the only requirement
            trace!("{} typing={} on note {}", identity.user_id, is_typing, note_id);
            dispatcher
                .broadcast_to_note(
                    note_id,
                    conn_id,
                    SessionEvent::ParticipantTyping {
                        user_id: identity.user_id,
                        name: identity.name.clone(),
                        is_typing,
                    },
                )
                .await;
        }
    }
}

/// The requester's current role on a note, straight from the store.
/// NoteRole::None covers both "no grant" and "note does not exist"; the
/// session layer treats them identically (silently).
fn note_role(db: &Database, note_id: Uuid, user_id: Uuid) -> anyhow::Result<NoteRole> {
    let Some(note) = db.get_note(&note_id.to_string())? else {
        return Ok(NoteRole::None);
    };

    let grant = db
        .get_collaborator_permission(&note.id, &user_id.to_string())?
        .and_then(|p| Permission::parse(&p));

    let owner_id: Uuid = note.owner_id.parse()?;
    Ok(access::role_for(owner_id, user_id, grant))
}
