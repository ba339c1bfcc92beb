use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A participant currently attached to a note's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub user_id: Uuid,
    pub name: String,
}

/// Identity stamped onto a broadcast edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedBy {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    Offline,
}

/// Events sent from the server over the WebSocket session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Server confirms the connection's authenticated identity
    Ready { user_id: Uuid, name: String },

    /// Current participant set, sent to a connection when it joins a note
    ParticipantList { participants: Vec<ParticipantInfo> },

    /// Another participant joined the note's session
    ParticipantJoined { user_id: Uuid, name: String },

    /// A participant left the note's session
    ParticipantLeft { user_id: Uuid },

    /// Another participant broadcast an edit. Last write wins: the server
    /// relays edits as-is and performs no merge.
    ContentUpdated {
        note_id: Uuid,
        title: String,
        content: String,
        updated_by: UpdatedBy,
        timestamp: DateTime<Utc>,
    },

    /// A participant started or stopped typing
    ParticipantTyping {
        user_id: Uuid,
        name: String,
        is_typing: bool,
    },

    /// A user came online or went offline (global, not note-scoped)
    PresenceStatus {
        user_id: Uuid,
        name: String,
        status: OnlineStatus,
    },
}

/// Commands sent FROM client TO server over the WebSocket session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionCommand {
    /// Join a note's collaborative session
    JoinNote { note_id: Uuid },

    /// Leave a note's collaborative session
    LeaveNote { note_id: Uuid },

    /// Broadcast an edit to the other participants of a note
    ContentUpdate {
        note_id: Uuid,
        title: String,
        content: String,
    },

    /// Indicate typing state in a note
    Typing { note_id: Uuid, is_typing: bool },
}
