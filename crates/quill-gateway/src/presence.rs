use std::collections::HashMap;

use uuid::Uuid;

use quill_types::events::ParticipantInfo;

/// One connection's membership in a note's session.
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: String,
    pub conn_id: Uuid,
}

impl Participant {
    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            user_id: self.user_id,
            name: self.name.clone(),
        }
    }
}

/// In-memory map of note id -> connected participants, keyed by connection
/// id. Process-lifetime only: a restart starts empty, nothing is restored
/// from storage. Owned exclusively by the Dispatcher; nothing else reads
/// or writes it.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    rooms: HashMap<Uuid, HashMap<Uuid, Participant>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant to a note's set. Re-joining with the same
    /// connection replaces the entry rather than duplicating it. Returns
    /// the full current set, joiner included.
    pub fn join(&mut self, note_id: Uuid, participant: Participant) -> Vec<Participant> {
        let room = self.rooms.entry(note_id).or_default();
        room.insert(participant.conn_id, participant);
        room.values().cloned().collect()
    }

    /// Remove a connection from a note. Empty sets are dropped rather than
    /// kept as placeholders.
    pub fn leave(&mut self, note_id: Uuid, conn_id: Uuid) -> Option<Participant> {
        let room = self.rooms.get_mut(&note_id)?;
        let removed = room.remove(&conn_id);
        if room.is_empty() {
            self.rooms.remove(&note_id);
        }
        removed
    }

    /// Remove a connection from every note it joined. Safe to call for a
    /// connection that never joined anything.
    pub fn disconnect_all(&mut self, conn_id: Uuid) -> Vec<(Uuid, Participant)> {
        let mut removed = Vec::new();
        self.rooms.retain(|&note_id, room| {
            if let Some(participant) = room.remove(&conn_id) {
                removed.push((note_id, participant));
            }
            !room.is_empty()
        });
        removed
    }

    /// Current participants of a note, if any.
    pub fn participants(&self, note_id: Uuid) -> Vec<Participant> {
        self.rooms
            .get(&note_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, note_id: Uuid) -> bool {
        self.rooms.contains_key(&note_id)
    }
}
