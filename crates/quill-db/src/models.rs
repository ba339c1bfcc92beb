/// Database row types — these map directly to SQLite rows.
/// Distinct from quill-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

pub struct NoteRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub owner_id: String,
    pub is_pinned: bool,
    pub share_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A note as it appears in a user's listing, joined with the owner's name
/// and the requesting user's permission on it.
pub struct NoteListRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub owner_id: String,
    pub owner_name: String,
    pub is_pinned: bool,
    pub share_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub user_permission: String,
}

/// Read-only projection served on the share-token path. Carries no
/// owner id and no collaborator data.
pub struct SharedNoteRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub owner_name: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CollaboratorRow {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub permission: String,
}

pub struct ActivityRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub note_id: Option<String>,
    pub action: String,
    pub details: String,
    pub created_at: String,
}
