use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Permission;
use crate::models::{ActivityEntry, Collaborator, Note, User};

// -- JWT Claims --

/// JWT claims shared across quill-api (REST middleware) and quill-gateway
/// (WebSocket authentication). Canonical definition lives here in quill-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Notes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: String,
}

/// Partial update: omitted fields retain their prior values.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<Note>,
}

#[derive(Debug, Serialize)]
pub struct NoteDetailResponse {
    #[serde(flatten)]
    pub note: Note,
    pub collaborators: Vec<Collaborator>,
}

#[derive(Debug, Serialize)]
pub struct PinResponse {
    pub is_pinned: bool,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share_token: String,
}

/// Read-only payload served to anyone holding the share token. Exposes no
/// collaborator list and no edit affordance.
#[derive(Debug, Serialize)]
pub struct SharedNoteResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub owner_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

// -- Collaborators --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCollaboratorRequest {
    pub email: String,
    pub permission: Permission,
}

#[derive(Debug, Serialize)]
pub struct AddCollaboratorResponse {
    pub collaborator: Collaborator,
}

// -- Activity --

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub activities: Vec<ActivityEntry>,
}
