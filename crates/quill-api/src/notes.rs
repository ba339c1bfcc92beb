use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use quill_db::Database;
use quill_db::models::{ActivityRow, CollaboratorRow, NoteListRow, NoteRow};
use quill_types::access::{self, NoteAction, NoteRole, Permission};
use quill_types::api::{
    ActivityResponse, AddCollaboratorRequest, AddCollaboratorResponse, Claims, CreateNoteRequest,
    NoteDetailResponse, NoteListResponse, PinResponse, ShareResponse, SharedNoteResponse,
    UpdateNoteRequest,
};
use quill_types::models::{ActivityEntry, Collaborator, Note};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::parse_timestamp;

/// Most recent activity entries returned per note.
const ACTIVITY_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// -- Listing & search --

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || db.list_notes_for_user(&user_id))
        .await
        .map_err(anyhow::Error::from)??;

    Ok(Json(NoteListResponse {
        notes: rows.into_iter().map(note_from_list_row).collect(),
    }))
}

pub async fn search_notes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    // A blank query yields nothing, never "all notes"
    let term = query.q.trim().to_string();
    if term.is_empty() {
        return Ok(Json(NoteListResponse { notes: vec![] }));
    }

    let db = state.db.clone();
    let user_id = claims.sub.to_string();

    let rows = tokio::task::spawn_blocking(move || db.search_notes(&user_id, &term))
        .await
        .map_err(anyhow::Error::from)??;

    Ok(Json(NoteListResponse {
        notes: rows.into_iter().map(note_from_list_row).collect(),
    }))
}

// -- Share-token read path (public, identity-free) --

pub async fn get_shared_note(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let row = state
        .db
        .get_note_by_share_token(&token)?
        .ok_or_else(|| ApiError::NotFound("Note not found or link expired".into()))?;

    Ok(Json(SharedNoteResponse {
        id: parse_id(&row.id, "shared note"),
        title: row.title,
        content: row.content,
        tags: row.tags,
        owner_name: row.owner_name,
        created_at: parse_timestamp(&row.created_at, "shared note"),
        updated_at: parse_timestamp(&row.updated_at, "shared note"),
    }))
}

// -- Single note --

pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (note, role) = load_note_for(&state.db, note_id, claims.sub, NoteAction::Read)?;

    let collaborators = state
        .db
        .list_collaborators(&note.id)?
        .into_iter()
        .filter_map(collaborator_model)
        .collect();

    let note = note_model(&state.db, note, role)?;

    Ok(Json(NoteDetailResponse {
        note,
        collaborators,
    }))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::InvalidInput("Title is required".into()));
    }

    let note_id = Uuid::new_v4();
    state.db.insert_note(
        &note_id.to_string(),
        &req.title,
        &req.content,
        &req.tags,
        &claims.sub.to_string(),
    )?;

    record_activity(
        &state.db,
        claims.sub,
        Some(note_id),
        "create",
        serde_json::json!({ "title": req.title }),
    );

    let note = state
        .db
        .get_note(&note_id.to_string())?
        .ok_or_else(|| anyhow::anyhow!("note vanished after insert"))?;
    let note = note_model(&state.db, note, NoteRole::Owner)?;

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn update_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let (_, role) = load_note_for(&state.db, note_id, claims.sub, NoteAction::EditContent)?;

    state.db.update_note(
        &note_id.to_string(),
        req.title.as_deref(),
        req.content.as_deref(),
        req.tags.as_deref(),
    )?;

    let note = state
        .db
        .get_note(&note_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    record_activity(
        &state.db,
        claims.sub,
        Some(note_id),
        "update",
        serde_json::json!({ "title": note.title }),
    );

    let note = note_model(&state.db, note, role)?;
    Ok(Json(note))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (note, _) = load_note_for(&state.db, note_id, claims.sub, NoteAction::Delete)?;

    // Log before deleting so the FK can null the reference afterwards,
    // preserving the actor trail
    record_activity(
        &state.db,
        claims.sub,
        Some(note_id),
        "delete",
        serde_json::json!({ "title": note.title }),
    );

    state.db.delete_note(&note_id.to_string())?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_pin(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let (note, _) = load_note_for(&state.db, note_id, claims.sub, NoteAction::Pin)?;

    let pinned = !note.is_pinned;
    state.db.set_pinned(&note_id.to_string(), pinned)?;

    record_activity(
        &state.db,
        claims.sub,
        Some(note_id),
        "pin",
        serde_json::json!({ "pinned": pinned }),
    );

    Ok(Json(PinResponse { is_pinned: pinned }))
}

// -- Sharing --

pub async fn generate_share_link(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    load_note_for(&state.db, note_id, claims.sub, NoteAction::Share)?;

    // Create-if-absent: regenerating returns the existing token untouched
    let candidate = Uuid::new_v4().to_string();
    let token = state
        .db
        .ensure_share_token(&note_id.to_string(), &candidate)?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    if token == candidate {
        record_activity(
            &state.db,
            claims.sub,
            Some(note_id),
            "share",
            serde_json::json!({ "type": "link" }),
        );
    }

    Ok(Json(ShareResponse { share_token: token }))
}

// -- Collaborators --

pub async fn add_collaborator(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCollaboratorRequest>,
) -> ApiResult<impl IntoResponse> {
    load_note_for(&state.db, note_id, claims.sub, NoteAction::ManageCollaborators)?;

    let target = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or_else(|| ApiError::NotFound("User not found with this email".into()))?;

    if target.id == claims.sub.to_string() {
        return Err(ApiError::InvalidInput(
            "You cannot add yourself as a collaborator".into(),
        ));
    }

    state
        .db
        .upsert_collaborator(&note_id.to_string(), &target.id, req.permission.as_str())?;

    record_activity(
        &state.db,
        claims.sub,
        Some(note_id),
        "add_collaborator",
        serde_json::json!({
            "collaborator_email": req.email,
            "permission": req.permission.as_str(),
        }),
    );

    Ok(Json(AddCollaboratorResponse {
        collaborator: Collaborator {
            user_id: parse_id(&target.id, "collaborator"),
            name: target.name,
            email: target.email,
            permission: req.permission,
        },
    }))
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    Path((note_id, collaborator_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    load_note_for(&state.db, note_id, claims.sub, NoteAction::ManageCollaborators)?;

    let removed = state
        .db
        .remove_collaborator(&note_id.to_string(), &collaborator_id.to_string())?;
    if !removed {
        return Err(ApiError::NotFound("Collaborator not found".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// -- Activity --

pub async fn list_activity(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    load_note_for(&state.db, note_id, claims.sub, NoteAction::ViewActivity)?;

    let rows = state.db.list_activity(&note_id.to_string(), ACTIVITY_LIMIT)?;

    Ok(Json(ActivityResponse {
        activities: rows.into_iter().map(activity_model).collect(),
    }))
}

// -- Shared helpers --

/// Fetch a note and check the requested action in one step. Absent notes
/// are NotFound; an existing note the user may not act on is Forbidden.
fn load_note_for(
    db: &Database,
    note_id: Uuid,
    user_id: Uuid,
    action: NoteAction,
) -> Result<(NoteRow, NoteRole), ApiError> {
    let note = db
        .get_note(&note_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("Note not found".into()))?;

    let grant = db
        .get_collaborator_permission(&note.id, &user_id.to_string())?
        .and_then(|p| Permission::parse(&p));

    let owner_id: Uuid = note.owner_id.parse().map_err(anyhow::Error::from)?;
    let role = access::role_for(owner_id, user_id, grant);

    if !access::allows(role, action) {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action".into(),
        ));
    }

    Ok((note, role))
}

fn role_name(role: NoteRole) -> Option<String> {
    match role {
        NoteRole::Owner => Some("owner".into()),
        NoteRole::Editor => Some("editor".into()),
        NoteRole::Viewer => Some("viewer".into()),
        NoteRole::None => None,
    }
}

fn note_model(db: &Database, row: NoteRow, role: NoteRole) -> Result<Note, ApiError> {
    let owner_name = db
        .get_user_by_id(&row.owner_id)?
        .map(|u| u.name)
        .unwrap_or_default();

    Ok(Note {
        id: parse_id(&row.id, "note"),
        title: row.title,
        content: row.content,
        tags: row.tags,
        owner_id: parse_id(&row.owner_id, "note owner"),
        owner_name,
        is_pinned: row.is_pinned,
        share_token: row.share_token,
        created_at: parse_timestamp(&row.created_at, "note"),
        updated_at: parse_timestamp(&row.updated_at, "note"),
        user_permission: role_name(role),
    })
}

fn note_from_list_row(row: NoteListRow) -> Note {
    Note {
        id: parse_id(&row.id, "note"),
        title: row.title,
        content: row.content,
        tags: row.tags,
        owner_id: parse_id(&row.owner_id, "note owner"),
        owner_name: row.owner_name,
        is_pinned: row.is_pinned,
        share_token: row.share_token,
        created_at: parse_timestamp(&row.created_at, "note"),
        updated_at: parse_timestamp(&row.updated_at, "note"),
        user_permission: Some(row.user_permission),
    }
}

fn collaborator_model(row: CollaboratorRow) -> Option<Collaborator> {
    Some(Collaborator {
        user_id: parse_id(&row.user_id, "collaborator"),
        name: row.name,
        email: row.email,
        permission: Permission::parse(&row.permission)?,
    })
}

fn activity_model(row: ActivityRow) -> ActivityEntry {
    ActivityEntry {
        id: parse_id(&row.id, "activity"),
        user_id: parse_id(&row.user_id, "activity actor"),
        user_name: row.user_name,
        note_id: row.note_id.as_deref().map(|id| parse_id(id, "activity note")),
        action: row.action,
        details: serde_json::from_str(&row.details).unwrap_or(serde_json::Value::Null),
        created_at: parse_timestamp(&row.created_at, "activity"),
    }
}

fn parse_id(value: &str, context: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", value, context, e);
        Uuid::default()
    })
}

/// Best-effort relative to the primary mutation: it already succeeded, so
/// a failed audit write is logged and swallowed rather than failing the
/// request.
fn record_activity(
    db: &Database,
    user_id: Uuid,
    note_id: Option<Uuid>,
    action: &str,
    details: serde_json::Value,
) {
    let note_id = note_id.map(|id| id.to_string());
    if let Err(e) = db.insert_activity(
        &Uuid::new_v4().to_string(),
        &user_id.to_string(),
        note_id.as_deref(),
        action,
        &details.to_string(),
    ) {
        warn!("failed to record {} activity: {}", action, e);
    }
}
