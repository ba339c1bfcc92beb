use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Permission level carried by a collaborator grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Editor,
    Viewer,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Actions a principal can request against a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Read,
    EditContent,
    Delete,
    Pin,
    Share,
    ManageCollaborators,
    ViewActivity,
}

/// A principal's role relative to one note. Ownership is implicit and
/// checked separately from the grant table; the owner never holds a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteRole {
    Owner,
    Editor,
    Viewer,
    None,
}

/// Derive the requester's role from the note's stored owner and their
/// collaborator grant, if any.
pub fn role_for(owner_id: Uuid, user_id: Uuid, grant: Option<Permission>) -> NoteRole {
    if owner_id == user_id {
        return NoteRole::Owner;
    }
    match grant {
        Some(Permission::Editor) => NoteRole::Editor,
        Some(Permission::Viewer) => NoteRole::Viewer,
        None => NoteRole::None,
    }
}

/// Single source of truth for the permission table. Share-token reads bypass
/// this entirely and go through the token-scoped path instead.
pub fn allows(role: NoteRole, action: NoteAction) -> bool {
    match role {
        NoteRole::Owner => true,
        NoteRole::Editor => matches!(
            action,
            NoteAction::Read | NoteAction::EditContent | NoteAction::ViewActivity
        ),
        NoteRole::Viewer => matches!(action, NoteAction::Read | NoteAction::ViewActivity),
        NoteRole::None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [NoteAction; 7] = [
        NoteAction::Read,
        NoteAction::EditContent,
        NoteAction::Delete,
        NoteAction::Pin,
        NoteAction::Share,
        NoteAction::ManageCollaborators,
        NoteAction::ViewActivity,
    ];

    #[test]
    fn owner_may_do_everything() {
        for action in ALL_ACTIONS {
            assert!(allows(NoteRole::Owner, action), "{action:?}");
        }
    }

    #[test]
    fn editor_reads_and_edits_only() {
        assert!(allows(NoteRole::Editor, NoteAction::Read));
        assert!(allows(NoteRole::Editor, NoteAction::EditContent));
        assert!(allows(NoteRole::Editor, NoteAction::ViewActivity));
        assert!(!allows(NoteRole::Editor, NoteAction::Delete));
        assert!(!allows(NoteRole::Editor, NoteAction::Pin));
        assert!(!allows(NoteRole::Editor, NoteAction::Share));
        assert!(!allows(NoteRole::Editor, NoteAction::ManageCollaborators));
    }

    #[test]
    fn viewer_is_read_only() {
        assert!(allows(NoteRole::Viewer, NoteAction::Read));
        assert!(allows(NoteRole::Viewer, NoteAction::ViewActivity));
        assert!(!allows(NoteRole::Viewer, NoteAction::EditContent));
        assert!(!allows(NoteRole::Viewer, NoteAction::Delete));
        assert!(!allows(NoteRole::Viewer, NoteAction::Share));
    }

    #[test]
    fn stranger_is_denied_everything() {
        for action in ALL_ACTIONS {
            assert!(!allows(NoteRole::None, action), "{action:?}");
        }
    }

    #[test]
    fn role_derivation() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(role_for(owner, owner, None), NoteRole::Owner);
        // Ownership wins even if a stray grant row existed
        assert_eq!(
            role_for(owner, owner, Some(Permission::Viewer)),
            NoteRole::Owner
        );
        assert_eq!(
            role_for(owner, other, Some(Permission::Editor)),
            NoteRole::Editor
        );
        assert_eq!(
            role_for(owner, other, Some(Permission::Viewer)),
            NoteRole::Viewer
        );
        assert_eq!(role_for(owner, other, None), NoteRole::None);
    }

    #[test]
    fn permission_round_trips_as_str() {
        assert_eq!(Permission::parse("editor"), Some(Permission::Editor));
        assert_eq!(Permission::parse("viewer"), Some(Permission::Viewer));
        assert_eq!(Permission::parse("admin"), None);
        assert_eq!(Permission::Editor.as_str(), "editor");
    }
}
