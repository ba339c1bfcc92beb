use crate::Database;
use crate::models::{ActivityRow, CollaboratorRow, NoteListRow, NoteRow, SharedNoteRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, name, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Notes --

    pub fn insert_note(
        &self,
        id: &str,
        title: &str,
        content: &str,
        tags: &str,
        owner_id: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes (id, title, content, tags, owner_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, title, content, tags, owner_id),
            )?;
            Ok(())
        })
    }

    pub fn get_note(&self, id: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, tags, owner_id, is_pinned, share_token, created_at, updated_at
                 FROM notes WHERE id = ?1",
            )?;

            let row = stmt
                .query_row([id], |row| {
                    Ok(NoteRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        tags: row.get(3)?,
                        owner_id: row.get(4)?,
                        is_pinned: row.get(5)?,
                        share_token: row.get(6)?,
                        created_at: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    /// Notes visible to a user: owned plus collaborated, pinned first, then
    /// most recently updated. Ties break on id ascending so the order is
    /// deterministic.
    pub fn list_notes_for_user(&self, user_id: &str) -> Result<Vec<NoteListRow>> {
        self.with_conn(|conn| query_visible_notes(conn, user_id, None))
    }

    /// Substring search over title, content and tags of the user's visible
    /// notes. LIKE is case-insensitive for ASCII under SQLite defaults.
    /// Blank-query handling ("no results, not all notes") is the caller's.
    pub fn search_notes(&self, user_id: &str, query: &str) -> Result<Vec<NoteListRow>> {
        let term = format!("%{}%", query);
        self.with_conn(|conn| query_visible_notes(conn, user_id, Some(&term)))
    }

    /// Partial update: NULL arguments keep the stored value. Bumps
    /// updated_at. Returns false if the note does not exist.
    pub fn update_note(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
        tags: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET title      = COALESCE(?1, title),
                     content    = COALESCE(?2, content),
                     tags       = COALESCE(?3, tags),
                     updated_at = datetime('now')
                 WHERE id = ?4",
                (title, content, tags, id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Collaborator grants cascade via the FK; activity rows keep their
    /// actor with note_id set NULL.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn set_pinned(&self, id: &str, pinned: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notes SET is_pinned = ?1 WHERE id = ?2",
                (pinned, id),
            )?;
            Ok(())
        })
    }

    // -- Share tokens --

    /// Create-if-absent: stores `candidate` only when the note has no token
    /// yet, otherwise returns the existing one unchanged. Returns None when
    /// the note does not exist.
    pub fn ensure_share_token(&self, note_id: &str, candidate: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let existing: Option<Option<String>> = conn
                .query_row(
                    "SELECT share_token FROM notes WHERE id = ?1",
                    [note_id],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                None => Ok(None),
                Some(Some(token)) => Ok(Some(token)),
                Some(None) => {
                    conn.execute(
                        "UPDATE notes SET share_token = ?1 WHERE id = ?2",
                        (candidate, note_id),
                    )?;
                    Ok(Some(candidate.to_string()))
                }
            }
        })
    }

    pub fn get_note_by_share_token(&self, token: &str) -> Result<Option<SharedNoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT n.id, n.title, n.content, n.tags, u.name, n.created_at, n.updated_at
                 FROM notes n
                 LEFT JOIN users u ON n.owner_id = u.id
                 WHERE n.share_token = ?1",
            )?;

            let row = stmt
                .query_row([token], |row| {
                    Ok(SharedNoteRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content: row.get(2)?,
                        tags: row.get(3)?,
                        owner_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })
                .optional()?;

            Ok(row)
        })
    }

    // -- Collaborators --

    /// Insert or replace the permission on conflict; a (note, user) pair
    /// never appears twice.
    pub fn upsert_collaborator(&self, note_id: &str, user_id: &str, permission: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO collaborators (note_id, user_id, permission)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(note_id, user_id) DO UPDATE SET permission = ?3",
                (note_id, user_id, permission),
            )?;
            Ok(())
        })
    }

    pub fn remove_collaborator(&self, note_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM collaborators WHERE note_id = ?1 AND user_id = ?2",
                (note_id, user_id),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_collaborator_permission(&self, note_id: &str, user_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let permission = conn
                .query_row(
                    "SELECT permission FROM collaborators WHERE note_id = ?1 AND user_id = ?2",
                    (note_id, user_id),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(permission)
        })
    }

    pub fn list_collaborators(&self, note_id: &str) -> Result<Vec<CollaboratorRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.user_id, u.name, u.email, c.permission
                 FROM collaborators c
                 JOIN users u ON c.user_id = u.id
                 WHERE c.note_id = ?1
                 ORDER BY u.name ASC",
            )?;

            let rows = stmt
                .query_map([note_id], |row| {
                    Ok(CollaboratorRow {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        permission: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Activity --

    /// Append one immutable audit entry. Entries are never updated or
    /// deleted; note deletion nulls note_id via the FK instead.
    pub fn insert_activity(
        &self,
        id: &str,
        user_id: &str,
        note_id: Option<&str>,
        action: &str,
        details: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activity_log (id, user_id, note_id, action, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, note_id, action, details),
            )?;
            Ok(())
        })
    }

    pub fn list_activity(&self, note_id: &str, limit: u32) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.user_id, u.name, a.note_id, a.action, a.details, a.created_at
                 FROM activity_log a
                 JOIN users u ON a.user_id = u.id
                 WHERE a.note_id = ?1
                 ORDER BY a.created_at DESC, a.rowid DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![note_id, limit], |row| {
                    Ok(ActivityRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        user_name: row.get(2)?,
                        note_id: row.get(3)?,
                        action: row.get(4)?,
                        details: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // column is always a fixed identifier from the wrappers above
    let sql = format!(
        "SELECT id, name, email, password, role, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                role: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_visible_notes(
    conn: &Connection,
    user_id: &str,
    search_term: Option<&str>,
) -> Result<Vec<NoteListRow>> {
    let mut sql = String::from(
        "SELECT DISTINCT n.id, n.title, n.content, n.tags, n.owner_id, u.name,
                n.is_pinned, n.share_token, n.created_at, n.updated_at,
                CASE WHEN n.owner_id = ?1 THEN 'owner'
                     ELSE COALESCE(c.permission, 'viewer') END
         FROM notes n
         LEFT JOIN users u ON n.owner_id = u.id
         LEFT JOIN collaborators c ON n.id = c.note_id AND c.user_id = ?1
         WHERE (n.owner_id = ?1 OR c.user_id = ?1)",
    );
    if search_term.is_some() {
        sql.push_str(" AND (n.title LIKE ?2 OR n.content LIKE ?2 OR n.tags LIKE ?2)");
    }
    sql.push_str(" ORDER BY n.is_pinned DESC, n.updated_at DESC, n.id ASC");

    let mut stmt = conn.prepare(&sql)?;

    let map_row = |row: &rusqlite::Row<'_>| {
        Ok(NoteListRow {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            tags: row.get(3)?,
            owner_id: row.get(4)?,
            owner_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            is_pinned: row.get(6)?,
            share_token: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            user_permission: row.get(10)?,
        })
    };

    let rows = match search_term {
        Some(term) => stmt
            .query_map((user_id, term), map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([user_id], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
