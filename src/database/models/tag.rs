use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Globally shared label. Names are unique and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A tag joined to one of the notes it is attached to.
#[derive(Debug, Clone, FromRow)]
pub struct NoteTagRow {
    pub note_id: i64,
    pub id: i64,
    pub name: String,
}

impl NoteTagRow {
    pub fn into_tag(self) -> Tag {
        Tag { id: self.id, name: self.name }
    }
}
