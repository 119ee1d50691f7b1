use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::tag::Tag;

/// A `notes` row without its associations.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
}

impl NoteRow {
    pub fn with_tags(self, tags: Vec<Tag>) -> Note {
        Note {
            id: self.id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user_id: self.user_id,
            tags,
        }
    }
}

/// A fully materialized note: the row plus its resolved tag set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: i64,
    pub tags: Vec<Tag>,
}

impl Note {
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }
}
