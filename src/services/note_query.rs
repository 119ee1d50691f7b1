use sqlx::{PgPool, Postgres, QueryBuilder};

use super::error::{ServiceError, StorageContext};
use super::note_store::{begin_snapshot, load_tags};
use crate::api::NoteFilter;
use crate::database::models::{Note, NoteRow, Tag};
use crate::types::Operation;

/// Read-side queries over one owner's notes.
pub struct NoteQuery {
    pool: PgPool,
}

impl NoteQuery {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The owner's notes, newest update first, optionally narrowed by a
    /// case-insensitive title substring and/or an exact tag name.
    pub async fn list(&self, owner: i64, filter: &NoteFilter) -> Result<Vec<Note>, ServiceError> {
        const OP: Operation = Operation::ListNotes;
        // Stored text never contains NUL, and Postgres refuses it as a parameter
        if [filter.search(), filter.tag()].iter().flatten().any(|s| s.contains('\0')) {
            return Ok(Vec::new());
        }
        let mut tx = begin_snapshot(&self.pool).await.during(OP)?;

        let rows: Vec<NoteRow> = build_list_query(owner, filter.search(), filter.tag())
            .build_query_as()
            .fetch_all(&mut *tx)
            .await
            .during(OP)?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut tags = load_tags(&mut tx, &ids).await.during(OP)?;
        tx.commit().await.during(OP)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let own = tags.remove(&row.id).unwrap_or_default();
                row.with_tags(own)
            })
            .collect())
    }

    /// Every tag attached to at least one of the owner's notes, once each.
    pub async fn tags_for_user(&self, owner: i64) -> Result<Vec<Tag>, ServiceError> {
        sqlx::query_as::<_, Tag>(
            "SELECT DISTINCT t.id, t.name
             FROM tags t
             JOIN note_tags nt ON nt.tag_id = t.id
             JOIN notes n ON n.id = nt.note_id
             WHERE n.user_id = $1
             ORDER BY t.name, t.id",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .during(Operation::ListTags)
    }
}

/// SQL for the owner-scoped listing. Title matching uses `strpos` so `%` and
/// `_` in the search text are taken literally.
pub(crate) fn build_list_query<'a>(owner: i64, search: Option<&'a str>, tag: Option<&'a str>) -> QueryBuilder<'a, Postgres> {
    let mut query = QueryBuilder::new(
        "SELECT n.id, n.title, n.content, n.created_at, n.updated_at, n.user_id FROM notes n WHERE n.user_id = ",
    );
    query.push_bind(owner);

    if let Some(search) = search {
        query
            .push(" AND strpos(lower(n.title), lower(")
            .push_bind(search)
            .push(")) > 0");
    }

    if let Some(tag) = tag {
        query
            .push(" AND EXISTS (SELECT 1 FROM note_tags nt JOIN tags t ON t.id = nt.tag_id WHERE nt.note_id = n.id AND t.name = ")
            .push_bind(tag)
            .push(")");
    }

    query.push(" ORDER BY n.updated_at DESC, n.id DESC");
    query
}
