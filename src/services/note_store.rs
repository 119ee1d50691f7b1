use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::warn;

use super::error::{ServiceError, StorageContext};
use super::tag_registry::TagRegistry;
use crate::api::{NoteCreate, NoteUpdate, Validate};
use crate::database::models::{Note, NoteRow, NoteTagRow, Tag};
use crate::types::Operation;

const NOTE_COLUMNS: &str = "id, title, content, created_at, updated_at, user_id";

/// Owner-scoped note persistence.
///
/// Every method takes the owner's id and treats a note owned by anybody else
/// exactly like a missing note. Mutations run in one transaction together
/// with their tag association changes.
#[derive(Clone)]
pub struct NoteStore {
    pool: PgPool,
}

impl NoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, owner: i64, input: &NoteCreate) -> Result<Note, ServiceError> {
        input.validate().map_err(ServiceError::Validation)?;
        retry_transient(|| self.create_once(owner, input)).await
    }

    async fn create_once(&self, owner: i64, input: &NoteCreate) -> Result<Note, ServiceError> {
        const OP: Operation = Operation::CreateNote;
        let mut tx = self.pool.begin().await.during(OP)?;
        let now = Utc::now();

        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "INSERT INTO notes (title, content, created_at, updated_at, user_id)
             VALUES ($1, $2, $3, $3, $4)
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.content)
        .bind(now)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .during(OP)?;

        link_tags(&mut tx, row.id, input.tag_names(), OP).await?;
        let tags = load_tags(&mut tx, &[row.id]).await.during(OP)?;
        tx.commit().await.during(OP)?;

        Ok(attach(row, tags))
    }

    pub async fn get(&self, owner: i64, note_id: i64) -> Result<Note, ServiceError> {
        const OP: Operation = Operation::GetNote;
        let mut tx = begin_snapshot(&self.pool).await.during(OP)?;

        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2"
        ))
        .bind(note_id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await
        .during(OP)?
        .ok_or(ServiceError::NotFound)?;

        let tags = load_tags(&mut tx, &[row.id]).await.during(OP)?;
        tx.commit().await.during(OP)?;

        Ok(attach(row, tags))
    }

    /// Partial update. `updated_at` moves forward on every successful call,
    /// whichever fields were supplied.
    pub async fn update(&self, owner: i64, note_id: i64, changes: &NoteUpdate) -> Result<Note, ServiceError> {
        changes.validate().map_err(ServiceError::Validation)?;
        retry_transient(|| self.update_once(owner, note_id, changes)).await
    }

    async fn update_once(&self, owner: i64, note_id: i64, changes: &NoteUpdate) -> Result<Note, ServiceError> {
        const OP: Operation = Operation::UpdateNote;
        let mut tx = self.pool.begin().await.during(OP)?;
        lock_owned(&mut tx, owner, note_id, OP).await?;

        // GREATEST keeps updated_at monotonic if the wall clock steps back
        let row = sqlx::query_as::<_, NoteRow>(&format!(
            "UPDATE notes
             SET title = COALESCE($1, title),
                 content = COALESCE($2, content),
                 updated_at = GREATEST($3, updated_at)
             WHERE id = $4 AND user_id = $5
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(Utc::now())
        .bind(note_id)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .during(OP)?;

        if let Some(names) = &changes.tags {
            sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
                .bind(note_id)
                .execute(&mut *tx)
                .await
                .during(OP)?;
            link_tags(&mut tx, note_id, names, OP).await?;
        }

        let tags = load_tags(&mut tx, &[note_id]).await.during(OP)?;
        tx.commit().await.during(OP)?;

        Ok(attach(row, tags))
    }

    /// Removes the note and its associations. Tags stay, even when no
    /// other note references them any more.
    pub async fn delete(&self, owner: i64, note_id: i64) -> Result<(), ServiceError> {
        const OP: Operation = Operation::DeleteNote;
        let mut tx = self.pool.begin().await.during(OP)?;
        lock_owned(&mut tx, owner, note_id, OP).await?;

        sqlx::query("DELETE FROM note_tags WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await
            .during(OP)?;
        sqlx::query("DELETE FROM notes WHERE id = $1 AND user_id = $2")
            .bind(note_id)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .during(OP)?;

        tx.commit().await.during(OP)?;
        Ok(())
    }
}

/// Run a whole transaction again, once, when Postgres aborted it with a
/// deadlock or serialization failure. Nothing from the aborted attempt was
/// committed, so the second run starts clean.
async fn retry_transient<T, F, Fut>(mut run: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    match run().await {
        Err(e) if e.is_transient() => {
            warn!("Retrying after transient conflict: {}", e);
            run().await
        }
        other => other,
    }
}

/// Start a read-only transaction whose reads all see one snapshot, so a
/// note and its tags always come from the same committed state.
pub(crate) async fn begin_snapshot(pool: &PgPool) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Row-lock the owner's note for the rest of the transaction. Concurrent
/// writers to the same note queue here.
async fn lock_owned(conn: &mut PgConnection, owner: i64, note_id: i64, op: Operation) -> Result<(), ServiceError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM notes WHERE id = $1 AND user_id = $2 FOR UPDATE")
        .bind(note_id)
        .bind(owner)
        .fetch_optional(&mut *conn)
        .await
        .during(op)?
        .map(|_| ())
        .ok_or(ServiceError::NotFound)
}

async fn link_tags(conn: &mut PgConnection, note_id: i64, names: &[String], op: Operation) -> Result<(), ServiceError> {
    if names.is_empty() {
        return Ok(());
    }

    let tag_ids = TagRegistry::resolve_all(conn, names).await?;
    sqlx::query(
        "INSERT INTO note_tags (note_id, tag_id)
         SELECT $1::BIGINT, UNNEST($2::BIGINT[])
         ON CONFLICT DO NOTHING",
    )
    .bind(note_id)
    .bind(&tag_ids)
    .execute(&mut *conn)
    .await
    .during(op)?;
    Ok(())
}

/// Tags for each of `note_ids`, keyed by note id, in tag id order.
pub(crate) async fn load_tags(conn: &mut PgConnection, note_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>, sqlx::Error> {
    let mut by_note: HashMap<i64, Vec<Tag>> = HashMap::new();
    if note_ids.is_empty() {
        return Ok(by_note);
    }

    let rows = sqlx::query_as::<_, NoteTagRow>(
        "SELECT nt.note_id, t.id, t.name
         FROM note_tags nt
         JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_id = ANY($1)
         ORDER BY nt.note_id, t.id",
    )
    .bind(note_ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in rows {
        by_note.entry(row.note_id).or_default().push(row.into_tag());
    }
    Ok(by_note)
}

pub(crate) fn attach(row: NoteRow, mut tags: HashMap<i64, Vec<Tag>>) -> Note {
    let own = tags.remove(&row.id).unwrap_or_default();
    row.with_tags(own)
}
