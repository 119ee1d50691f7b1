use sqlx::PgPool;
use tracing::info;

use super::manager::DatabaseError;

/// Idempotent DDL for the notes schema, applied in order.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        username VARCHAR(50) NOT NULL UNIQUE,
        hashed_password VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS notes (
        id BIGSERIAL PRIMARY KEY,
        title VARCHAR(200) NOT NULL,
        content TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        CONSTRAINT notes_updated_after_created CHECK (updated_at >= created_at)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tags (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(50) NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS note_tags (
        note_id BIGINT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
        tag_id BIGINT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (note_id, tag_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS notes_user_updated_idx ON notes (user_id, updated_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS notes_title_idx ON notes (title)",
    "CREATE INDEX IF NOT EXISTS note_tags_tag_idx ON note_tags (tag_id)",
];

/// Create tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    // Serialize concurrent bootstrap (tests, multiple replicas starting at once)
    sqlx::query("SELECT pg_advisory_xact_lock(7462310)")
        .execute(&mut *tx)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Database schema is up to date");
    Ok(())
}
