use sqlx::PgPool;
use uuid::Uuid;

use crate::config;
use crate::database::models::User;
use crate::database::{ensure_schema, DatabaseManager};

/// Database fixture for service tests.
///
/// Connects to `DATABASE_URL` and makes sure the schema exists. Every name it
/// hands out is unique, so tests can share one database without cleanup.
pub struct TestContext {
    pub pool: PgPool,
}

impl TestContext {
    /// `None` when no database is configured; callers skip in that case.
    pub async fn new() -> Option<Self> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        }

        let mut database = config::config().database.clone();
        database.max_connections = 5;
        let pool = DatabaseManager::connect(&database)
            .await
            .expect("failed to connect to DATABASE_URL");
        ensure_schema(&pool).await.expect("failed to apply schema");
        Some(Self { pool })
    }

    /// `prefix` plus a random suffix, short enough for tag and username limits.
    pub fn unique_name(&self, prefix: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix, &suffix[..12])
    }

    /// Insert a user directly, skipping bcrypt to keep tests fast.
    pub async fn create_user(&self, prefix: &str) -> User {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, hashed_password, created_at)
             VALUES ($1, 'not-a-real-hash', now())
             RETURNING id, username, hashed_password, created_at",
        )
        .bind(self.unique_name(prefix))
        .fetch_one(&self.pool)
        .await
        .expect("failed to create test user")
    }

    pub async fn count_tags_named(&self, name: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .expect("count tags")
    }

    pub async fn count_notes(&self, owner: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE user_id = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .expect("count notes")
    }

    pub async fn count_links(&self, note_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM note_tags WHERE note_id = $1")
            .bind(note_id)
            .fetch_one(&self.pool)
            .await
            .expect("count note_tags")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unique_names_differ_and_fit_limits() {
        let Some(ctx) = TestContext::new().await else { return };
        let a = ctx.unique_name("tagstranger");
        let b = ctx.unique_name("tagstranger");
        assert_ne!(a, b);
        assert!(a.len() <= 50);
    }
}
