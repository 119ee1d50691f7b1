use sqlx::{Connection, PgConnection};
use tracing::debug;

use super::error::{is_unique_violation, ServiceError, StorageContext};
use crate::api::notes::TAG_NAME_MAX;
use crate::api::FieldErrors;
use crate::types::Operation;

const OP: Operation = Operation::ResolveTag;

/// Resolves tag names to ids, creating missing tags on demand.
///
/// Runs on the caller's connection so resolution joins the caller's
/// transaction. Uniqueness of names is enforced by the `tags.name` constraint;
/// an insert that loses a race is rolled back to a savepoint and the name is
/// looked up again, so the surrounding transaction stays usable.
pub struct TagRegistry;

enum InsertOutcome {
    Created(i64),
    AlreadyExists,
}

impl TagRegistry {
    /// Lookups + inserts attempted before giving up on one name.
    const MAX_ATTEMPTS: usize = 3;

    pub async fn resolve(conn: &mut PgConnection, name: &str) -> Result<i64, ServiceError> {
        Self::check_name(name)?;

        for attempt in 1..=Self::MAX_ATTEMPTS {
            if let Some(id) = Self::lookup(conn, name).await? {
                return Ok(id);
            }

            match Self::try_insert(conn, name).await? {
                InsertOutcome::Created(id) => {
                    debug!("Created tag '{}' with id {}", name, id);
                    return Ok(id);
                }
                InsertOutcome::AlreadyExists => {
                    debug!("Tag '{}' created concurrently, re-resolving (attempt {})", name, attempt);
                }
            }
        }

        Self::lookup(conn, name)
            .await?
            .ok_or(ServiceError::Storage {
                operation: OP,
                source: sqlx::Error::RowNotFound,
            })
    }

    /// Resolve every name, dropping repeats. Names are resolved in sorted
    /// order so concurrent writers take tag index locks in the same sequence;
    /// the returned ids follow that order.
    pub async fn resolve_all(conn: &mut PgConnection, names: &[String]) -> Result<Vec<i64>, ServiceError> {
        let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ids = Vec::with_capacity(sorted.len());
        for name in sorted {
            ids.push(Self::resolve(conn, name).await?);
        }
        Ok(ids)
    }

    pub async fn lookup(conn: &mut PgConnection, name: &str) -> Result<Option<i64>, ServiceError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await
            .during(OP)
    }

    async fn try_insert(conn: &mut PgConnection, name: &str) -> Result<InsertOutcome, ServiceError> {
        let mut savepoint = conn.begin().await.during(OP)?;

        let inserted = sqlx::query_scalar::<_, i64>("INSERT INTO tags (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *savepoint)
            .await;

        match inserted {
            Ok(id) => {
                savepoint.commit().await.during(OP)?;
                Ok(InsertOutcome::Created(id))
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await.during(OP)?;
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(ServiceError::Storage { operation: OP, source: e }),
        }
    }

    fn check_name(name: &str) -> Result<(), ServiceError> {
        if name.contains('\0') {
            let mut errors = FieldErrors::new();
            errors.insert("tags".to_string(), "tag names must not contain NUL characters".to_string());
            return Err(ServiceError::Validation(errors));
        }
        let len = name.chars().count();
        if len == 0 || len > TAG_NAME_MAX {
            let mut errors = FieldErrors::new();
            errors.insert(
                "tags".to_string(),
                format!("tag names must be 1 to {} characters", TAG_NAME_MAX),
            );
            return Err(ServiceError::Validation(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[tokio::test]
    async fn resolving_twice_returns_same_id() {
        let Some(ctx) = TestContext::new().await else { return };
        let name = ctx.unique_name("reg");

        let mut conn = ctx.pool.acquire().await.unwrap();
        let first = TagRegistry::resolve(&mut conn, &name).await.unwrap();
        let second = TagRegistry::resolve(&mut conn, &name).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.count_tags_named(&name).await, 1);
    }

    #[tokio::test]
    async fn names_are_case_sensitive() {
        let Some(ctx) = TestContext::new().await else { return };
        let lower = ctx.unique_name("case");
        let upper = lower.to_uppercase();

        let mut conn = ctx.pool.acquire().await.unwrap();
        let a = TagRegistry::resolve(&mut conn, &lower).await.unwrap();
        let b = TagRegistry::resolve(&mut conn, &upper).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn concurrent_resolution_creates_one_row() {
        let Some(ctx) = TestContext::new().await else { return };
        let name = ctx.unique_name("race");

        let tasks = (0..8).map(|_| {
            let pool = ctx.pool.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let mut tx = pool.begin().await.unwrap();
                let id = TagRegistry::resolve(&mut tx, &name).await.unwrap();
                tx.commit().await.unwrap();
                id
            })
        });

        let ids: Vec<i64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids differ: {:?}", ids);
        assert_eq!(ctx.count_tags_named(&name).await, 1);
    }

    #[tokio::test]
    async fn opposite_order_batches_do_not_deadlock() {
        let Some(ctx) = TestContext::new().await else { return };

        for round in 0..10 {
            let a = ctx.unique_name(&format!("ord{}a", round));
            let b = ctx.unique_name(&format!("ord{}b", round));

            let tasks = (0..4).map(|i| {
                let pool = ctx.pool.clone();
                let names = if i % 2 == 0 {
                    vec![a.clone(), b.clone()]
                } else {
                    vec![b.clone(), a.clone()]
                };
                tokio::spawn(async move {
                    let mut tx = pool.begin().await?;
                    let ids = TagRegistry::resolve_all(&mut tx, &names).await.map_err(|e| {
                        sqlx::Error::Protocol(e.to_string())
                    })?;
                    // hold the index locks a little while the others arrive
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    tx.commit().await?;
                    Ok::<_, sqlx::Error>(ids)
                })
            });

            let results: Vec<Vec<i64>> = futures::future::join_all(tasks)
                .await
                .into_iter()
                .map(|r| r.unwrap().unwrap())
                .collect();
            assert!(results.windows(2).all(|w| w[0] == w[1]), "round {}: {:?}", round, results);
            assert_eq!(ctx.count_tags_named(&a).await, 1);
            assert_eq!(ctx.count_tags_named(&b).await, 1);
        }
    }

    #[tokio::test]
    async fn losing_insert_keeps_transaction_usable() {
        let Some(ctx) = TestContext::new().await else { return };
        let name = ctx.unique_name("sp");

        let mut tx = ctx.pool.begin().await.unwrap();
        let id = TagRegistry::resolve(&mut tx, &name).await.unwrap();

        // Force the conflict path directly, then keep using the transaction.
        let outcome = TagRegistry::try_insert(&mut tx, &name).await.unwrap();
        assert!(matches!(outcome, InsertOutcome::AlreadyExists));
        assert_eq!(TagRegistry::lookup(&mut tx, &name).await.unwrap(), Some(id));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn resolve_all_deduplicates() {
        let Some(ctx) = TestContext::new().await else { return };
        let a = ctx.unique_name("a");
        let b = ctx.unique_name("b");

        let mut conn = ctx.pool.acquire().await.unwrap();
        let ids = TagRegistry::resolve_all(&mut conn, &[a.clone(), b, a]).await.unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn rejects_out_of_bounds_names() {
        assert!(matches!(TagRegistry::check_name(""), Err(ServiceError::Validation(_))));
        assert!(matches!(
            TagRegistry::check_name(&"x".repeat(TAG_NAME_MAX + 1)),
            Err(ServiceError::Validation(_))
        ));
        assert!(TagRegistry::check_name("work").is_ok());
    }
}
