use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use super::error::{is_unique_violation, ServiceError, StorageContext};
use crate::api::{UserCreate, Validate};
use crate::auth;
use crate::database::models::User;
use crate::types::Operation;

const USER_COLUMNS: &str = "id, username, hashed_password, created_at";

/// Account registration, credential checks and lookup.
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, input: &UserCreate) -> Result<User, ServiceError> {
        const OP: Operation = Operation::RegisterUser;
        input.validate().map_err(ServiceError::Validation)?;

        if self.find_by_username(&input.username).await?.is_some() {
            return Err(ServiceError::DuplicateUsername(input.username.clone()));
        }

        let hashed = auth::hash_password(&input.password).await.during(OP)?;

        // The unique index still decides when two registrations race past the check above
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, hashed_password, created_at)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&input.username)
        .bind(&hashed)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::DuplicateUsername(input.username.clone())
            } else {
                ServiceError::Storage { operation: OP, source: e }
            }
        })?;

        info!("Registered user {} (id {})", user.username, user.id);
        Ok(user)
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// produce the same error.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        // No stored username contains NUL, and Postgres rejects it as a parameter
        let user = if username.contains('\0') {
            None
        } else {
            self.find_by_username(username).await?
        };

        // Unknown users still pay for a bcrypt verification
        let Some(user) = user else {
            auth::verify_dummy_password(password).await.during(Operation::Login)?;
            return Err(ServiceError::AuthenticationFailed);
        };

        let valid = auth::verify_password(password, &user.hashed_password)
            .await
            .during(Operation::Login)?;
        if !valid {
            return Err(ServiceError::AuthenticationFailed);
        }
        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .during(Operation::LoadUser)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .during(Operation::LoadUser)
    }

    /// Delete the account. Notes and their associations go with it through
    /// the foreign keys; tags are left alone.
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        const OP: Operation = Operation::DeleteUser;
        let mut tx = self.pool.begin().await.during(OP)?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .during(OP)?
            .rows_affected();
        if deleted == 0 {
            return Err(ServiceError::NotFound);
        }

        tx.commit().await.during(OP)?;
        info!("Deleted user id {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoteCreate;
    use crate::services::NoteStore;
    use crate::testing::TestContext;

    fn signup(username: &str) -> UserCreate {
        UserCreate {
            username: username.to_string(),
            password: "secret-pw".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_and_first_user_kept() {
        let Some(ctx) = TestContext::new().await else { return };
        let service = UserService::new(ctx.pool.clone());
        let username = ctx.unique_name("user");

        let first = service.register(&signup(&username)).await.unwrap();
        assert_ne!(first.hashed_password, "secret-pw");

        let err = service.register(&signup(&username)).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateUsername(ref name) if name == &username));

        let stored = service.find_by_username(&username).await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert!(service.authenticate(&username, "secret-pw").await.is_ok());
    }

    #[tokio::test]
    async fn bad_credentials_fail_the_same_way() {
        let Some(ctx) = TestContext::new().await else { return };
        let service = UserService::new(ctx.pool.clone());
        let username = ctx.unique_name("login");
        service.register(&signup(&username)).await.unwrap();

        assert!(matches!(
            service.authenticate(&username, "wrong-pw").await,
            Err(ServiceError::AuthenticationFailed)
        ));
        assert!(matches!(
            service.authenticate(&ctx.unique_name("ghost"), "secret-pw").await,
            Err(ServiceError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn unknown_user_costs_a_password_check() {
        let Some(ctx) = TestContext::new().await else { return };
        let service = UserService::new(ctx.pool.clone());
        let username = ctx.unique_name("timing");
        service.register(&signup(&username)).await.unwrap();

        // first call also hashes the throwaway credential
        let _ = service.authenticate(&ctx.unique_name("ghost"), "secret-pw").await;

        let started = std::time::Instant::now();
        let _ = service.authenticate(&username, "wrong-pw").await;
        let wrong_password = started.elapsed();

        let started = std::time::Instant::now();
        let result = service.authenticate(&ctx.unique_name("ghost"), "secret-pw").await;
        let unknown_user = started.elapsed();

        assert!(matches!(result, Err(ServiceError::AuthenticationFailed)));
        assert!(
            unknown_user * 4 >= wrong_password,
            "unknown user took {:?}, wrong password {:?}",
            unknown_user,
            wrong_password
        );

        assert!(matches!(
            service.authenticate("nul\u{0}user", "secret-pw").await,
            Err(ServiceError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_notes_but_not_tags() {
        let Some(ctx) = TestContext::new().await else { return };
        let owner = ctx.create_user("cascade").await;
        let tag = ctx.unique_name("kept");
        let store = NoteStore::new(ctx.pool.clone());
        let note = store
            .create(
                owner.id,
                &NoteCreate {
                    title: "Gone".to_string(),
                    content: "soon".to_string(),
                    tags: Some(vec![tag.clone()]),
                },
            )
            .await
            .unwrap();

        let service = UserService::new(ctx.pool.clone());
        service.delete(owner.id).await.unwrap();

        assert!(service.find_by_id(owner.id).await.unwrap().is_none());
        assert_eq!(ctx.count_notes(owner.id).await, 0);
        assert_eq!(ctx.count_links(note.id).await, 0);
        assert_eq!(ctx.count_tags_named(&tag).await, 1);
        assert!(matches!(service.delete(owner.id).await, Err(ServiceError::NotFound)));
    }
}
