use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Email is stored lower-cased and unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub created_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
    pub failed_login_count: i32,
    pub locked_until: Option<OffsetDateTime>,
    pub is_verified: bool,
}

const USER_COLUMNS: &str = "id, email, password_hash, full_name, created_at, last_login_at, \
     failed_login_count, locked_until, is_verified";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user. Returns `None` when the email is already taken:
    /// the unique index is the authority, so two concurrent registrations
    /// cannot both slip past a lookup.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        full_name: &str,
    ) -> anyhow::Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, full_name)
             VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .fetch_one(db)
        .await;
        match result {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store the failure counter and (when the threshold was hit) the
    /// lockout expiry. Single UPDATE: two simultaneous failures may both
    /// write the same counter value, which is an accepted limitation.
    pub async fn record_login_failure(
        db: &PgPool,
        id: Uuid,
        failed_login_count: i32,
        locked_until: Option<OffsetDateTime>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET failed_login_count = $2, locked_until = $3 WHERE id = $1")
            .bind(id)
            .bind(failed_login_count)
            .bind(locked_until)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Reset the counter after a lockout window has elapsed.
    pub async fn clear_lockout(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET failed_login_count = 0, locked_until = NULL WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn record_login_success(
        db: &PgPool,
        id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users
             SET failed_login_count = 0, locked_until = NULL, last_login_at = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Explicit cascade: reset tokens and items go first, then the user,
    /// all inside one transaction. Artifact cleanup at the collaborator is
    /// the caller's job before invoking this.
    pub async fn delete_cascade(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        let mut tx = db.begin().await?;
        sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM items WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    async fn create_reports_a_taken_email_instead_of_erroring(db: PgPool) {
        let first = User::create(&db, "dup@example.com", "$argon2id$a", "Jane Doe")
            .await
            .expect("first insert");
        assert!(first.is_some());

        let second = User::create(&db, "dup@example.com", "$argon2id$b", "Janet Doe")
            .await
            .expect("second insert must not surface as an error");
        assert!(second.is_none());
    }
}
