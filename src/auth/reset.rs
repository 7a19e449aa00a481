use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

/// Reset tokens expire an hour after issue.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;
const TOKEN_LEN: usize = 48;

/// Single-use, time-boxed password-reset capability. At most one unused,
/// unexpired token exists per user: issuing a new one invalidates the rest.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub used: bool,
}

impl ResetToken {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// Invalidate all unused tokens for the user, then create a fresh one.
    /// Both steps run in one transaction so a crash cannot leave two live
    /// tokens behind.
    pub async fn issue(db: &PgPool, user_id: Uuid) -> anyhow::Result<ResetToken> {
        let token = generate_token();
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);

        let mut tx = db.begin().await?;
        sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE user_id = $1 AND used = FALSE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, ResetToken>(
            "INSERT INTO password_reset_tokens (user_id, token, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, token, expires_at, created_at, used",
        )
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(user_id = %user_id, token_id = %row.id, "reset token issued");
        Ok(row)
    }

    /// Exact-match lookup of a token that has not been consumed yet.
    pub async fn find_unused(db: &PgPool, token: &str) -> anyhow::Result<Option<ResetToken>> {
        let row = sqlx::query_as::<_, ResetToken>(
            "SELECT id, user_id, token, expires_at, created_at, used
             FROM password_reset_tokens
             WHERE token = $1 AND used = FALSE",
        )
        .bind(token)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Flip the used flag false -> true. Conditional on the current value,
    /// so of two concurrent consumers exactly one gets `true` back; the
    /// other must treat the token as spent.
    pub async fn mark_used(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE")
                .bind(id)
                .execute(db)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// URL-safe random token. `thread_rng` reseeds from the OS generator, so
/// the value is unguessable.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;

    async fn seeded_user(db: &PgPool, email: &str) -> User {
        User::create(db, email, "$argon2id$placeholder", "Jane Doe")
            .await
            .expect("create user")
            .expect("email is fresh")
    }

    #[sqlx::test]
    async fn issuing_a_new_token_invalidates_the_previous_one(db: PgPool) {
        let user = seeded_user(&db, "reissue@example.com").await;

        let first = ResetToken::issue(&db, user.id).await.expect("first issue");
        let second = ResetToken::issue(&db, user.id).await.expect("second issue");

        assert!(ResetToken::find_unused(&db, &first.token)
            .await
            .expect("lookup")
            .is_none());
        let live = ResetToken::find_unused(&db, &second.token)
            .await
            .expect("lookup")
            .expect("second token still live");
        assert_eq!(live.id, second.id);
    }

    #[sqlx::test]
    async fn a_token_is_consumed_exactly_once(db: PgPool) {
        let user = seeded_user(&db, "once@example.com").await;
        let token = ResetToken::issue(&db, user.id).await.expect("issue");

        assert!(ResetToken::mark_used(&db, token.id).await.expect("first consume"));
        assert!(!ResetToken::mark_used(&db, token.id).await.expect("second consume"));
        assert!(ResetToken::find_unused(&db, &token.token)
            .await
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn generated_tokens_are_url_safe_and_long_enough() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn expiry_check_is_inclusive_of_the_deadline() {
        let now = OffsetDateTime::now_utc();
        let token = ResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: generate_token(),
            expires_at: now,
            created_at: now - Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            used: false,
        };
        assert!(token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(1)));
        assert!(!token.is_expired(now - Duration::seconds(1)));
    }
}
