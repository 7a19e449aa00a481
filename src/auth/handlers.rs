use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    Json,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthData, ForgotPasswordRequest, LoginRequest, PublicUser, RegisterRequest,
            ResetPasswordRequest,
        },
        jwt::{AuthUser, JwtKeys},
        lockout,
        password::{hash_password, verify_password},
        repo::User,
        reset::ResetToken,
        validation::{validate_new_password, validate_registration},
    },
    error::{ApiError, Envelope},
    imaging::DeleteScope,
    state::AppState,
    wardrobe::repo::Item,
};

/// Identical answer whether or not the account exists, so responses cannot
/// be used to enumerate registered emails.
const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<AuthData>>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let errors = validate_registration(
        &payload.email,
        &payload.password,
        &payload.confirm_password,
        &payload.full_name,
    );
    if !errors.is_empty() {
        warn!(email = %payload.email, count = errors.len(), "registration validation failed");
        return Err(ApiError::Validation(errors));
    }

    let hash = hash_password(&payload.password)?;
    // The unique index decides duplicates, not a prior lookup, so two
    // concurrent registrations of one email resolve to a single winner.
    let Some(user) =
        User::create(&state.db, &payload.email, &hash, payload.full_name.trim()).await?
    else {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(Envelope::data(AuthData {
            token,
            user: PublicUser::from(user),
        })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<Envelope<AuthData>>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login for unknown email");
        return Err(ApiError::InvalidCredentials {
            attempts_left: None,
        });
    };

    let now = OffsetDateTime::now_utc();
    let mut failed_count_before = user.failed_login_count;
    match lockout::check(user.locked_until, now) {
        lockout::Gate::Locked { minutes_left } => {
            // Password deliberately not verified: a locked account must not
            // leak timing information about credential correctness.
            warn!(user_id = %user.id, minutes_left, "login refused, account locked");
            return Err(ApiError::AccountLocked { minutes_left });
        }
        lockout::Gate::OpenAfterExpiry => {
            User::clear_lockout(&state.db, user.id).await?;
            failed_count_before = 0;
        }
        lockout::Gate::Open => {}
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        return match lockout::next_failure(failed_count_before, now) {
            lockout::FailureOutcome::Locked { locked_until } => {
                User::record_login_failure(
                    &state.db,
                    user.id,
                    failed_count_before + 1,
                    Some(locked_until),
                )
                .await?;
                warn!(user_id = %user.id, "account locked after repeated failures");
                Err(ApiError::AccountLocked {
                    minutes_left: lockout::LOCKOUT_MINUTES,
                })
            }
            lockout::FailureOutcome::Counted {
                failed_count,
                attempts_left,
            } => {
                User::record_login_failure(&state.db, user.id, failed_count, None).await?;
                warn!(user_id = %user.id, failed_count, "login invalid password");
                Err(ApiError::InvalidCredentials {
                    attempts_left: Some(attempts_left),
                })
            }
        };
    }

    User::record_login_success(&state.db, user.id, now).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(Envelope::data(AuthData {
        token,
        user: PublicUser::from(User {
            failed_login_count: 0,
            locked_until: None,
            last_login_at: Some(now),
            ..user
        }),
    })))
}

/// Logout is advisory: there is no server-side session table to revoke, the
/// client simply discards its token. The endpoint exists for audit logging.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> Result<Json<Envelope<()>>, ApiError> {
    info!(user_id = %user_id, "user logged out");
    Ok(Json(Envelope::message(
        "Logged out. Discard the session token on the client",
    )))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        // Token delivery (email) is an external collaborator's job; the
        // value is only persisted here.
        let token = ResetToken::issue(&state.db, user.id).await?;
        info!(user_id = %user.id, token_id = %token.id, "password reset requested");
    } else {
        info!(email = %payload.email, "password reset requested for unknown email");
    }

    Ok(Json(Envelope::message(RESET_REQUESTED_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Some(token) = ResetToken::find_unused(&state.db, &payload.token).await? else {
        warn!("password reset with unknown or consumed token");
        return Err(ApiError::InvalidResetToken);
    };

    let now = OffsetDateTime::now_utc();
    if token.is_expired(now) {
        // Consume even on expiry so the same token can never race a retry.
        ResetToken::mark_used(&state.db, token.id).await?;
        warn!(user_id = %token.user_id, "password reset with expired token");
        return Err(ApiError::ResetTokenExpired);
    }

    if payload.new_password != payload.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    let errors = validate_new_password(&payload.new_password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Consume before writing the password: of two racing requests with the
    // same token only the one that flips the flag proceeds.
    if !ResetToken::mark_used(&state.db, token.id).await? {
        warn!(user_id = %token.user_id, "reset token consumed by a concurrent request");
        return Err(ApiError::InvalidResetToken);
    }
    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, token.user_id, &hash).await?;

    info!(user_id = %token.user_id, "password reset completed");
    // No session is issued here: the user must log in with the new password.
    Ok(Json(Envelope::message(
        "Password has been reset. Please log in with your new password",
    )))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::TokenInvalid)?;
    Ok(Json(Envelope::data(PublicUser::from(user))))
}

/// Explicit cascade delete of the account: best-effort artifact cleanup at
/// the collaborator first, then tokens, items and the user in one
/// transaction.
#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<()>>, ApiError> {
    let items = Item::list_by_user(&state.db, user_id).await?;
    for item in &items {
        if let Some(file_name) = &item.file_name {
            if let Err(e) = state.imaging.delete(file_name, DeleteScope::Both).await {
                warn!(item_id = %item.id, error = %e, "artifact cleanup failed; continuing");
            }
        }
    }
    User::delete_cascade(&state.db, user_id).await?;

    info!(user_id = %user_id, deleted_items = items.len(), "account deleted");
    Ok(Json(Envelope::message("Account deleted")))
}
