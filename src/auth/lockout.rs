use time::{Duration, OffsetDateTime};

/// Consecutive failures allowed before an account locks.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;
/// How long a lockout lasts once triggered.
pub const LOCKOUT_MINUTES: i64 = 15;

/// Whether a login attempt may proceed to password verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Lockout still active; the password hash must not be touched.
    Locked { minutes_left: i64 },
    /// A lockout existed but its window has passed; reset the counter to
    /// zero before proceeding.
    OpenAfterExpiry,
    Open,
}

/// Outcome of one more failed password attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Threshold reached: lock until the given instant.
    Locked { locked_until: OffsetDateTime },
    /// Below threshold: store the new counter, tell the caller how many
    /// attempts remain.
    Counted {
        failed_count: i32,
        attempts_left: i32,
    },
}

pub fn check(locked_until: Option<OffsetDateTime>, now: OffsetDateTime) -> Gate {
    match locked_until {
        Some(until) if until > now => Gate::Locked {
            minutes_left: minutes_remaining(until, now),
        },
        Some(_) => Gate::OpenAfterExpiry,
        None => Gate::Open,
    }
}

pub fn next_failure(failed_count_before: i32, now: OffsetDateTime) -> FailureOutcome {
    let failed_count = failed_count_before + 1;
    if failed_count >= MAX_FAILED_ATTEMPTS {
        FailureOutcome::Locked {
            locked_until: now + Duration::minutes(LOCKOUT_MINUTES),
        }
    } else {
        FailureOutcome::Counted {
            failed_count,
            attempts_left: MAX_FAILED_ATTEMPTS - failed_count,
        }
    }
}

/// Rounded up so the client is never told zero minutes while still locked.
fn minutes_remaining(until: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let seconds = (until - now).whole_seconds().max(0);
    (seconds + 59) / 60
}
