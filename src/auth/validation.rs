use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldError;

const EMAIL_MAX_LEN: usize = 254;
const PASSWORD_MIN_LEN: usize = 8;
const PASSWORD_MAX_LEN: usize = 128;
const NAME_MIN_LEN: usize = 2;
const NAME_MAX_LEN: usize = 100;

/// The symbol set a password must draw at least one character from.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:'\",.<>?/`~\\";

lazy_static! {
    static ref EMAIL_CHARSET_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+$").unwrap();
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
        return;
    }
    if email.len() > EMAIL_MAX_LEN {
        errors.push(FieldError::new(
            "email",
            format!("Email must be at most {EMAIL_MAX_LEN} characters"),
        ));
    }
    if email.matches('@').count() != 1 {
        errors.push(FieldError::new(
            "email",
            "Email must contain exactly one @",
        ));
        return;
    }
    let (local, domain) = email.split_once('@').expect("checked above");
    if local.is_empty() {
        errors.push(FieldError::new("email", "Email local part is empty"));
    }
    if !domain.contains('.') {
        errors.push(FieldError::new("email", "Email domain must contain a dot"));
    }
    if !EMAIL_CHARSET_RE.is_match(email) {
        errors.push(FieldError::new("email", "Email contains invalid characters"));
    }
}

fn check_password(field: &str, password: &str, errors: &mut Vec<FieldError>) {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN || len > PASSWORD_MAX_LEN {
        errors.push(FieldError::new(
            field,
            format!("Password must be {PASSWORD_MIN_LEN}-{PASSWORD_MAX_LEN} characters"),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push(FieldError::new(
            field,
            "Password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push(FieldError::new(
            field,
            "Password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(field, "Password must contain a digit"));
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        errors.push(FieldError::new(
            field,
            "Password must contain a symbol (e.g. !@#$%)",
        ));
    }
}

fn check_full_name(full_name: &str, errors: &mut Vec<FieldError>) {
    let len = full_name.chars().count();
    if len < NAME_MIN_LEN || len > NAME_MAX_LEN {
        errors.push(FieldError::new(
            "full_name",
            format!("Full name must be {NAME_MIN_LEN}-{NAME_MAX_LEN} characters"),
        ));
    }
    if !full_name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        errors.push(FieldError::new(
            "full_name",
            "Full name may only contain letters and spaces",
        ));
    }
}

/// Validate a registration request. All failures are collected so the
/// client can fix every field in a single round trip.
pub fn validate_registration(
    email: &str,
    password: &str,
    confirm_password: &str,
    full_name: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_email(email, &mut errors);
    check_password("password", password, &mut errors);
    if password != confirm_password {
        errors.push(FieldError::new(
            "confirm_password",
            "Passwords do not match",
        ));
    }
    check_full_name(full_name, &mut errors);
    errors
}

/// Same password policy as registration, applied to a reset request.
pub fn validate_new_password(password: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_password("new_password", password, &mut errors);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_registration_has_no_errors() {
        let errors = validate_registration("a@b.com", "Abcdef1!", "Abcdef1!", "Jane Doe");
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn all_failures_are_collected_at_once() {
        let errors = validate_registration("not-an-email", "weak", "other", "X1");
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
        assert!(fields.contains(&"confirm_password"));
        assert!(fields.contains(&"full_name"));
    }

    #[test]
    fn email_rules() {
        let bad = |email: &str| {
            let mut errors = Vec::new();
            check_email(email, &mut errors);
            !errors.is_empty()
        };
        assert!(bad(""));
        assert!(bad("a@b@c.com"));
        assert!(bad("@example.com"));
        assert!(bad("user@nodomain"));
        assert!(bad("user name@example.com"));
        assert!(bad(&format!("{}@example.com", "a".repeat(250))));
        assert!(!bad("jane.doe+test@example.co.uk"));
    }

    #[test]
    fn password_rules() {
        let failing = |pw: &str| {
            let mut errors = Vec::new();
            check_password("password", pw, &mut errors);
            errors
        };
        assert!(failing("Abcdef1!").is_empty());
        assert!(!failing("abcdef1!").is_empty()); // no uppercase
        assert!(!failing("ABCDEF1!").is_empty()); // no lowercase
        assert!(!failing("Abcdefg!").is_empty()); // no digit
        assert!(!failing("Abcdefg1").is_empty()); // no symbol
        assert!(!failing("Ab1!").is_empty()); // too short
        let long = format!("Aa1!{}", "x".repeat(130));
        assert!(!failing(&long).is_empty()); // too long
    }

    #[test]
    fn password_length_counts_characters_not_bytes() {
        // 7 characters, 8 bytes: must still fail the minimum length.
        let mut errors = Vec::new();
        check_password("password", "Päss12!", &mut errors);
        assert!(errors
            .iter()
            .any(|e| e.message.contains(&format!("{PASSWORD_MIN_LEN}-{PASSWORD_MAX_LEN}"))));
    }

    #[test]
    fn full_name_rules() {
        let failing = |name: &str| {
            let mut errors = Vec::new();
            check_full_name(name, &mut errors);
            errors
        };
        assert!(failing("Jane Doe").is_empty());
        assert!(!failing("J").is_empty());
        assert!(!failing("Jane123").is_empty());
        assert!(!failing(&"a".repeat(101)).is_empty());
    }

    #[test]
    fn reset_password_uses_same_policy() {
        assert!(validate_new_password("Abcdef1!").is_empty());
        let errors = validate_new_password("weak");
        assert!(errors.iter().all(|e| e.field == "new_password"));
        assert!(!errors.is_empty());
    }
}
