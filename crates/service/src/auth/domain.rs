use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::AuthError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Registered account. The password hash never leaves the service/store boundary.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Row handed to the store; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Length bounds applied before any store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRules {
    pub username_min: usize,
    pub username_max: usize,
    pub password_min: usize,
    pub password_max: usize,
}

impl Default for InputRules {
    fn default() -> Self {
        Self { username_min: 2, username_max: 32, password_min: 6, password_max: 128 }
    }
}

impl From<&configs::AuthSettings> for InputRules {
    fn from(s: &configs::AuthSettings) -> Self {
        Self {
            username_min: s.username_min_len,
            username_max: s.username_max_len,
            password_min: s.password_min_len,
            password_max: s.password_max_len,
        }
    }
}

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterInput {
    /// Trim identity fields and lower-case the email.
    pub fn sanitize(&mut self) {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self, rules: &InputRules) -> Result<(), AuthError> {
        check_len("username", &self.username, rules.username_min, rules.username_max)?;
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("email: not valid".into()));
        }
        check_len("password", &self.password, rules.password_min, rules.password_max)?;
        if self.password != self.confirm_password {
            return Err(AuthError::Validation("confirm_password: must match the password".into()));
        }
        Ok(())
    }
}

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn sanitize(&mut self) {
        self.email = self.email.trim().to_lowercase();
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("email: not valid".into()));
        }
        if self.password.is_empty() {
            return Err(AuthError::Validation("password: required".into()));
        }
        Ok(())
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), AuthError> {
    let len = value.chars().count();
    if len < min {
        return Err(AuthError::Validation(format!("{field}: not long enough, ({min}) characters at least")));
    }
    if len > max {
        return Err(AuthError::Validation(format!("{field}: too long, ({max}) characters at most")));
    }
    Ok(())
}

/// Successful register/login outcome.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResult {
    pub user: User,
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str, confirm: &str) -> RegisterInput {
        RegisterInput {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("mo@mail.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("mo"));
        assert!(!is_valid_email("mo@"));
        assert!(!is_valid_email("@mail.com"));
        assert!(!is_valid_email("mo @mail.com"));
    }

    #[test]
    fn register_rules_name_the_failing_field() {
        let rules = InputRules::default();
        let err = register("M", "mo@mail.com", "password", "password").validate(&rules).unwrap_err();
        assert_eq!(err, AuthError::Validation("username: not long enough, (2) characters at least".into()));

        let long = "x".repeat(33);
        let err = register(&long, "mo@mail.com", "password", "password").validate(&rules).unwrap_err();
        assert!(matches!(err, AuthError::Validation(m) if m.starts_with("username: too long")));

        let err = register("Mo", "mo", "password", "password").validate(&rules).unwrap_err();
        assert_eq!(err, AuthError::Validation("email: not valid".into()));

        let err = register("Mo", "mo@mail.com", "short", "short").validate(&rules).unwrap_err();
        assert!(matches!(err, AuthError::Validation(m) if m.starts_with("password:")));

        let err = register("Mo", "mo@mail.com", "password", "wrong").validate(&rules).unwrap_err();
        assert!(matches!(err, AuthError::Validation(m) if m.starts_with("confirm_password:")));

        assert!(register("Mo", "mo@mail.com", "password", "password").validate(&rules).is_ok());
    }

    #[test]
    fn lengths_count_characters_not_bytes() {
        let rules = InputRules { username_min: 2, username_max: 3, ..InputRules::default() };
        assert!(register("éèê", "mo@mail.com", "password", "password").validate(&rules).is_ok());
    }

    #[test]
    fn sanitize_trims_and_lowercases() {
        let mut input = register("  Mo ", " Mo@Mail.COM ", "p", "p");
        input.sanitize();
        assert_eq!(input.username, "Mo");
        assert_eq!(input.email, "mo@mail.com");

        let mut login = LoginInput { email: " MO@mail.com".into(), password: "x".into() };
        login.sanitize();
        assert_eq!(login.email, "mo@mail.com");
    }

    #[test]
    fn login_requires_password() {
        let input = LoginInput { email: "mo@mail.com".into(), password: String::new() };
        assert!(matches!(input.validate(), Err(AuthError::Validation(_))));
    }

    #[test]
    fn debug_redacts_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "mo".into(),
            email: "mo@mail.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
        };
        let dbg = format!("{user:?}");
        assert!(!dbg.contains("secret"));
        let json = serde_json::to_string(&user).expect("serialize");
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
