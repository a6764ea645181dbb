use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

pub const PASSWORD_MIN_LEN: usize = 8;

/// Trim and lower-case an email so lookups match however it was typed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Problems with a password, empty when it is strong enough.
pub fn password_problems(password: &str) -> Vec<&'static str> {
    let mut problems = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        problems.push("at least 8 characters");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        problems.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        problems.push("an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("a digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        problems.push("a symbol");
    }
    problems
}

/// Collects per-field messages for a single `VALIDATION_ERROR` response.
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    /// Record `field` as missing when the value is absent or blank, returning
    /// the trimmed value otherwise.
    pub fn require(&mut self, field: &str, value: Option<&str>) -> String {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => {
                self.add(field, "This field is required");
                String::new()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}
