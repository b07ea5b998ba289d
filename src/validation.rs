//! Field-level validation primitives for the record schemas.
//!
//! Every record draft exposes a pure `validate` that feeds predicate/message
//! pairs into a [`Violations`] collector. Nothing in here touches storage,
//! so validation always completes before any write is attempted.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

lazy_static! {
    /// Loose email shape, unanchored: `something@something.something`
    pub static ref EMAIL_REGEX: Regex = Regex::new(r"\S+@\S+\.\S+").unwrap();

    /// Customer contact phone: optional leading `+`, then 10-15 digits, spaces, dashes or parens
    pub static ref CONTACT_PHONE_REGEX: Regex = Regex::new(r"^\+?[\d\s\-\(\)]{10,15}$").unwrap();

    /// User phone number: exactly ten digits
    static ref TEN_DIGIT_REGEX: Regex = Regex::new(r"^\d{10}$").unwrap();

    /// Web URL with optional scheme (e.g. `https://cdn.example.com/a.png`, `example.com/a.png`)
    static ref URL_REGEX: Regex = Regex::new(
        r"^(https?://)?[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])?(\.[a-zA-Z0-9]([-a-zA-Z0-9]*[a-zA-Z0-9])?)+(:\d{1,5})?(/[^\s]*)?$"
    ).unwrap();
}

/// Largest count a stored whole-number field can hold
pub const MAX_COUNT: f64 = u32::MAX as f64;

/// One violated constraint, addressed by its dotted JSON path
/// (e.g. `partsRequested.0.quantity`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

/// Ordered collection of violated constraints for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations {
    model: &'static str,
    items: Vec<Violation>,
}

impl Violations {
    pub fn new(model: &'static str) -> Self {
        Self {
            model,
            items: Vec::new(),
        }
    }

    /// Record a violation unconditionally
    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.items.push(Violation {
            path: path.into(),
            message: message.into(),
        });
        self
    }

    /// Record `message` against `path` unless `ok` holds. Returns `ok`.
    pub fn check(&mut self, path: &str, ok: bool, message: impl Into<String>) -> bool {
        if !ok {
            self.add(path, message);
        }
        ok
    }

    /// Presence check. Returns whether the value is present.
    pub fn required<T: ?Sized>(&mut self, path: &str, value: Option<&T>, message: &str) -> bool {
        self.check(path, value.is_some(), message)
    }

    /// Minimum length in characters; absent values pass.
    pub fn min_len(&mut self, path: &str, value: Option<&str>, min: usize, message: &str) -> bool {
        match value {
            Some(v) => self.check(path, v.chars().count() >= min, message),
            None => true,
        }
    }

    /// Maximum length in characters; absent values pass.
    pub fn max_len(&mut self, path: &str, value: Option<&str>, max: usize, message: &str) -> bool {
        match value {
            Some(v) => self.check(path, v.chars().count() <= max, message),
            None => true,
        }
    }

    /// Enum membership for a raw label; absent values pass.
    pub fn one_of<E: std::str::FromStr>(
        &mut self,
        path: &str,
        value: Option<&str>,
        message: &str,
    ) -> bool {
        match value {
            Some(v) => self.check(path, v.parse::<E>().is_ok(), message),
            None => true,
        }
    }

    /// Lower bound for a numeric field; absent values pass.
    pub fn min_value(&mut self, path: &str, value: Option<f64>, min: f64, message: &str) -> bool {
        match value {
            Some(v) => self.check(path, v >= min, message),
            None => true,
        }
    }

    /// Upper bound for a numeric field; absent values pass.
    pub fn max_value(&mut self, path: &str, value: Option<f64>, max: f64, message: &str) -> bool {
        match value {
            Some(v) => self.check(path, v <= max, message),
            None => true,
        }
    }

    /// Integer check for a numeric field; absent values pass.
    pub fn whole_number(&mut self, path: &str, value: Option<f64>, message: &str) -> bool {
        match value {
            Some(v) => self.check(path, is_whole(v), message),
            None => true,
        }
    }

    /// Merge violations collected under a nested prefix (e.g. a remark at index 2)
    pub fn extend_prefixed(&mut self, prefix: &str, other: Violations) {
        for v in other.items {
            self.add(format!("{}.{}", prefix, v.path), v.message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter()
    }

    /// Whether any violation was recorded against `path`
    pub fn has(&self, path: &str) -> bool {
        self.items.iter().any(|v| v.path == path)
    }

    /// `Ok(())` when nothing was violated
    pub fn finish(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation failed: ", self.model)?;
        let parts: Vec<String> = self
            .items
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for Violations {}

pub fn is_whole(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0
}

pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

pub fn is_contact_phone(value: &str) -> bool {
    CONTACT_PHONE_REGEX.is_match(value)
}

pub fn is_ten_digit_number(value: &str) -> bool {
    TEN_DIGIT_REGEX.is_match(value)
}

pub fn is_url(value: &str) -> bool {
    value.len() <= 2048 && URL_REGEX.is_match(value)
}

/// Trim, treating blank strings as absent
pub fn tidy(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim and uppercase, treating blank strings as absent
pub fn tidy_upper(value: Option<String>) -> Option<String> {
    tidy(value).map(|v| v.to_uppercase())
}

/// Trim and lowercase, treating blank strings as absent
pub fn tidy_lower(value: Option<String>) -> Option<String> {
    tidy(value).map(|v| v.to_lowercase())
}
