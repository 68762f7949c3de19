//! Identifier validation
//!
//! Class, attribute, relationship-kind and snapshot names all share one rule:
//! 2 to 50 unaccented Latin letters, nothing else. Mixed case is accepted here;
//! registries lowercase class and attribute names before storing them.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Shortest accepted name, in characters
pub const MIN_NAME_LEN: usize = 2;
/// Longest accepted name, in characters
pub const MAX_NAME_LEN: usize = 50;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z]+$").expect("name pattern compiles"))
}

/// Outcome of validating a candidate name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    NotAString,
    InvalidLength,
    InvalidCharacters,
}

impl ValidationResult {
    pub fn is_valid(self) -> bool {
        self == ValidationResult::Valid
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValidationResult::Valid => "valid input",
            ValidationResult::NotAString => "input must be a string",
            ValidationResult::InvalidLength => "length must be between 2 and 50 characters",
            ValidationResult::InvalidCharacters => "only alphabet characters are allowed",
        };
        f.write_str(msg)
    }
}

/// The single name policy shared by every registry
pub struct NameValidator;

impl NameValidator {
    /// Validate a textual candidate
    pub fn validate(candidate: &str) -> ValidationResult {
        let len = candidate.chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return ValidationResult::InvalidLength;
        }
        if !name_pattern().is_match(candidate) {
            return ValidationResult::InvalidCharacters;
        }
        ValidationResult::Valid
    }

    /// Validate an untyped JSON value; anything but a string is `NotAString`
    pub fn validate_value(candidate: &Value) -> ValidationResult {
        match candidate {
            Value::String(s) => Self::validate(s),
            _ => ValidationResult::NotAString,
        }
    }
}
