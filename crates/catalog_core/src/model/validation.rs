//! Field-level validation rules shared by all catalog entities.
//!
//! # Invariants
//! - Identifiers are opaque, caller-supplied and limited to ASCII
//!   alphanumerics plus `-` and `_`.
//! - Display names are non-blank after trim.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest identifier accepted by write paths and filters.
pub const MAX_ID_LEN: usize = 64;
/// Longest display name accepted by write paths.
pub const MAX_NAME_CHARS: usize = 256;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid identifier regex"));

/// Input rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValidationError {
    /// Identifier is empty, too long or contains unsupported characters.
    InvalidIdentifier { field: &'static str, value: String },
    /// Name is blank after trim.
    BlankName { field: &'static str },
    /// Name exceeds [`MAX_NAME_CHARS`].
    NameTooLong { field: &'static str, chars: usize },
    /// Price is negative, NaN or infinite.
    InvalidPrice(f64),
    /// Category references itself as parent.
    SelfParent(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { field, value } => {
                write!(f, "invalid identifier `{value}` for {field}")
            }
            Self::BlankName { field } => write!(f, "{field} must not be blank"),
            Self::NameTooLong { field, chars } => write!(
                f,
                "{field} has {chars} chars; at most {MAX_NAME_CHARS} allowed"
            ),
            Self::InvalidPrice(price) => write!(f, "price must be finite and >= 0, got {price}"),
            Self::SelfParent(id) => write!(f, "category {id} cannot be its own parent"),
        }
    }
}

impl Error for ModelValidationError {}

/// Returns whether `value` has the accepted identifier shape.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_ID_LEN && IDENTIFIER_RE.is_match(value)
}

pub(crate) fn validate_identifier(
    field: &'static str,
    value: &str,
) -> Result<(), ModelValidationError> {
    if is_valid_identifier(value) {
        Ok(())
    } else {
        Err(ModelValidationError::InvalidIdentifier {
            field,
            value: value.to_string(),
        })
    }
}

pub(crate) fn validate_name(field: &'static str, value: &str) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankName { field });
    }
    let chars = value.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(ModelValidationError::NameTooLong { field, chars });
    }
    Ok(())
}
