//! Entity validation errors shared by every model type.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ValidationResult = Result<(), ValidationError>;

/// One rejected field and the reason it was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: &'static str,
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(entity: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity,
            field,
            reason: reason.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}.{}: {}", self.entity, self.field, self.reason)
    }
}

impl Error for ValidationError {}

/// Rejects blank text fields.
pub(crate) fn require_non_blank(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(entity, field, "cannot be blank"));
    }
    Ok(())
}

/// Rejects negative numeric identifiers and quantities.
pub(crate) fn require_non_negative(
    entity: &'static str,
    field: &'static str,
    value: i64,
) -> ValidationResult {
    if value < 0 {
        return Err(ValidationError::new(entity, field, "must be positive"));
    }
    Ok(())
}

/// Accepts two ASCII letters, e.g. `fr` or `en`.
pub(crate) fn require_language_code(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> ValidationResult {
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::new(
            entity,
            field,
            "use a 2-letter ISO code (e.g. fr, en)",
        ));
    }
    Ok(())
}
