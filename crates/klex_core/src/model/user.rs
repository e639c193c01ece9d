//! Catalog user model.
//!
//! # Invariants
//! - `email` is the natural key and must match a plain address pattern.
//! - `access_code` holds at most 4 digits.
//! - `preferred_language` is a 2-letter ISO code.

use crate::model::validation::{require_language_code, require_non_blank, ValidationError};
use crate::model::ValidationResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$").expect("valid email regex")
});

const ACCESS_CODE_MAX: u16 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub access_code: u16,
    pub preferred_language: String,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: u32,
        access_code: u16,
        preferred_language: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
            access_code,
            preferred_language: preferred_language.into(),
        }
    }

    /// Access code rendered with leading zeros, as shown on forms.
    pub fn access_code_display(&self) -> String {
        format!("{:04}", self.access_code)
    }

    pub fn validate(&self) -> ValidationResult {
        if !EMAIL_RE.is_match(&self.email) {
            return Err(ValidationError::new("user", "email", "invalid address"));
        }
        require_non_blank("user", "first_name", &self.first_name)?;
        require_non_blank("user", "last_name", &self.last_name)?;
        if self.access_code > ACCESS_CODE_MAX {
            return Err(ValidationError::new(
                "user",
                "access_code",
                "cannot contain more than 4 digits",
            ));
        }
        require_language_code("user", "preferred_language", &self.preferred_language)
    }
}
