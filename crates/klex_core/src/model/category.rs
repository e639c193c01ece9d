//! Value entities compared by name: film/music categories and codec kinds.

use crate::model::validation::require_non_blank;
use crate::model::ValidationResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilmCategory {
    pub name: String,
}

impl FilmCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_blank("film_category", "name", &self.name)
    }
}

/// Category shared by albums and tracks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MusicCategory {
    pub name: String,
}

impl MusicCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_blank("music_category", "name", &self.name)
    }
}

/// Reference codec table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    Video,
    Audio,
    Text,
}
