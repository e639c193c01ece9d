//! Artist identity and the roles it can wear in a credit.
//!
//! # Responsibility
//! - Keep one shared `Artist` identity per id.
//! - Model plain / actor / musician participation as a tagged role value.
//!
//! # Invariants
//! - A role is a value: the same artist may be credited several times with
//!   different roles, and every credit points at the same `Arc<Artist>`.

use crate::model::validation::{require_non_blank, require_non_negative};
use crate::model::ValidationResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ArtistId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub picture_url: Option<String>,
    pub main_specialty: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub biography: Option<String>,
}

impl Artist {
    pub fn new(id: ArtistId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            picture_url: None,
            main_specialty: None,
            birth_date: None,
            biography: None,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative("artist", "id", self.id)?;
        require_non_blank("artist", "name", &self.name)
    }
}

/// Capability an artist carries inside one credit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ArtistRole {
    /// Plain participation in a film.
    Base,
    /// Plays a named character in one film.
    AsActor { role_name: String },
    /// Plays an instrument on one track.
    AsMusician { instrument: String },
}

/// One artist wearing one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub artist: Arc<Artist>,
    pub role: ArtistRole,
}

impl ArtistCredit {
    pub fn base(artist: Arc<Artist>) -> Self {
        Self {
            artist,
            role: ArtistRole::Base,
        }
    }

    pub fn actor(artist: Arc<Artist>, role_name: impl Into<String>) -> Self {
        Self {
            artist,
            role: ArtistRole::AsActor {
                role_name: role_name.into(),
            },
        }
    }

    pub fn musician(artist: Arc<Artist>, instrument: impl Into<String>) -> Self {
        Self {
            artist,
            role: ArtistRole::AsMusician {
                instrument: instrument.into(),
            },
        }
    }

    pub fn artist_id(&self) -> ArtistId {
        self.artist.id
    }
}
