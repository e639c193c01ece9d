//! Film aggregate: base row plus category and artist credits.

use crate::model::artist::{ArtistCredit, ArtistRole};
use crate::model::category::FilmCategory;
use crate::model::validation::{require_non_blank, require_non_negative, ValidationError};
use crate::model::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Composite natural key `(title, year)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilmKey {
    pub title: String,
    pub year: i32,
}

impl FilmKey {
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

impl Display for FilmKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Film {
    pub title: String,
    pub year: i32,
    pub summary: Option<String>,
    pub recommended_age: u32,
    pub poster_url: Option<String>,
    pub categories: Vec<FilmCategory>,
    /// Plain participants and actors; musician credits are rejected.
    pub artists: Vec<ArtistCredit>,
}

impl Film {
    pub fn new(title: impl Into<String>, year: i32) -> Self {
        Self {
            title: title.into(),
            year,
            summary: None,
            recommended_age: 0,
            poster_url: None,
            categories: Vec::new(),
            artists: Vec::new(),
        }
    }

    pub fn key(&self) -> FilmKey {
        FilmKey::new(self.title.clone(), self.year)
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_blank("film", "title", &self.title)?;
        require_non_negative("film", "year", i64::from(self.year))?;
        for category in &self.categories {
            category.validate()?;
        }
        for credit in &self.artists {
            credit.artist.validate()?;
            match &credit.role {
                ArtistRole::Base => {}
                ArtistRole::AsActor { role_name } => {
                    require_non_blank("film", "artists.role_name", role_name)?;
                }
                ArtistRole::AsMusician { .. } => {
                    return Err(ValidationError::new(
                        "film",
                        "artists",
                        "musician credits belong to tracks",
                    ));
                }
            }
        }
        Ok(())
    }
}
