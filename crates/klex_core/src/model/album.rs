//! Album aggregate with its music categories.

use crate::model::category::MusicCategory;
use crate::model::validation::{require_non_blank, require_non_negative};
use crate::model::ValidationResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type AlbumId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub release_date: Option<NaiveDate>,
    pub cover_url: Option<String>,
    pub artist_name: Option<String>,
    pub categories: Vec<MusicCategory>,
}

impl Album {
    pub fn new(id: AlbumId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            release_date: None,
            cover_url: None,
            artist_name: None,
            categories: Vec::new(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative("album", "id", self.id)?;
        require_non_blank("album", "title", &self.title)?;
        for category in &self.categories {
            category.validate()?;
        }
        Ok(())
    }
}
