//! Track aggregate: belongs to one album, carries categories and musicians.

use crate::model::album::{Album, AlbumId};
use crate::model::artist::{ArtistCredit, ArtistRole};
use crate::model::category::MusicCategory;
use crate::model::validation::{require_non_blank, require_non_negative, ValidationError};
use crate::model::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Composite natural key `(album_id, track_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackKey {
    pub album_id: AlbumId,
    pub track_id: i64,
}

impl TrackKey {
    pub fn new(album_id: AlbumId, track_id: i64) -> Self {
        Self { album_id, track_id }
    }
}

impl Display for TrackKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.album_id, self.track_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub album_id: AlbumId,
    pub track_id: i64,
    pub title: String,
    /// Length in seconds.
    pub length: u32,
    pub categories: Vec<MusicCategory>,
    /// Musician credits only.
    pub artists: Vec<ArtistCredit>,
    /// Owning album, fetched lazily by `TrackRepository::load_album`.
    pub album: Option<Album>,
}

impl Track {
    pub fn new(album_id: AlbumId, track_id: i64, title: impl Into<String>) -> Self {
        Self {
            album_id,
            track_id,
            title: title.into(),
            length: 0,
            categories: Vec::new(),
            artists: Vec::new(),
            album: None,
        }
    }

    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.album_id, self.track_id)
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative("track", "album_id", self.album_id)?;
        require_non_negative("track", "track_id", self.track_id)?;
        require_non_blank("track", "title", &self.title)?;
        for category in &self.categories {
            category.validate()?;
        }
        for credit in &self.artists {
            credit.artist.validate()?;
            match &credit.role {
                ArtistRole::AsMusician { instrument } => {
                    require_non_blank("track", "artists.instrument", instrument)?;
                }
                _ => {
                    return Err(ValidationError::new(
                        "track",
                        "artists",
                        "only musician credits belong to tracks",
                    ));
                }
            }
        }
        Ok(())
    }
}
