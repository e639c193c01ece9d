//! Media files and the encoded streams (flux) they contain.
//!
//! # Responsibility
//! - Define `MediaFile` and its `Flux` children.
//! - Model the flux type detail as a closed tagged variant.
//!
//! # Invariants
//! - A persistable file has an owning user and at least one flux.
//! - Flux ids are unique within one file.
//! - Every flux carries exactly one type detail (video, audio or text).

use crate::model::film::FilmKey;
use crate::model::track::TrackKey;
use crate::model::validation::{
    require_language_code, require_non_blank, require_non_negative, ValidationError,
};
use crate::model::ValidationResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type FileId = i64;

/// Audio bit depth accepted by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSampling {
    Bits16,
    Bits24,
    Bits32,
}

impl AudioSampling {
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits24 => 24,
            Self::Bits32 => 32,
        }
    }

    pub fn from_bits(bits: i64) -> Option<Self> {
        match bits {
            16 => Some(Self::Bits16),
            24 => Some(Self::Bits24),
            32 => Some(Self::Bits32),
            _ => None,
        }
    }
}

/// Discriminant of [`FluxDetail`], also used to name detail tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FluxKind {
    Video,
    Audio,
    Text,
}

/// Type-specific columns of one flux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FluxDetail {
    Video {
        codec: String,
        width: u32,
        height: u32,
    },
    Audio {
        codec: String,
        sampling: AudioSampling,
        language: String,
    },
    Text {
        codec: String,
        language: String,
    },
}

impl FluxDetail {
    pub fn kind(&self) -> FluxKind {
        match self {
            Self::Video { .. } => FluxKind::Video,
            Self::Audio { .. } => FluxKind::Audio,
            Self::Text { .. } => FluxKind::Text,
        }
    }

    pub fn codec(&self) -> &str {
        match self {
            Self::Video { codec, .. } | Self::Audio { codec, .. } | Self::Text { codec, .. } => {
                codec
            }
        }
    }
}

/// One encoded stream; its file id is the owning `MediaFile::id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flux {
    pub flux_id: i64,
    pub data_rate: u32,
    pub detail: FluxDetail,
}

impl Flux {
    pub fn video(flux_id: i64, data_rate: u32, codec: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            flux_id,
            data_rate,
            detail: FluxDetail::Video {
                codec: codec.into(),
                width,
                height,
            },
        }
    }

    pub fn audio(
        flux_id: i64,
        data_rate: u32,
        codec: impl Into<String>,
        sampling: AudioSampling,
        language: impl Into<String>,
    ) -> Self {
        Self {
            flux_id,
            data_rate,
            detail: FluxDetail::Audio {
                codec: codec.into(),
                sampling,
                language: language.into(),
            },
        }
    }

    pub fn text(flux_id: i64, data_rate: u32, codec: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            flux_id,
            data_rate,
            detail: FluxDetail::Text {
                codec: codec.into(),
                language: language.into(),
            },
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative("flux", "flux_id", self.flux_id)?;
        require_non_blank("flux", "codec", self.detail.codec())?;
        match &self.detail {
            FluxDetail::Video { .. } => Ok(()),
            FluxDetail::Audio { language, .. } | FluxDetail::Text { language, .. } => {
                require_language_code("flux", "language", language)
            }
        }
    }
}

/// What a media file is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum MediaTarget {
    Film(FilmKey),
    Track(TrackKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: FileId,
    /// Size in bytes.
    pub size: i64,
    pub added_date: NaiveDate,
    /// Owning user; required before the file can be persisted.
    pub user_email: Option<String>,
    pub flux: Vec<Flux>,
}

impl MediaFile {
    pub fn new(id: FileId, size: i64, added_date: NaiveDate, user_email: impl Into<String>) -> Self {
        Self {
            id,
            size,
            added_date,
            user_email: Some(user_email.into()),
            flux: Vec::new(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_negative("media_file", "id", self.id)?;
        require_non_negative("media_file", "size", self.size)?;
        match self.user_email.as_deref() {
            Some(email) if !email.trim().is_empty() => {}
            _ => {
                return Err(ValidationError::new(
                    "media_file",
                    "user_email",
                    "user must be specified",
                ));
            }
        }
        if self.flux.is_empty() {
            return Err(ValidationError::new(
                "media_file",
                "flux",
                "add at least one flux",
            ));
        }
        let mut seen = HashSet::new();
        for flux in &self.flux {
            if !seen.insert(flux.flux_id) {
                return Err(ValidationError::new(
                    "media_file",
                    "flux",
                    format!("flux id {} already exists in file", flux.flux_id),
                ));
            }
            flux.validate()?;
        }
        Ok(())
    }
}
