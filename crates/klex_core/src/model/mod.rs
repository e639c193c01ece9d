//! In-memory entity graph for the media catalog.
//!
//! # Responsibility
//! - Define the users, categories, artists, films, albums, tracks, media
//!   files and flux hydrated from the store.
//! - Enforce write-time invariants through `validate()`.
//!
//! # Invariants
//! - Natural and composite keys are never mutated in place by the gateway;
//!   renames go through update-with-previous-key.
//! - Child collections (categories, credits, flux) are the full desired set
//!   and replace persisted children wholesale on update.

pub mod album;
pub mod artist;
pub mod category;
pub mod film;
pub mod media;
pub mod track;
pub mod user;
pub mod validation;

pub use album::{Album, AlbumId};
pub use artist::{Artist, ArtistCredit, ArtistId, ArtistRole};
pub use category::{CodecKind, FilmCategory, MusicCategory};
pub use film::{Film, FilmKey};
pub use media::{AudioSampling, FileId, Flux, FluxDetail, FluxKind, MediaFile, MediaTarget};
pub use track::{Track, TrackKey};
pub use user::User;
pub use validation::{ValidationError, ValidationResult};
