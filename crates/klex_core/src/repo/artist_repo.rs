//! Artist repository contracts and SQLite implementation.
//!
//! # Invariants
//! - An id rename repoints every participation, role and musician row.
//! - Deleting an artist removes its credits before the artist row.

use crate::model::{Artist, ArtistId};
use crate::repo::RepoResult;
use crate::session::ConnectionSession;
use log::warn;
use rusqlite::{params, Row};

pub(crate) const ARTIST_COLUMNS: &str =
    "Artist.id, Artist.name, Artist.picture_url, Artist.main_specialty, Artist.birth_date, Artist.biography";

const CREDIT_TABLES: &[&str] = &["Participates_in_Film", "Plays_role", "Plays_in"];

/// Repository interface for artists.
pub trait ArtistRepository {
    fn list_artists(&self) -> RepoResult<Vec<Artist>>;
    fn get_artist(&self, id: ArtistId) -> RepoResult<Option<Artist>>;
    fn add_artist(&self, artist: &Artist) -> RepoResult<()>;
    /// Updates the row keyed by `previous_id`; returns matched rows.
    fn update_artist(&self, previous_id: ArtistId, artist: &Artist) -> RepoResult<usize>;
    fn delete_artist(&self, id: ArtistId) -> RepoResult<usize>;
}

/// SQLite-backed artist repository.
pub struct SqliteArtistRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteArtistRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }
}

impl ArtistRepository for SqliteArtistRepository<'_> {
    fn list_artists(&self) -> RepoResult<Vec<Artist>> {
        self.session.query(
            &format!("SELECT {ARTIST_COLUMNS} FROM Artist ORDER BY Artist.id ASC;"),
            [],
            parse_artist_row,
        )
    }

    fn get_artist(&self, id: ArtistId) -> RepoResult<Option<Artist>> {
        self.session.query_optional(
            &format!("SELECT {ARTIST_COLUMNS} FROM Artist WHERE Artist.id = ?1;"),
            [id],
            parse_artist_row,
        )
    }

    fn add_artist(&self, artist: &Artist) -> RepoResult<()> {
        artist.validate()?;
        self.session.execute(
            "INSERT INTO Artist (
                id,
                name,
                picture_url,
                main_specialty,
                birth_date,
                biography
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                artist.id,
                artist.name,
                artist.picture_url,
                artist.main_specialty,
                artist.birth_date,
                artist.biography,
            ],
        )?;
        Ok(())
    }

    fn update_artist(&self, previous_id: ArtistId, artist: &Artist) -> RepoResult<usize> {
        artist.validate()?;
        let changed = self.session.execute(
            "UPDATE Artist
             SET
                id = ?1,
                name = ?2,
                picture_url = ?3,
                main_specialty = ?4,
                birth_date = ?5,
                biography = ?6
             WHERE id = ?7;",
            params![
                artist.id,
                artist.name,
                artist.picture_url,
                artist.main_specialty,
                artist.birth_date,
                artist.biography,
                previous_id,
            ],
        )?;
        if changed == 0 {
            warn!("event=artist_update module=repo status=stale_key previous_id={previous_id} matched=0");
            return Ok(0);
        }
        if previous_id != artist.id {
            for table in CREDIT_TABLES {
                self.session.execute(
                    &format!("UPDATE {table} SET artist_id = ?1 WHERE artist_id = ?2;"),
                    params![artist.id, previous_id],
                )?;
            }
        }
        Ok(changed)
    }

    fn delete_artist(&self, id: ArtistId) -> RepoResult<usize> {
        for table in CREDIT_TABLES {
            self.session
                .execute(&format!("DELETE FROM {table} WHERE artist_id = ?1;"), [id])?;
        }
        let changed = self
            .session
            .execute("DELETE FROM Artist WHERE id = ?1;", [id])?;
        Ok(changed)
    }
}

/// Hydrates the `ARTIST_COLUMNS` projection.
pub(crate) fn parse_artist_row(row: &Row<'_>) -> RepoResult<Artist> {
    Ok(Artist {
        id: row.get(0)?,
        name: row.get(1)?,
        picture_url: row.get(2)?,
        main_specialty: row.get(3)?,
        birth_date: row.get(4)?,
        biography: row.get(5)?,
    })
}
