//! Per-user catalog listings.
//!
//! Films are filtered by category, the user's age and a file carrying an
//! audio or text flux in the user's preferred language. Tracks are filtered
//! by category and an audio flux in that language.

use crate::model::{Film, FilmKey, Track, TrackKey};
use crate::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use crate::repo::track_repo::{SqliteTrackRepository, TrackRepository};
use crate::repo::RepoResult;
use crate::session::ConnectionSession;
use log::debug;
use rusqlite::params;

pub trait DiscoveryRepository {
    fn films_for_user(&self, email: &str, category: &str) -> RepoResult<Vec<Film>>;
    fn tracks_for_user(&self, email: &str, category: &str) -> RepoResult<Vec<Track>>;
}

pub struct SqliteDiscoveryRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteDiscoveryRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }
}

impl DiscoveryRepository for SqliteDiscoveryRepository<'_> {
    fn films_for_user(&self, email: &str, category: &str) -> RepoResult<Vec<Film>> {
        let keys: Vec<FilmKey> = self.session.query(
            "SELECT f.title, f.year
             FROM Film f
             INNER JOIN Film_has_Category fc
                ON fc.film_title = f.title AND fc.film_year = f.year
             INNER JOIN User u ON u.email = ?1
             WHERE fc.category_name = ?2
               AND f.recommended_age <= u.age
               AND EXISTS (
                   SELECT 1
                   FROM File_concerns_Film link
                   LEFT JOIN AudioFlux a ON a.file_id = link.file_id
                   LEFT JOIN TextFlux t ON t.file_id = link.file_id
                   WHERE link.film_title = f.title
                     AND link.film_year = f.year
                     AND (a.language = u.preferred_language
                          OR t.language = u.preferred_language)
               )
             ORDER BY f.title ASC, f.year ASC;",
            params![email, category],
            |row| -> RepoResult<FilmKey> {
                Ok(FilmKey::new(row.get::<_, String>(0)?, row.get(1)?))
            },
        )?;
        debug!(
            "event=films_for_user module=repo status=ok matched={}",
            keys.len()
        );

        let films = SqliteFilmRepository::new(self.session);
        let mut hydrated = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(film) = films.get_film(key)? {
                hydrated.push(film);
            }
        }
        Ok(hydrated)
    }

    fn tracks_for_user(&self, email: &str, category: &str) -> RepoResult<Vec<Track>> {
        let keys: Vec<TrackKey> = self.session.query(
            "SELECT tr.album_id, tr.track_id
             FROM Track tr
             INNER JOIN Track_has_Category tc
                ON tc.album_id = tr.album_id AND tc.track_id = tr.track_id
             INNER JOIN User u ON u.email = ?1
             WHERE tc.category_name = ?2
               AND EXISTS (
                   SELECT 1
                   FROM File_concerns_Track link
                   INNER JOIN AudioFlux a ON a.file_id = link.file_id
                   WHERE link.album_id = tr.album_id
                     AND link.track_id = tr.track_id
                     AND a.language = u.preferred_language
               )
             ORDER BY tr.album_id ASC, tr.track_id ASC;",
            params![email, category],
            |row| -> RepoResult<TrackKey> { Ok(TrackKey::new(row.get(0)?, row.get(1)?)) },
        )?;
        debug!(
            "event=tracks_for_user module=repo status=ok matched={}",
            keys.len()
        );

        let tracks = SqliteTrackRepository::new(self.session);
        let mut hydrated = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(track) = tracks.get_track(key)? {
                hydrated.push(track);
            }
        }
        Ok(hydrated)
    }
}
