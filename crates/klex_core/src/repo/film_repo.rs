//! Film repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist films with their category and artist credits.
//! - Cascade film deletion through linked media files.
//!
//! # Invariants
//! - Category and artist credits are replaced wholesale on every write.
//! - A `(title, year)` rename reads/deletes children under the previous key,
//!   re-inserts them under the new key and repoints file links.
//! - `delete_film` removes linked files (with their flux), every credit and
//!   category row, then the film row, in that order.

use crate::model::{Artist, ArtistCredit, ArtistId, ArtistRole, FileId, Film, FilmCategory, FilmKey};
use crate::repo::artist_repo::{parse_artist_row, ARTIST_COLUMNS};
use crate::repo::media_repo::{
    ensure_file_unlinked, linked_file_ids_for_film, MediaFileRepository,
    SqliteMediaFileRepository,
};
use crate::repo::sync::{plan_child_sync, ChildSync};
use crate::repo::{get_u32, RepoResult};
use crate::session::ConnectionSession;
use log::{debug, info, warn};
use rusqlite::{params, Row};
use std::collections::HashMap;
use std::sync::Arc;

const FILM_SELECT_SQL: &str = "SELECT
    title,
    year,
    abstract,
    recommended_age,
    poster_url
FROM Film";

/// Child key of one film credit row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FilmCreditKey {
    Participant(ArtistId),
    Actor(ArtistId, String),
}

/// Repository interface for films.
pub trait FilmRepository {
    /// Lists films hydrated with categories and credits.
    fn list_films(&self) -> RepoResult<Vec<Film>>;
    fn get_film(&self, key: &FilmKey) -> RepoResult<Option<Film>>;
    /// Inserts the film row, then its categories and credits.
    fn add_film(&self, film: &Film) -> RepoResult<()>;
    /// Updates the row keyed by `previous_key`; returns matched rows.
    fn update_film(&self, previous_key: &FilmKey, film: &Film) -> RepoResult<usize>;
    /// Replaces the persisted category set with `film.categories`.
    fn update_film_categories(&self, film: &Film) -> RepoResult<()>;
    /// Replaces persisted participants and actors with `film.artists`.
    fn update_film_artists(&self, film: &Film) -> RepoResult<()>;
    fn list_film_categories(&self, key: &FilmKey) -> RepoResult<Vec<FilmCategory>>;
    /// Plain participants only.
    fn list_film_artists(&self, key: &FilmKey) -> RepoResult<Vec<ArtistCredit>>;
    /// Actors with their character names.
    fn list_film_actors(&self, key: &FilmKey) -> RepoResult<Vec<ArtistCredit>>;
    fn add_file_to_film(&self, file_id: FileId, key: &FilmKey) -> RepoResult<()>;
    /// Cascading delete; returns deleted film rows.
    fn delete_film(&self, key: &FilmKey) -> RepoResult<usize>;
}

/// SQLite-backed film repository.
pub struct SqliteFilmRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteFilmRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }

    fn hydrate(&self, mut film: Film) -> RepoResult<Film> {
        let key = film.key();
        film.categories = self.list_film_categories(&key)?;
        film.artists = self.load_credits(&key)?;
        Ok(film)
    }

    fn load_credits(&self, key: &FilmKey) -> RepoResult<Vec<ArtistCredit>> {
        let participants: Vec<Artist> = self.session.query(
            &format!(
                "SELECT {ARTIST_COLUMNS}
                 FROM Participates_in_Film p
                 INNER JOIN Artist ON Artist.id = p.artist_id
                 WHERE p.film_title = ?1 AND p.film_year = ?2
                 ORDER BY Artist.id ASC;"
            ),
            params![key.title, key.year],
            parse_artist_row,
        )?;
        let actors: Vec<(Artist, String)> = self.session.query(
            &format!(
                "SELECT {ARTIST_COLUMNS}, r.character_name
                 FROM Plays_role r
                 INNER JOIN Artist ON Artist.id = r.artist_id
                 WHERE r.film_title = ?1 AND r.film_year = ?2
                 ORDER BY Artist.id ASC, r.character_name ASC;"
            ),
            params![key.title, key.year],
            |row| -> RepoResult<(Artist, String)> {
                Ok((parse_artist_row(row)?, row.get(6)?))
            },
        )?;

        let mut identities: HashMap<ArtistId, Arc<Artist>> = HashMap::new();
        let mut credits = Vec::with_capacity(participants.len() + actors.len());
        for artist in participants {
            let shared = shared_identity(&mut identities, artist);
            credits.push(ArtistCredit::base(shared));
        }
        for (artist, role_name) in actors {
            let shared = shared_identity(&mut identities, artist);
            credits.push(ArtistCredit::actor(shared, role_name));
        }
        Ok(credits)
    }

    fn sync_categories(
        &self,
        read_key: &FilmKey,
        write_key: &FilmKey,
        categories: &[FilmCategory],
    ) -> RepoResult<ChildSync<String>> {
        let current: Vec<String> = self.session.query(
            "SELECT category_name FROM Film_has_Category
             WHERE film_title = ?1 AND film_year = ?2;",
            params![read_key.title, read_key.year],
            |row| -> RepoResult<String> { Ok(row.get(0)?) },
        )?;
        let desired: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        let plan = plan_child_sync(&current, &desired);

        if !plan.to_delete.is_empty() {
            self.session.execute(
                "DELETE FROM Film_has_Category WHERE film_title = ?1 AND film_year = ?2;",
                params![read_key.title, read_key.year],
            )?;
        }
        for name in &plan.to_insert {
            self.session.execute(
                "INSERT INTO Film_has_Category (film_title, film_year, category_name)
                 VALUES (?1, ?2, ?3);",
                params![write_key.title, write_key.year, name],
            )?;
        }
        debug!(
            "event=film_categories_sync module=repo removed={} inserted={}",
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(plan)
    }

    fn sync_credits(
        &self,
        read_key: &FilmKey,
        write_key: &FilmKey,
        credits: &[ArtistCredit],
    ) -> RepoResult<ChildSync<FilmCreditKey>> {
        let mut current: Vec<FilmCreditKey> = self.session.query(
            "SELECT artist_id FROM Participates_in_Film
             WHERE film_title = ?1 AND film_year = ?2;",
            params![read_key.title, read_key.year],
            |row| -> RepoResult<FilmCreditKey> { Ok(FilmCreditKey::Participant(row.get(0)?)) },
        )?;
        current.extend(self.session.query(
            "SELECT artist_id, character_name FROM Plays_role
             WHERE film_title = ?1 AND film_year = ?2;",
            params![read_key.title, read_key.year],
            |row| -> RepoResult<FilmCreditKey> {
                Ok(FilmCreditKey::Actor(row.get(0)?, row.get(1)?))
            },
        )?);

        let desired: Vec<FilmCreditKey> = credits
            .iter()
            .filter_map(|credit| match &credit.role {
                ArtistRole::Base => Some(FilmCreditKey::Participant(credit.artist_id())),
                ArtistRole::AsActor { role_name } => {
                    Some(FilmCreditKey::Actor(credit.artist_id(), role_name.clone()))
                }
                ArtistRole::AsMusician { .. } => None,
            })
            .collect();
        let plan = plan_child_sync(&current, &desired);

        if !plan.to_delete.is_empty() {
            self.session.execute(
                "DELETE FROM Plays_role WHERE film_title = ?1 AND film_year = ?2;",
                params![read_key.title, read_key.year],
            )?;
            self.session.execute(
                "DELETE FROM Participates_in_Film WHERE film_title = ?1 AND film_year = ?2;",
                params![read_key.title, read_key.year],
            )?;
        }
        for credit in &plan.to_insert {
            match credit {
                FilmCreditKey::Participant(artist_id) => self.session.execute(
                    "INSERT INTO Participates_in_Film (artist_id, film_title, film_year)
                     VALUES (?1, ?2, ?3);",
                    params![artist_id, write_key.title, write_key.year],
                )?,
                FilmCreditKey::Actor(artist_id, role_name) => self.session.execute(
                    "INSERT INTO Plays_role (artist_id, film_title, film_year, character_name)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![artist_id, write_key.title, write_key.year, role_name],
                )?,
            };
        }
        debug!(
            "event=film_artists_sync module=repo removed={} inserted={}",
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(plan)
    }
}

impl FilmRepository for SqliteFilmRepository<'_> {
    fn list_films(&self) -> RepoResult<Vec<Film>> {
        let films: Vec<Film> = self.session.query(
            &format!("{FILM_SELECT_SQL} ORDER BY title ASC, year ASC;"),
            [],
            parse_film_row,
        )?;
        films.into_iter().map(|film| self.hydrate(film)).collect()
    }

    fn get_film(&self, key: &FilmKey) -> RepoResult<Option<Film>> {
        let film = self.session.query_optional(
            &format!("{FILM_SELECT_SQL} WHERE title = ?1 AND year = ?2;"),
            params![key.title, key.year],
            parse_film_row,
        )?;
        film.map(|film| self.hydrate(film)).transpose()
    }

    fn add_film(&self, film: &Film) -> RepoResult<()> {
        film.validate()?;
        self.session.execute(
            "INSERT INTO Film (title, year, abstract, recommended_age, poster_url)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                film.title,
                film.year,
                film.summary,
                film.recommended_age,
                film.poster_url,
            ],
        )?;
        let key = film.key();
        self.sync_categories(&key, &key, &film.categories)?;
        self.sync_credits(&key, &key, &film.artists)?;
        Ok(())
    }

    fn update_film(&self, previous_key: &FilmKey, film: &Film) -> RepoResult<usize> {
        film.validate()?;
        let changed = self.session.execute(
            "UPDATE Film
             SET
                title = ?1,
                year = ?2,
                abstract = ?3,
                recommended_age = ?4,
                poster_url = ?5
             WHERE title = ?6 AND year = ?7;",
            params![
                film.title,
                film.year,
                film.summary,
                film.recommended_age,
                film.poster_url,
                previous_key.title,
                previous_key.year,
            ],
        )?;
        if changed == 0 {
            warn!("event=film_update module=repo status=stale_key matched=0");
            return Ok(0);
        }

        let key = film.key();
        if *previous_key != key {
            self.session.execute(
                "UPDATE File_concerns_Film
                 SET film_title = ?1, film_year = ?2
                 WHERE film_title = ?3 AND film_year = ?4;",
                params![key.title, key.year, previous_key.title, previous_key.year],
            )?;
        }
        self.sync_categories(previous_key, &key, &film.categories)?;
        self.sync_credits(previous_key, &key, &film.artists)?;
        Ok(changed)
    }

    fn update_film_categories(&self, film: &Film) -> RepoResult<()> {
        film.validate()?;
        let key = film.key();
        self.sync_categories(&key, &key, &film.categories)?;
        Ok(())
    }

    fn update_film_artists(&self, film: &Film) -> RepoResult<()> {
        film.validate()?;
        let key = film.key();
        self.sync_credits(&key, &key, &film.artists)?;
        Ok(())
    }

    fn list_film_categories(&self, key: &FilmKey) -> RepoResult<Vec<FilmCategory>> {
        self.session.query(
            "SELECT category_name FROM Film_has_Category
             WHERE film_title = ?1 AND film_year = ?2
             ORDER BY category_name ASC;",
            params![key.title, key.year],
            |row| Ok(FilmCategory::new(row.get::<_, String>(0)?)),
        )
    }

    fn list_film_artists(&self, key: &FilmKey) -> RepoResult<Vec<ArtistCredit>> {
        Ok(self
            .load_credits(key)?
            .into_iter()
            .filter(|credit| credit.role == ArtistRole::Base)
            .collect())
    }

    fn list_film_actors(&self, key: &FilmKey) -> RepoResult<Vec<ArtistCredit>> {
        Ok(self
            .load_credits(key)?
            .into_iter()
            .filter(|credit| matches!(credit.role, ArtistRole::AsActor { .. }))
            .collect())
    }

    fn add_file_to_film(&self, file_id: FileId, key: &FilmKey) -> RepoResult<()> {
        ensure_file_unlinked(self.session, file_id)?;
        self.session.execute(
            "INSERT INTO File_concerns_Film (file_id, film_title, film_year)
             VALUES (?1, ?2, ?3);",
            params![file_id, key.title, key.year],
        )?;
        Ok(())
    }

    fn delete_film(&self, key: &FilmKey) -> RepoResult<usize> {
        let files = SqliteMediaFileRepository::new(self.session);
        let file_ids = linked_file_ids_for_film(self.session, key)?;
        for file_id in &file_ids {
            files.delete_media_file(*file_id)?;
        }

        for table in ["Film_has_Category", "Participates_in_Film", "Plays_role"] {
            self.session.execute(
                &format!("DELETE FROM {table} WHERE film_title = ?1 AND film_year = ?2;"),
                params![key.title, key.year],
            )?;
        }
        let changed = self.session.execute(
            "DELETE FROM Film WHERE title = ?1 AND year = ?2;",
            params![key.title, key.year],
        )?;
        info!(
            "event=film_delete module=repo status=ok files_removed={} matched={}",
            file_ids.len(),
            changed
        );
        Ok(changed)
    }
}

fn parse_film_row(row: &Row<'_>) -> RepoResult<Film> {
    Ok(Film {
        title: row.get("title")?,
        year: row.get("year")?,
        summary: row.get("abstract")?,
        recommended_age: get_u32(row, "recommended_age")?,
        poster_url: row.get("poster_url")?,
        categories: Vec::new(),
        artists: Vec::new(),
    })
}

/// Returns the one `Arc` kept for `artist.id` within a hydration pass.
pub(crate) fn shared_identity(
    identities: &mut HashMap<ArtistId, Arc<Artist>>,
    artist: Artist,
) -> Arc<Artist> {
    Arc::clone(
        identities
            .entry(artist.id)
            .or_insert_with(|| Arc::new(artist)),
    )
}
