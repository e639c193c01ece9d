//! Track repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist tracks with their music categories and musician credits.
//! - Fetch the owning album on demand.
//!
//! # Invariants
//! - Categories and musicians are replaced wholesale on every write.
//! - A key rename reads/deletes children under the previous key and
//!   re-inserts them under the new key.
//! - `delete_track` removes linked files before the track's own rows.

use crate::model::{Album, Artist, ArtistCredit, ArtistId, ArtistRole, FileId, MusicCategory, Track, TrackKey};
use crate::repo::album_repo::{AlbumRepository, SqliteAlbumRepository};
use crate::repo::artist_repo::{parse_artist_row, ARTIST_COLUMNS};
use crate::repo::film_repo::shared_identity;
use crate::repo::media_repo::{
    ensure_file_unlinked, linked_file_ids_for_track, MediaFileRepository,
    SqliteMediaFileRepository,
};
use crate::repo::sync::plan_child_sync;
use crate::repo::{get_u32, RepoResult};
use crate::session::ConnectionSession;
use log::{debug, info, warn};
use rusqlite::{params, Row};
use std::collections::HashMap;
use std::sync::Arc;

const TRACK_SELECT_SQL: &str = "SELECT
    album_id,
    track_id,
    title,
    length
FROM Track";

/// Repository interface for tracks.
pub trait TrackRepository {
    /// Lists tracks hydrated with categories and musicians; albums stay unloaded.
    fn list_tracks(&self) -> RepoResult<Vec<Track>>;
    fn get_track(&self, key: &TrackKey) -> RepoResult<Option<Track>>;
    /// Fetches `track.album` on first access and returns it.
    fn load_album<'t>(&self, track: &'t mut Track) -> RepoResult<Option<&'t Album>>;
    fn add_track(&self, track: &Track) -> RepoResult<()>;
    /// Updates the row keyed by `previous_key`; returns matched rows.
    fn update_track(&self, previous_key: &TrackKey, track: &Track) -> RepoResult<usize>;
    fn update_track_categories(&self, track: &Track) -> RepoResult<()>;
    fn update_track_artists(&self, track: &Track) -> RepoResult<()>;
    fn add_file_to_track(&self, file_id: FileId, key: &TrackKey) -> RepoResult<()>;
    /// Cascading delete; returns deleted track rows.
    fn delete_track(&self, key: &TrackKey) -> RepoResult<usize>;
}

/// SQLite-backed track repository.
pub struct SqliteTrackRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteTrackRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }

    fn hydrate(&self, mut track: Track) -> RepoResult<Track> {
        let key = track.key();
        track.categories = self.session.query(
            "SELECT category_name FROM Track_has_Category
             WHERE album_id = ?1 AND track_id = ?2
             ORDER BY category_name ASC;",
            params![key.album_id, key.track_id],
            |row| -> RepoResult<MusicCategory> { Ok(MusicCategory::new(row.get::<_, String>(0)?)) },
        )?;

        let musicians: Vec<(Artist, String)> = self.session.query(
            &format!(
                "SELECT {ARTIST_COLUMNS}, p.instrument
                 FROM Plays_in p
                 INNER JOIN Artist ON Artist.id = p.artist_id
                 WHERE p.album_id = ?1 AND p.track_id = ?2
                 ORDER BY Artist.id ASC, p.instrument ASC;"
            ),
            params![key.album_id, key.track_id],
            |row| -> RepoResult<(Artist, String)> { Ok((parse_artist_row(row)?, row.get(6)?)) },
        )?;
        let mut identities: HashMap<ArtistId, Arc<Artist>> = HashMap::new();
        track.artists = musicians
            .into_iter()
            .map(|(artist, instrument)| {
                ArtistCredit::musician(shared_identity(&mut identities, artist), instrument)
            })
            .collect();
        Ok(track)
    }

    fn sync_categories(
        &self,
        read_key: &TrackKey,
        write_key: &TrackKey,
        categories: &[MusicCategory],
    ) -> RepoResult<()> {
        let current: Vec<String> = self.session.query(
            "SELECT category_name FROM Track_has_Category
             WHERE album_id = ?1 AND track_id = ?2;",
            params![read_key.album_id, read_key.track_id],
            |row| -> RepoResult<String> { Ok(row.get(0)?) },
        )?;
        let desired: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        let plan = plan_child_sync(&current, &desired);

        if !plan.to_delete.is_empty() {
            self.session.execute(
                "DELETE FROM Track_has_Category WHERE album_id = ?1 AND track_id = ?2;",
                params![read_key.album_id, read_key.track_id],
            )?;
        }
        for name in &plan.to_insert {
            self.session.execute(
                "INSERT INTO Track_has_Category (album_id, track_id, category_name)
                 VALUES (?1, ?2, ?3);",
                params![write_key.album_id, write_key.track_id, name],
            )?;
        }
        debug!(
            "event=track_categories_sync module=repo track={} removed={} inserted={}",
            write_key,
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(())
    }

    fn sync_musicians(
        &self,
        read_key: &TrackKey,
        write_key: &TrackKey,
        credits: &[ArtistCredit],
    ) -> RepoResult<()> {
        let current: Vec<(ArtistId, String)> = self.session.query(
            "SELECT artist_id, instrument FROM Plays_in
             WHERE album_id = ?1 AND track_id = ?2;",
            params![read_key.album_id, read_key.track_id],
            |row| -> RepoResult<(ArtistId, String)> { Ok((row.get(0)?, row.get(1)?)) },
        )?;
        let desired: Vec<(ArtistId, String)> = credits
            .iter()
            .filter_map(|credit| match &credit.role {
                ArtistRole::AsMusician { instrument } => {
                    Some((credit.artist_id(), instrument.clone()))
                }
                _ => None,
            })
            .collect();
        let plan = plan_child_sync(&current, &desired);

        if !plan.to_delete.is_empty() {
            self.session.execute(
                "DELETE FROM Plays_in WHERE album_id = ?1 AND track_id = ?2;",
                params![read_key.album_id, read_key.track_id],
            )?;
        }
        for (artist_id, instrument) in &plan.to_insert {
            self.session.execute(
                "INSERT INTO Plays_in (artist_id, album_id, track_id, instrument)
                 VALUES (?1, ?2, ?3, ?4);",
                params![artist_id, write_key.album_id, write_key.track_id, instrument],
            )?;
        }
        debug!(
            "event=track_artists_sync module=repo track={} removed={} inserted={}",
            write_key,
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(())
    }
}

impl TrackRepository for SqliteTrackRepository<'_> {
    fn list_tracks(&self) -> RepoResult<Vec<Track>> {
        let tracks: Vec<Track> = self.session.query(
            &format!("{TRACK_SELECT_SQL} ORDER BY album_id ASC, track_id ASC;"),
            [],
            parse_track_row,
        )?;
        tracks.into_iter().map(|track| self.hydrate(track)).collect()
    }

    fn get_track(&self, key: &TrackKey) -> RepoResult<Option<Track>> {
        let track = self.session.query_optional(
            &format!("{TRACK_SELECT_SQL} WHERE album_id = ?1 AND track_id = ?2;"),
            params![key.album_id, key.track_id],
            parse_track_row,
        )?;
        track.map(|track| self.hydrate(track)).transpose()
    }

    fn load_album<'t>(&self, track: &'t mut Track) -> RepoResult<Option<&'t Album>> {
        if track.album.is_none() {
            track.album = SqliteAlbumRepository::new(self.session).get_album(track.album_id)?;
        }
        Ok(track.album.as_ref())
    }

    fn add_track(&self, track: &Track) -> RepoResult<()> {
        track.validate()?;
        self.session.execute(
            "INSERT INTO Track (album_id, track_id, title, length) VALUES (?1, ?2, ?3, ?4);",
            params![track.album_id, track.track_id, track.title, track.length],
        )?;
        let key = track.key();
        self.sync_categories(&key, &key, &track.categories)?;
        self.sync_musicians(&key, &key, &track.artists)
    }

    fn update_track(&self, previous_key: &TrackKey, track: &Track) -> RepoResult<usize> {
        track.validate()?;
        let changed = self.session.execute(
            "UPDATE Track
             SET
                album_id = ?1,
                track_id = ?2,
                title = ?3,
                length = ?4
             WHERE album_id = ?5 AND track_id = ?6;",
            params![
                track.album_id,
                track.track_id,
                track.title,
                track.length,
                previous_key.album_id,
                previous_key.track_id,
            ],
        )?;
        if changed == 0 {
            warn!("event=track_update module=repo status=stale_key previous_key={previous_key} matched=0");
            return Ok(0);
        }

        let key = track.key();
        if *previous_key != key {
            self.session.execute(
                "UPDATE File_concerns_Track
                 SET album_id = ?1, track_id = ?2
                 WHERE album_id = ?3 AND track_id = ?4;",
                params![
                    key.album_id,
                    key.track_id,
                    previous_key.album_id,
                    previous_key.track_id,
                ],
            )?;
        }
        self.sync_categories(previous_key, &key, &track.categories)?;
        self.sync_musicians(previous_key, &key, &track.artists)?;
        Ok(changed)
    }

    fn update_track_categories(&self, track: &Track) -> RepoResult<()> {
        track.validate()?;
        let key = track.key();
        self.sync_categories(&key, &key, &track.categories)
    }

    fn update_track_artists(&self, track: &Track) -> RepoResult<()> {
        track.validate()?;
        let key = track.key();
        self.sync_musicians(&key, &key, &track.artists)
    }

    fn add_file_to_track(&self, file_id: FileId, key: &TrackKey) -> RepoResult<()> {
        ensure_file_unlinked(self.session, file_id)?;
        self.session.execute(
            "INSERT INTO File_concerns_Track (file_id, album_id, track_id) VALUES (?1, ?2, ?3);",
            params![file_id, key.album_id, key.track_id],
        )?;
        Ok(())
    }

    fn delete_track(&self, key: &TrackKey) -> RepoResult<usize> {
        let files = SqliteMediaFileRepository::new(self.session);
        let file_ids = linked_file_ids_for_track(self.session, key)?;
        for file_id in &file_ids {
            files.delete_media_file(*file_id)?;
        }

        for table in ["Track_has_Category", "Plays_in"] {
            self.session.execute(
                &format!("DELETE FROM {table} WHERE album_id = ?1 AND track_id = ?2;"),
                params![key.album_id, key.track_id],
            )?;
        }
        let changed = self.session.execute(
            "DELETE FROM Track WHERE album_id = ?1 AND track_id = ?2;",
            params![key.album_id, key.track_id],
        )?;
        info!(
            "event=track_delete module=repo status=ok track={} files_removed={} matched={}",
            key,
            file_ids.len(),
            changed
        );
        Ok(changed)
    }
}

fn parse_track_row(row: &Row<'_>) -> RepoResult<Track> {
    Ok(Track {
        album_id: row.get("album_id")?,
        track_id: row.get("track_id")?,
        title: row.get("title")?,
        length: get_u32(row, "length")?,
        categories: Vec::new(),
        artists: Vec::new(),
        album: None,
    })
}
