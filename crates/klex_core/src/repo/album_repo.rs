//! Album repository contracts and SQLite implementation.
//!
//! # Invariants
//! - An id rename repoints tracks and every track-keyed child row.
//! - Deleting an album deletes its tracks (with their files) first.

use crate::model::{Album, AlbumId, MusicCategory, TrackKey};
use crate::repo::sync::plan_child_sync;
use crate::repo::track_repo::{SqliteTrackRepository, TrackRepository};
use crate::repo::RepoResult;
use crate::session::ConnectionSession;
use log::{debug, info, warn};
use rusqlite::{params, Row};

const ALBUM_SELECT_SQL: &str = "SELECT
    id,
    title,
    release_date,
    cover_url,
    artist_name
FROM Album";

/// Tables whose rows are keyed by `album_id`, repointed on rename.
const ALBUM_KEYED_TABLES: &[&str] = &[
    "Track",
    "Track_has_Category",
    "Plays_in",
    "File_concerns_Track",
    "Album_has_Category",
];

/// Repository interface for albums.
pub trait AlbumRepository {
    fn list_albums(&self) -> RepoResult<Vec<Album>>;
    fn get_album(&self, id: AlbumId) -> RepoResult<Option<Album>>;
    fn add_album(&self, album: &Album) -> RepoResult<()>;
    /// Updates the row keyed by `previous_id`; returns matched rows.
    fn update_album(&self, previous_id: AlbumId, album: &Album) -> RepoResult<usize>;
    fn update_album_categories(&self, album: &Album) -> RepoResult<()>;
    /// Cascading delete through tracks; returns deleted album rows.
    fn delete_album(&self, id: AlbumId) -> RepoResult<usize>;
}

/// SQLite-backed album repository.
pub struct SqliteAlbumRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteAlbumRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }

    fn load_categories(&self, id: AlbumId) -> RepoResult<Vec<MusicCategory>> {
        self.session.query(
            "SELECT category_name FROM Album_has_Category
             WHERE album_id = ?1
             ORDER BY category_name ASC;",
            [id],
            |row| Ok(MusicCategory::new(row.get::<_, String>(0)?)),
        )
    }

    fn sync_categories(
        &self,
        read_id: AlbumId,
        write_id: AlbumId,
        categories: &[MusicCategory],
    ) -> RepoResult<()> {
        let current: Vec<String> = self.session.query(
            "SELECT category_name FROM Album_has_Category WHERE album_id = ?1;",
            [read_id],
            |row| -> RepoResult<String> { Ok(row.get(0)?) },
        )?;
        let desired: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        let plan = plan_child_sync(&current, &desired);

        if !plan.to_delete.is_empty() {
            self.session.execute(
                "DELETE FROM Album_has_Category WHERE album_id = ?1;",
                [read_id],
            )?;
        }
        for name in &plan.to_insert {
            self.session.execute(
                "INSERT INTO Album_has_Category (album_id, category_name) VALUES (?1, ?2);",
                params![write_id, name],
            )?;
        }
        debug!(
            "event=album_categories_sync module=repo album_id={} removed={} inserted={}",
            write_id,
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(())
    }

    fn hydrate(&self, mut album: Album) -> RepoResult<Album> {
        album.categories = self.load_categories(album.id)?;
        Ok(album)
    }
}

impl AlbumRepository for SqliteAlbumRepository<'_> {
    fn list_albums(&self) -> RepoResult<Vec<Album>> {
        let albums: Vec<Album> = self.session.query(
            &format!("{ALBUM_SELECT_SQL} ORDER BY id ASC;"),
            [],
            parse_album_row,
        )?;
        albums.into_iter().map(|album| self.hydrate(album)).collect()
    }

    fn get_album(&self, id: AlbumId) -> RepoResult<Option<Album>> {
        let album = self.session.query_optional(
            &format!("{ALBUM_SELECT_SQL} WHERE id = ?1;"),
            [id],
            parse_album_row,
        )?;
        album.map(|album| self.hydrate(album)).transpose()
    }

    fn add_album(&self, album: &Album) -> RepoResult<()> {
        album.validate()?;
        self.session.execute(
            "INSERT INTO Album (id, title, release_date, cover_url, artist_name)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                album.id,
                album.title,
                album.release_date,
                album.cover_url,
                album.artist_name,
            ],
        )?;
        self.sync_categories(album.id, album.id, &album.categories)
    }

    fn update_album(&self, previous_id: AlbumId, album: &Album) -> RepoResult<usize> {
        album.validate()?;
        let changed = self.session.execute(
            "UPDATE Album
             SET
                id = ?1,
                title = ?2,
                release_date = ?3,
                cover_url = ?4,
                artist_name = ?5
             WHERE id = ?6;",
            params![
                album.id,
                album.title,
                album.release_date,
                album.cover_url,
                album.artist_name,
                previous_id,
            ],
        )?;
        if changed == 0 {
            warn!(
                "event=album_update module=repo status=stale_key previous_id={previous_id} matched=0"
            );
            return Ok(0);
        }

        if previous_id != album.id {
            for table in ALBUM_KEYED_TABLES {
                self.session.execute(
                    &format!("UPDATE {table} SET album_id = ?1 WHERE album_id = ?2;"),
                    params![album.id, previous_id],
                )?;
            }
        }
        self.sync_categories(album.id, album.id, &album.categories)?;
        Ok(changed)
    }

    fn update_album_categories(&self, album: &Album) -> RepoResult<()> {
        album.validate()?;
        self.sync_categories(album.id, album.id, &album.categories)
    }

    fn delete_album(&self, id: AlbumId) -> RepoResult<usize> {
        let track_ids: Vec<i64> = self.session.query(
            "SELECT track_id FROM Track WHERE album_id = ?1 ORDER BY track_id ASC;",
            [id],
            |row| -> RepoResult<i64> { Ok(row.get(0)?) },
        )?;
        let tracks = SqliteTrackRepository::new(self.session);
        for track_id in &track_ids {
            tracks.delete_track(&TrackKey::new(id, *track_id))?;
        }

        self.session
            .execute("DELETE FROM Album_has_Category WHERE album_id = ?1;", [id])?;
        let changed = self
            .session
            .execute("DELETE FROM Album WHERE id = ?1;", [id])?;
        info!(
            "event=album_delete module=repo status=ok album_id={} tracks_removed={} matched={}",
            id,
            track_ids.len(),
            changed
        );
        Ok(changed)
    }
}

fn parse_album_row(row: &Row<'_>) -> RepoResult<Album> {
    Ok(Album {
        id: row.get("id")?,
        title: row.get("title")?,
        release_date: row.get("release_date")?,
        cover_url: row.get("cover_url")?,
        artist_name: row.get("artist_name")?,
        categories: Vec::new(),
    })
}
