//! Media file repository: files, their flux and the film/track links.
//!
//! # Responsibility
//! - Persist a `MediaFile` as one base row plus one `Flux` row and exactly
//!   one type-detail row per flux.
//! - Delete files bottom-up: details, flux, links, then the file row.
//!
//! # Invariants
//! - A file is linked to at most one film or track.
//! - Reading a flux with zero or several detail rows is `InvalidData`.

use crate::model::{
    AudioSampling, CodecKind, FileId, FilmKey, Flux, FluxDetail, MediaFile, MediaTarget, TrackKey,
};
use crate::repo::sync::plan_child_sync;
use crate::repo::{RepoError, RepoResult};
use crate::session::ConnectionSession;
use log::{debug, info, warn};
use rusqlite::{params, Row};

const FILE_SELECT_SQL: &str = "SELECT
    MediaFile.id AS id,
    MediaFile.size AS size,
    MediaFile.added_date AS added_date,
    MediaFile.user_email AS user_email
FROM MediaFile";

const FLUX_SELECT_SQL: &str = "SELECT
    f.flux_id,
    f.data_rate,
    v.codec,
    v.width,
    v.height,
    a.codec,
    a.sampling,
    a.language,
    t.codec,
    t.language
FROM Flux f
LEFT JOIN VideoFlux v ON v.file_id = f.file_id AND v.flux_id = f.flux_id
LEFT JOIN AudioFlux a ON a.file_id = f.file_id AND a.flux_id = f.flux_id
LEFT JOIN TextFlux t ON t.file_id = f.file_id AND t.flux_id = f.flux_id
WHERE f.file_id = ?1
ORDER BY f.flux_id ASC;";

const DETAIL_TABLES: &[&str] = &["VideoFlux", "AudioFlux", "TextFlux"];
const LINK_TABLES: &[&str] = &["File_concerns_Film", "File_concerns_Track"];

/// Repository interface for media files and flux.
pub trait MediaFileRepository {
    fn list_media_files(&self) -> RepoResult<Vec<MediaFile>>;
    fn get_media_file(&self, id: FileId) -> RepoResult<Option<MediaFile>>;
    fn list_flux(&self, file_id: FileId) -> RepoResult<Vec<Flux>>;
    fn list_files_for_film(&self, key: &FilmKey) -> RepoResult<Vec<MediaFile>>;
    fn list_files_for_track(&self, key: &TrackKey) -> RepoResult<Vec<MediaFile>>;
    /// Film or track the file is linked to, if any.
    fn media_target(&self, file_id: FileId) -> RepoResult<Option<MediaTarget>>;
    fn add_media_file(&self, file: &MediaFile) -> RepoResult<()>;
    /// Updates the row keyed by `previous_id`, replaces its flux and repoints
    /// links; returns matched rows.
    fn update_media_file(&self, previous_id: FileId, file: &MediaFile) -> RepoResult<usize>;
    fn delete_media_file(&self, id: FileId) -> RepoResult<usize>;
    fn list_codecs(&self, kind: CodecKind) -> RepoResult<Vec<String>>;
}

/// SQLite-backed media file repository.
pub struct SqliteMediaFileRepository<'s> {
    session: &'s ConnectionSession,
}

impl<'s> SqliteMediaFileRepository<'s> {
    pub fn new(session: &'s ConnectionSession) -> Self {
        Self { session }
    }

    fn hydrate_all(&self, files: Vec<MediaFile>) -> RepoResult<Vec<MediaFile>> {
        files
            .into_iter()
            .map(|mut file| {
                file.flux = self.list_flux(file.id)?;
                Ok(file)
            })
            .collect()
    }

    fn insert_flux(&self, file_id: FileId, flux: &Flux) -> RepoResult<()> {
        self.session.execute(
            "INSERT INTO Flux (file_id, flux_id, data_rate) VALUES (?1, ?2, ?3);",
            params![file_id, flux.flux_id, flux.data_rate],
        )?;
        match &flux.detail {
            FluxDetail::Video {
                codec,
                width,
                height,
            } => self.session.execute(
                "INSERT INTO VideoFlux (file_id, flux_id, codec, width, height)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![file_id, flux.flux_id, codec, width, height],
            )?,
            FluxDetail::Audio {
                codec,
                sampling,
                language,
            } => self.session.execute(
                "INSERT INTO AudioFlux (file_id, flux_id, codec, sampling, language)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![file_id, flux.flux_id, codec, sampling.bits(), language],
            )?,
            FluxDetail::Text { codec, language } => self.session.execute(
                "INSERT INTO TextFlux (file_id, flux_id, codec, language)
                 VALUES (?1, ?2, ?3, ?4);",
                params![file_id, flux.flux_id, codec, language],
            )?,
        };
        Ok(())
    }

    fn delete_flux_rows(&self, file_id: FileId) -> RepoResult<()> {
        for table in DETAIL_TABLES {
            self.session
                .execute(&format!("DELETE FROM {table} WHERE file_id = ?1;"), [file_id])?;
        }
        self.session
            .execute("DELETE FROM Flux WHERE file_id = ?1;", [file_id])?;
        Ok(())
    }
}

impl MediaFileRepository for SqliteMediaFileRepository<'_> {
    fn list_media_files(&self) -> RepoResult<Vec<MediaFile>> {
        let files = self.session.query(
            &format!("{FILE_SELECT_SQL} ORDER BY MediaFile.id ASC;"),
            [],
            parse_file_row,
        )?;
        self.hydrate_all(files)
    }

    fn get_media_file(&self, id: FileId) -> RepoResult<Option<MediaFile>> {
        let file = self.session.query_optional(
            &format!("{FILE_SELECT_SQL} WHERE MediaFile.id = ?1;"),
            [id],
            parse_file_row,
        )?;
        match file {
            Some(file) => Ok(self.hydrate_all(vec![file])?.pop()),
            None => Ok(None),
        }
    }

    fn list_flux(&self, file_id: FileId) -> RepoResult<Vec<Flux>> {
        self.session.query(FLUX_SELECT_SQL, [file_id], |row| {
            parse_flux_row(file_id, row)
        })
    }

    fn list_files_for_film(&self, key: &FilmKey) -> RepoResult<Vec<MediaFile>> {
        let files = self.session.query(
            &format!(
                "{FILE_SELECT_SQL}
                 INNER JOIN File_concerns_Film link ON link.file_id = MediaFile.id
                 WHERE link.film_title = ?1 AND link.film_year = ?2
                 ORDER BY MediaFile.id ASC;"
            ),
            params![key.title, key.year],
            parse_file_row,
        )?;
        self.hydrate_all(files)
    }

    fn list_files_for_track(&self, key: &TrackKey) -> RepoResult<Vec<MediaFile>> {
        let files = self.session.query(
            &format!(
                "{FILE_SELECT_SQL}
                 INNER JOIN File_concerns_Track link ON link.file_id = MediaFile.id
                 WHERE link.album_id = ?1 AND link.track_id = ?2
                 ORDER BY MediaFile.id ASC;"
            ),
            params![key.album_id, key.track_id],
            parse_file_row,
        )?;
        self.hydrate_all(files)
    }

    fn media_target(&self, file_id: FileId) -> RepoResult<Option<MediaTarget>> {
        let film = self.session.query_optional(
            "SELECT film_title, film_year FROM File_concerns_Film WHERE file_id = ?1;",
            [file_id],
            |row| -> RepoResult<MediaTarget> {
                Ok(MediaTarget::Film(FilmKey::new(
                    row.get::<_, String>(0)?,
                    row.get(1)?,
                )))
            },
        )?;
        if film.is_some() {
            return Ok(film);
        }
        self.session.query_optional(
            "SELECT album_id, track_id FROM File_concerns_Track WHERE file_id = ?1;",
            [file_id],
            |row| -> RepoResult<MediaTarget> {
                Ok(MediaTarget::Track(TrackKey::new(row.get(0)?, row.get(1)?)))
            },
        )
    }

    fn add_media_file(&self, file: &MediaFile) -> RepoResult<()> {
        file.validate()?;
        self.session.execute(
            "INSERT INTO MediaFile (id, size, added_date, user_email)
             VALUES (?1, ?2, ?3, ?4);",
            params![file.id, file.size, file.added_date, file.user_email],
        )?;
        for flux in &file.flux {
            self.insert_flux(file.id, flux)?;
        }
        debug!(
            "event=media_file_add module=repo status=ok file_id={} flux_count={}",
            file.id,
            file.flux.len()
        );
        Ok(())
    }

    fn update_media_file(&self, previous_id: FileId, file: &MediaFile) -> RepoResult<usize> {
        file.validate()?;
        let changed = self.session.execute(
            "UPDATE MediaFile
             SET
                id = ?1,
                size = ?2,
                added_date = ?3,
                user_email = ?4
             WHERE id = ?5;",
            params![
                file.id,
                file.size,
                file.added_date,
                file.user_email,
                previous_id,
            ],
        )?;
        if changed == 0 {
            warn!(
                "event=media_file_update module=repo status=stale_key previous_id={previous_id} matched=0"
            );
            return Ok(0);
        }

        if previous_id != file.id {
            for table in LINK_TABLES {
                self.session.execute(
                    &format!("UPDATE {table} SET file_id = ?1 WHERE file_id = ?2;"),
                    params![file.id, previous_id],
                )?;
            }
        }

        let current: Vec<i64> = self.session.query(
            "SELECT flux_id FROM Flux WHERE file_id = ?1;",
            [previous_id],
            |row| -> RepoResult<i64> { Ok(row.get(0)?) },
        )?;
        let desired: Vec<i64> = file.flux.iter().map(|flux| flux.flux_id).collect();
        let plan = plan_child_sync(&current, &desired);
        if !plan.to_delete.is_empty() {
            self.delete_flux_rows(previous_id)?;
        }
        for flux in &file.flux {
            self.insert_flux(file.id, flux)?;
        }
        debug!(
            "event=media_flux_sync module=repo file_id={} removed={} inserted={}",
            file.id,
            plan.to_delete.len(),
            plan.to_insert.len()
        );
        Ok(changed)
    }

    fn delete_media_file(&self, id: FileId) -> RepoResult<usize> {
        self.delete_flux_rows(id)?;
        for table in LINK_TABLES {
            self.session
                .execute(&format!("DELETE FROM {table} WHERE file_id = ?1;"), [id])?;
        }
        let changed = self
            .session
            .execute("DELETE FROM MediaFile WHERE id = ?1;", [id])?;
        info!("event=media_file_delete module=repo status=ok file_id={id} matched={changed}");
        Ok(changed)
    }

    fn list_codecs(&self, kind: CodecKind) -> RepoResult<Vec<String>> {
        let table = match kind {
            CodecKind::Video => "VideoCodec",
            CodecKind::Audio => "AudioCodec",
            CodecKind::Text => "TextCodec",
        };
        self.session.query(
            &format!("SELECT name FROM {table} ORDER BY name ASC;"),
            [],
            |row| Ok(row.get::<_, String>(0)?),
        )
    }
}

/// Fails with `AlreadyLinked` when the file concerns a film or a track.
pub(crate) fn ensure_file_unlinked(session: &ConnectionSession, file_id: FileId) -> RepoResult<()> {
    let links: Vec<i64> = session.query(
        "SELECT file_id FROM File_concerns_Film WHERE file_id = ?1
         UNION ALL
         SELECT file_id FROM File_concerns_Track WHERE file_id = ?1;",
        [file_id],
        |row| -> RepoResult<i64> { Ok(row.get(0)?) },
    )?;
    if links.is_empty() {
        Ok(())
    } else {
        Err(RepoError::AlreadyLinked(file_id))
    }
}

pub(crate) fn linked_file_ids_for_film(
    session: &ConnectionSession,
    key: &FilmKey,
) -> RepoResult<Vec<FileId>> {
    session.query(
        "SELECT file_id FROM File_concerns_Film
         WHERE film_title = ?1 AND film_year = ?2
         ORDER BY file_id ASC;",
        params![key.title, key.year],
        |row| Ok(row.get::<_, FileId>(0)?),
    )
}

pub(crate) fn linked_file_ids_for_track(
    session: &ConnectionSession,
    key: &TrackKey,
) -> RepoResult<Vec<FileId>> {
    session.query(
        "SELECT file_id FROM File_concerns_Track
         WHERE album_id = ?1 AND track_id = ?2
         ORDER BY file_id ASC;",
        params![key.album_id, key.track_id],
        |row| Ok(row.get::<_, FileId>(0)?),
    )
}

fn parse_file_row(row: &Row<'_>) -> RepoResult<MediaFile> {
    Ok(MediaFile {
        id: row.get("id")?,
        size: row.get("size")?,
        added_date: row.get("added_date")?,
        user_email: row.get("user_email")?,
        flux: Vec::new(),
    })
}

fn parse_flux_row(file_id: FileId, row: &Row<'_>) -> RepoResult<Flux> {
    let flux_id: i64 = row.get(0)?;
    let data_rate = column_u32(file_id, flux_id, "data_rate", row.get(1)?)?;

    let video: Option<String> = row.get(2)?;
    let audio: Option<String> = row.get(5)?;
    let text: Option<String> = row.get(8)?;

    let detail = match (video, audio, text) {
        (Some(codec), None, None) => {
            let width: i64 = row.get(3)?;
            let height: i64 = row.get(4)?;
            FluxDetail::Video {
                codec,
                width: column_u32(file_id, flux_id, "width", width)?,
                height: column_u32(file_id, flux_id, "height", height)?,
            }
        }
        (None, Some(codec), None) => {
            let bits: i64 = row.get(6)?;
            let sampling = AudioSampling::from_bits(bits).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "flux {file_id}/{flux_id} has unsupported sampling `{bits}`"
                ))
            })?;
            FluxDetail::Audio {
                codec,
                sampling,
                language: row.get(7)?,
            }
        }
        (None, None, Some(codec)) => FluxDetail::Text {
            codec,
            language: row.get(9)?,
        },
        (video, audio, text) => {
            let details = [video, audio, text].iter().flatten().count();
            return Err(RepoError::InvalidData(format!(
                "flux {file_id}/{flux_id} has {details} type detail rows, expected exactly one"
            )));
        }
    };

    Ok(Flux {
        flux_id,
        data_rate,
        detail,
    })
}

fn column_u32(file_id: FileId, flux_id: i64, column: &str, value: i64) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!(
            "flux {file_id}/{flux_id} column `{column}` holds `{value}`"
        ))
    })
}

