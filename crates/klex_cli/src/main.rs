//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a catalog database (file path argument, or in-memory when absent).
//! - Run one read through the task executor and print catalog counts.
//!
//! Set `KLEX_LOG_DIR` to an absolute directory to enable file logging.

use klex_core::model::CodecKind;
use klex_core::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use klex_core::repo::media_repo::{MediaFileRepository, SqliteMediaFileRepository};
use klex_core::repo::track_repo::{SqliteTrackRepository, TrackRepository};
use klex_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use klex_core::{ConnectionSession, ExecutorConfig, TaskExecutor};
use log::info;
use std::process::ExitCode;

#[derive(Debug)]
struct CatalogCounts {
    users: usize,
    films: usize,
    tracks: usize,
    media_files: usize,
    video_codecs: usize,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("klex_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    if let Ok(log_dir) = std::env::var("KLEX_LOG_DIR") {
        klex_core::init_logging(klex_core::default_log_level(), log_dir)
            .map_err(|err| err.to_string())?;
    }

    let conn = match std::env::args().nth(1) {
        Some(path) => klex_core::open_db(path),
        None => klex_core::open_db_in_memory(),
    }
    .map_err(|err| err.to_string())?;

    let executor = TaskExecutor::new(ConnectionSession::new(conn), ExecutorConfig::default())
        .map_err(|err| err.to_string())?;

    let handle = executor
        .query(|session| {
            Ok(Some(CatalogCounts {
                users: SqliteUserRepository::new(session).list_users()?.len(),
                films: SqliteFilmRepository::new(session).list_films()?.len(),
                tracks: SqliteTrackRepository::new(session).list_tracks()?.len(),
                media_files: SqliteMediaFileRepository::new(session)
                    .list_media_files()?
                    .len(),
                video_codecs: SqliteMediaFileRepository::new(session)
                    .list_codecs(CodecKind::Video)?
                    .len(),
            }))
        })
        .map_err(|err| err.to_string())?;
    executor.run_until_idle();
    let counts = handle
        .wait()
        .ok_or_else(|| "catalog read failed; see log for details".to_string())?;

    println!("klex_core version={}", klex_core::core_version());
    println!(
        "users={} films={} tracks={} media_files={} video_codecs={}",
        counts.users, counts.films, counts.tracks, counts.media_files, counts.video_codecs
    );
    info!("event=cli_smoke module=cli status=ok");

    executor.shutdown().map_err(|err| err.to_string())
}
