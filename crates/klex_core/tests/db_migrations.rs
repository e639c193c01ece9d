use klex_core::db::migrations::latest_version;
use klex_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const CATALOG_TABLES: &[&str] = &[
    "User",
    "FilmCategory",
    "MusicCategory",
    "Artist",
    "Film",
    "Film_has_Category",
    "Participates_in_Film",
    "Plays_role",
    "Album",
    "Album_has_Category",
    "Track",
    "Track_has_Category",
    "Plays_in",
    "MediaFile",
    "Flux",
    "VideoFlux",
    "AudioFlux",
    "TextFlux",
    "File_concerns_Film",
    "File_concerns_Track",
];

#[test]
fn in_memory_database_has_every_catalog_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in CATALOG_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enabled_and_deferred() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    conn.execute_batch("BEGIN;").unwrap();
    conn.execute(
        "INSERT INTO Film_has_Category (film_title, film_year, category_name)
         VALUES ('Ghost', 1990, 'drama');",
        [],
    )
    .expect("deferred constraint should accept the dangling row until commit");
    let commit = conn.execute_batch("COMMIT;");
    assert!(commit.is_err());
    conn.execute_batch("ROLLBACK;").unwrap();
}

#[test]
fn codec_tables_are_seeded() {
    let conn = open_db_in_memory().unwrap();
    for (table, codec) in [
        ("VideoCodec", "h264"),
        ("AudioCodec", "aac"),
        ("TextCodec", "srt"),
    ] {
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE name = ?1;"),
                [codec],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "{table} is missing {codec}");
    }
}

#[test]
fn reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("klex.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "MediaFile");
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
