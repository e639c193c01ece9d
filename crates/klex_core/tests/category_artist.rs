use chrono::NaiveDate;
use klex_core::db::open_db_in_memory;
use klex_core::model::{
    Album, Artist, ArtistCredit, Film, FilmCategory, MusicCategory, Track,
};
use klex_core::repo::album_repo::{AlbumRepository, SqliteAlbumRepository};
use klex_core::repo::artist_repo::{ArtistRepository, SqliteArtistRepository};
use klex_core::repo::category_repo::{
    FilmCategoryRepository, MusicCategoryRepository, SqliteCategoryRepository,
};
use klex_core::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use klex_core::repo::track_repo::{SqliteTrackRepository, TrackRepository};
use klex_core::{ConnectionSession, DbError};
use std::sync::Arc;

fn session() -> ConnectionSession {
    ConnectionSession::new(open_db_in_memory().unwrap())
}

fn count_where(session: &ConnectionSession, sql: &str) -> i64 {
    session
        .query::<i64, DbError, _, _>(sql, [], |row| Ok(row.get(0)?))
        .unwrap()[0]
}

#[test]
fn film_category_rename_repoints_film_links() {
    let session = session();
    let categories = SqliteCategoryRepository::new(&session);
    let films = SqliteFilmRepository::new(&session);
    categories
        .add_film_category(&FilmCategory::new("thriler"))
        .unwrap();
    let mut film = Film::new("Heat", 1995);
    film.categories = vec![FilmCategory::new("thriler")];
    films.add_film(&film).unwrap();
    session.commit().unwrap();

    let matched = categories
        .update_film_category("thriler", &FilmCategory::new("thriller"))
        .unwrap();
    session.commit().unwrap();

    assert_eq!(matched, 1);
    assert_eq!(
        categories.list_film_categories().unwrap(),
        vec![FilmCategory::new("thriller")]
    );
    assert_eq!(
        films.list_film_categories(&film.key()).unwrap(),
        vec![FilmCategory::new("thriller")]
    );
}

#[test]
fn music_category_rename_repoints_albums_and_tracks_only() {
    let session = session();
    let categories = SqliteCategoryRepository::new(&session);
    categories
        .add_music_category(&MusicCategory::new("bop"))
        .unwrap();
    categories
        .add_film_category(&FilmCategory::new("bop"))
        .unwrap();
    let mut album = Album::new(1, "Bird");
    album.categories = vec![MusicCategory::new("bop")];
    SqliteAlbumRepository::new(&session).add_album(&album).unwrap();
    let mut track = Track::new(1, 1, "Ornithology");
    track.categories = vec![MusicCategory::new("bop")];
    SqliteTrackRepository::new(&session).add_track(&track).unwrap();
    let mut film = Film::new("Bird", 1988);
    film.categories = vec![FilmCategory::new("bop")];
    SqliteFilmRepository::new(&session).add_film(&film).unwrap();
    session.commit().unwrap();

    categories
        .update_music_category("bop", &MusicCategory::new("bebop"))
        .unwrap();
    session.commit().unwrap();

    assert_eq!(
        count_where(
            &session,
            "SELECT COUNT(*) FROM Album_has_Category WHERE category_name = 'bebop';"
        ),
        1
    );
    assert_eq!(
        count_where(
            &session,
            "SELECT COUNT(*) FROM Track_has_Category WHERE category_name = 'bebop';"
        ),
        1
    );
    assert_eq!(
        count_where(
            &session,
            "SELECT COUNT(*) FROM Film_has_Category WHERE category_name = 'bop';"
        ),
        1
    );
}

#[test]
fn stale_category_rename_matches_nothing() {
    let session = session();
    let categories = SqliteCategoryRepository::new(&session);
    categories
        .add_music_category(&MusicCategory::new("funk"))
        .unwrap();

    let matched = categories
        .update_music_category("soul", &MusicCategory::new("neo-soul"))
        .unwrap();
    assert_eq!(matched, 0);
    assert_eq!(
        categories.list_music_categories().unwrap(),
        vec![MusicCategory::new("funk")]
    );
}

#[test]
fn deleting_a_category_removes_its_links() {
    let session = session();
    let categories = SqliteCategoryRepository::new(&session);
    let films = SqliteFilmRepository::new(&session);
    categories
        .add_film_category(&FilmCategory::new("noir"))
        .unwrap();
    let mut film = Film::new("Laura", 1944);
    film.categories = vec![FilmCategory::new("noir")];
    films.add_film(&film).unwrap();
    session.commit().unwrap();

    assert_eq!(categories.delete_film_category("noir").unwrap(), 1);
    session.commit().unwrap();

    assert!(films.list_film_categories(&film.key()).unwrap().is_empty());
    assert!(categories.list_film_categories().unwrap().is_empty());
}

#[test]
fn artist_round_trips_every_field() {
    let session = session();
    let artists = SqliteArtistRepository::new(&session);
    let mut artist = Artist::new(9, "Gene Tierney");
    artist.picture_url = Some("https://img.example/gt.jpg".to_string());
    artist.main_specialty = Some("actor".to_string());
    artist.birth_date = NaiveDate::from_ymd_opt(1920, 11, 19);
    artist.biography = Some("Born in Brooklyn.".to_string());

    artists.add_artist(&artist).unwrap();
    session.commit().unwrap();

    assert_eq!(artists.get_artist(9).unwrap(), Some(artist.clone()));
    assert_eq!(artists.list_artists().unwrap(), vec![artist]);
}

#[test]
fn artist_id_rename_repoints_credits() {
    let session = session();
    let artists = SqliteArtistRepository::new(&session);
    let films = SqliteFilmRepository::new(&session);
    artists.add_artist(&Artist::new(1, "Gene Tierney")).unwrap();
    let mut film = Film::new("Laura", 1944);
    film.artists = vec![ArtistCredit::actor(
        Arc::new(Artist::new(1, "Gene Tierney")),
        "Laura Hunt",
    )];
    films.add_film(&film).unwrap();
    session.commit().unwrap();

    assert_eq!(
        artists
            .update_artist(1, &Artist::new(77, "Gene Tierney"))
            .unwrap(),
        1
    );
    session.commit().unwrap();

    let actors = films.list_film_actors(&film.key()).unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].artist_id(), 77);
}

#[test]
fn deleting_an_artist_removes_credits_first() {
    let session = session();
    let artists = SqliteArtistRepository::new(&session);
    let films = SqliteFilmRepository::new(&session);
    artists.add_artist(&Artist::new(1, "Otto Preminger")).unwrap();
    let mut film = Film::new("Laura", 1944);
    film.artists = vec![ArtistCredit::base(Arc::new(Artist::new(
        1,
        "Otto Preminger",
    )))];
    films.add_film(&film).unwrap();
    session.commit().unwrap();

    assert_eq!(artists.delete_artist(1).unwrap(), 1);
    session.commit().unwrap();

    assert!(films.list_film_artists(&film.key()).unwrap().is_empty());
    assert!(artists.list_artists().unwrap().is_empty());
}
