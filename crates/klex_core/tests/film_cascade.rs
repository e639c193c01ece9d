use chrono::NaiveDate;
use klex_core::db::open_db_in_memory;
use klex_core::model::{
    Artist, ArtistCredit, ArtistRole, AudioSampling, FilmCategory, Film, FilmKey, Flux,
    MediaFile, MediaTarget, User,
};
use klex_core::repo::artist_repo::{ArtistRepository, SqliteArtistRepository};
use klex_core::repo::category_repo::{FilmCategoryRepository, SqliteCategoryRepository};
use klex_core::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use klex_core::repo::media_repo::{MediaFileRepository, SqliteMediaFileRepository};
use klex_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use klex_core::{ConnectionSession, DbError, RepoError};
use std::sync::Arc;

fn seeded_session() -> ConnectionSession {
    let session = ConnectionSession::new(open_db_in_memory().unwrap());
    let categories = SqliteCategoryRepository::new(&session);
    for name in ["comedy", "drama", "noir"] {
        categories
            .add_film_category(&FilmCategory::new(name))
            .unwrap();
    }
    let artists = SqliteArtistRepository::new(&session);
    artists.add_artist(&Artist::new(1, "Jerry Zucker")).unwrap();
    artists.add_artist(&Artist::new(2, "Patrick Swayze")).unwrap();
    SqliteUserRepository::new(&session)
        .add_user(&User::new("a@x.com", "A", "B", 30, 12, "en"))
        .unwrap();
    session.commit().unwrap();
    session
}

fn ghost() -> Film {
    let director = Arc::new(Artist::new(1, "Jerry Zucker"));
    let lead = Arc::new(Artist::new(2, "Patrick Swayze"));
    let mut film = Film::new("Ghost", 1990);
    film.summary = Some("A love story.".to_string());
    film.recommended_age = 12;
    film.categories = vec![FilmCategory::new("drama"), FilmCategory::new("noir")];
    film.artists = vec![
        ArtistCredit::base(director),
        ArtistCredit::actor(lead, "Sam Wheat"),
    ];
    film
}

fn two_flux_file(id: i64) -> MediaFile {
    let mut file = MediaFile::new(
        id,
        700_000_000,
        NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
        "a@x.com",
    );
    file.flux = vec![
        Flux::video(1, 4_000, "h264", 1920, 1080),
        Flux::audio(2, 192, "aac", AudioSampling::Bits16, "en"),
    ];
    file
}

fn count(session: &ConnectionSession, table: &str) -> i64 {
    session
        .query::<i64, DbError, _, _>(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
            Ok(row.get(0)?)
        })
        .unwrap()[0]
}

#[test]
fn stored_film_hydrates_with_categories_and_credits() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);

    films.add_film(&ghost()).unwrap();
    session.commit().unwrap();

    let loaded = films.get_film(&FilmKey::new("Ghost", 1990)).unwrap().unwrap();
    assert_eq!(loaded, ghost());
    assert_eq!(films.list_films().unwrap(), vec![ghost()]);
}

#[test]
fn one_artist_with_two_roles_shares_one_identity() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let lead = Arc::new(Artist::new(2, "Patrick Swayze"));
    let mut film = Film::new("Road House", 1989);
    film.artists = vec![
        ArtistCredit::base(Arc::clone(&lead)),
        ArtistCredit::actor(Arc::clone(&lead), "Dalton"),
    ];
    films.add_film(&film).unwrap();

    let loaded = films.get_film(&film.key()).unwrap().unwrap();
    assert_eq!(loaded.artists.len(), 2);
    assert!(Arc::ptr_eq(&loaded.artists[0].artist, &loaded.artists[1].artist));

    let plain = films.list_film_artists(&film.key()).unwrap();
    let actors = films.list_film_actors(&film.key()).unwrap();
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].role, ArtistRole::Base);
    assert_eq!(
        actors[0].role,
        ArtistRole::AsActor {
            role_name: "Dalton".to_string()
        }
    );
}

#[test]
fn category_update_replaces_the_whole_set() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let mut film = ghost();
    films.add_film(&film).unwrap();
    session.commit().unwrap();

    film.categories = vec![FilmCategory::new("comedy")];
    films.update_film_categories(&film).unwrap();
    session.commit().unwrap();

    let categories = films.list_film_categories(&film.key()).unwrap();
    assert_eq!(categories, vec![FilmCategory::new("comedy")]);
}

#[test]
fn artist_update_replaces_participants_and_actors() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let mut film = ghost();
    films.add_film(&film).unwrap();

    film.artists = vec![ArtistCredit::actor(
        Arc::new(Artist::new(1, "Jerry Zucker")),
        "Cameo",
    )];
    films.update_film_artists(&film).unwrap();
    session.commit().unwrap();

    assert!(films.list_film_artists(&film.key()).unwrap().is_empty());
    let actors = films.list_film_actors(&film.key()).unwrap();
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].artist_id(), 1);
    assert_eq!(count(&session, "Plays_role"), 1);
}

#[test]
fn musician_credit_is_rejected_on_films() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let mut film = ghost();
    film.artists.push(ArtistCredit::musician(
        Arc::new(Artist::new(1, "Jerry Zucker")),
        "piano",
    ));

    let err = films.add_film(&film).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(films.list_films().unwrap().is_empty());
}

#[test]
fn key_rename_moves_children_and_file_links_to_the_new_key() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let media = SqliteMediaFileRepository::new(&session);
    let film = ghost();
    films.add_film(&film).unwrap();
    media.add_media_file(&two_flux_file(10)).unwrap();
    films.add_file_to_film(10, &film.key()).unwrap();
    session.commit().unwrap();

    let mut renamed = film.clone();
    renamed.title = "Ghost (Remastered)".to_string();
    renamed.year = 1991;
    assert_eq!(films.update_film(&film.key(), &renamed).unwrap(), 1);
    session.commit().unwrap();

    assert!(films.get_film(&film.key()).unwrap().is_none());
    let loaded = films.get_film(&renamed.key()).unwrap().unwrap();
    assert_eq!(loaded.categories, renamed.categories);
    assert_eq!(loaded.artists, renamed.artists);
    assert_eq!(
        media.media_target(10).unwrap(),
        Some(MediaTarget::Film(renamed.key()))
    );
    assert_eq!(count(&session, "Film_has_Category"), 2);
}

#[test]
fn stale_film_rename_touches_no_rows() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    films.add_film(&ghost()).unwrap();
    session.commit().unwrap();

    let mut edited = ghost();
    edited.categories.clear();
    let matched = films
        .update_film(&FilmKey::new("Ghost", 1889), &edited)
        .unwrap();
    session.commit().unwrap();

    assert_eq!(matched, 0);
    assert_eq!(films.list_films().unwrap(), vec![ghost()]);
}

#[test]
fn deleting_a_film_removes_its_files_flux_and_details() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let media = SqliteMediaFileRepository::new(&session);
    let film = ghost();
    films.add_film(&film).unwrap();
    media.add_media_file(&two_flux_file(42)).unwrap();
    films.add_file_to_film(42, &film.key()).unwrap();
    session.commit().unwrap();
    assert_eq!(media.list_files_for_film(&film.key()).unwrap().len(), 1);

    assert_eq!(films.delete_film(&film.key()).unwrap(), 1);
    session.commit().unwrap();

    assert!(films
        .list_films()
        .unwrap()
        .iter()
        .all(|listed| listed.key() != film.key()));
    assert!(media.list_flux(42).unwrap().is_empty());
    assert!(media.get_media_file(42).unwrap().is_none());
    for table in [
        "MediaFile",
        "Flux",
        "VideoFlux",
        "AudioFlux",
        "File_concerns_Film",
        "Film_has_Category",
        "Participates_in_Film",
        "Plays_role",
    ] {
        assert_eq!(count(&session, table), 0, "{table} kept rows");
    }
}

#[test]
fn a_file_links_to_one_film_only() {
    let session = seeded_session();
    let films = SqliteFilmRepository::new(&session);
    let media = SqliteMediaFileRepository::new(&session);
    films.add_film(&ghost()).unwrap();
    films.add_film(&Film::new("Airplane!", 1980)).unwrap();
    media.add_media_file(&two_flux_file(5)).unwrap();

    films.add_file_to_film(5, &ghost().key()).unwrap();
    let err = films
        .add_file_to_film(5, &FilmKey::new("Airplane!", 1980))
        .unwrap_err();
    assert!(matches!(err, RepoError::AlreadyLinked(5)));
}
