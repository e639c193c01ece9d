use chrono::NaiveDate;
use klex_core::db::open_db_in_memory;
use klex_core::model::{Film, FilmCategory, Flux, MediaFile, MediaTarget, User};
use klex_core::repo::category_repo::{FilmCategoryRepository, SqliteCategoryRepository};
use klex_core::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use klex_core::repo::media_repo::{MediaFileRepository, SqliteMediaFileRepository};
use klex_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use klex_core::{
    CatalogService, ConnectionSession, ExecutorConfig, RepoError, RepoResult, TaskError,
    TaskExecutor, TransactionState,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn service() -> CatalogService {
    let session = ConnectionSession::new(open_db_in_memory().unwrap());
    CatalogService::new(TaskExecutor::new(session, ExecutorConfig::default()).unwrap())
}

fn user() -> User {
    User::new("a@x.com", "A", "B", 30, 12, "en")
}

fn file(id: i64, email: &str) -> MediaFile {
    let mut file = MediaFile::new(
        id,
        2048,
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        email,
    );
    file.flux.push(Flux::video(1, 1200, "h265", 1920, 1080));
    file
}

fn state(service: &CatalogService) -> TransactionState {
    service.executor().session().transaction_state().unwrap()
}

#[test]
fn committed_action_runs_on_committed() {
    let service = service();
    let committed = Rc::new(Cell::new(false));

    let flag = Rc::clone(&committed);
    service
        .submit_action(
            |session| SqliteUserRepository::new(session).add_user(&user()),
            move || flag.set(true),
            |err| panic!("unexpected failure: {err}"),
        )
        .unwrap();
    service.run_until_idle();

    assert!(committed.get());
    assert_eq!(state(&service), TransactionState::Idle);
    let users = SqliteUserRepository::new(service.executor().session())
        .list_users()
        .unwrap();
    assert_eq!(users, vec![user()]);
}

#[test]
fn failed_action_rolls_back_before_on_error() {
    let service = service();
    let failure = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&failure);
    service
        .submit_action(
            |session| {
                SqliteUserRepository::new(session).add_user(&user())?;
                Err(RepoError::NotFound("category drama".to_string()))
            },
            || panic!("failed action must not report a commit"),
            move |err| *sink.borrow_mut() = Some(err.to_string()),
        )
        .unwrap();
    service.run_until_idle();

    assert_eq!(
        failure.borrow().as_deref(),
        Some("not found: category drama")
    );
    assert_eq!(state(&service), TransactionState::Idle);
    assert!(SqliteUserRepository::new(service.executor().session())
        .list_users()
        .unwrap()
        .is_empty());
}

#[test]
fn rejected_commit_is_rolled_back() {
    let service = service();
    let failure = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&failure);
    service
        .submit_action(
            |session| SqliteMediaFileRepository::new(session).add_media_file(&file(1, "ghost@x.com")),
            || panic!("dangling owner must not commit"),
            move |err| *sink.borrow_mut() = Some(err),
        )
        .unwrap();
    service.run_until_idle();

    match failure.borrow_mut().take() {
        Some(TaskError::Failed(RepoError::Db(err))) => {
            assert!(err.to_string().to_lowercase().contains("foreign key"), "{err}")
        }
        other => panic!("expected a store failure, got {other:?}"),
    }
    assert_eq!(state(&service), TransactionState::Idle);
}

#[test]
fn panicking_action_is_rolled_back() {
    let service = service();
    let failure = Rc::new(RefCell::new(None));

    let sink = Rc::clone(&failure);
    service
        .submit_action(
            |session| -> RepoResult<()> {
                SqliteUserRepository::new(session).add_user(&user())?;
                panic!("form handler bug")
            },
            || {},
            move |err| *sink.borrow_mut() = Some(err),
        )
        .unwrap();
    service.run_until_idle();

    assert!(matches!(
        failure.borrow().as_ref(),
        Some(TaskError::Panicked(message)) if message.contains("form handler bug")
    ));
    assert_eq!(state(&service), TransactionState::Idle);
    assert!(SqliteUserRepository::new(service.executor().session())
        .list_users()
        .unwrap()
        .is_empty());
}

#[test]
fn film_with_files_is_created_in_one_commit() {
    let service = service();
    let setup = service.executor().session();
    SqliteUserRepository::new(setup).add_user(&user()).unwrap();
    SqliteCategoryRepository::new(setup)
        .add_film_category(&FilmCategory::new("drama"))
        .unwrap();
    setup.commit().unwrap();

    let mut film = Film::new("Ikiru", 1952);
    film.recommended_age = 12;
    film.categories = vec![FilmCategory::new("drama")];
    let committed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&committed);
    service
        .create_film_with_files(
            film.clone(),
            vec![file(10, "a@x.com"), file(11, "a@x.com")],
            move || flag.set(true),
            |err| panic!("unexpected failure: {err}"),
        )
        .unwrap();
    service.run_until_idle();
    assert!(committed.get());

    let session = service.executor().session();
    assert_eq!(
        SqliteFilmRepository::new(session).get_film(&film.key()).unwrap(),
        Some(film.clone())
    );
    let media = SqliteMediaFileRepository::new(session);
    let linked = media.list_files_for_film(&film.key()).unwrap();
    assert_eq!(linked.iter().map(|f| f.id).collect::<Vec<_>>(), vec![10, 11]);
    assert_eq!(
        media.media_target(10).unwrap(),
        Some(MediaTarget::Film(film.key()))
    );
}

#[test]
fn fetch_and_submit_query_read_without_committing() {
    let service = service();
    let setup = service.executor().session();
    SqliteUserRepository::new(setup).add_user(&user()).unwrap();
    setup.commit().unwrap();

    let handle = service
        .fetch(|session| SqliteUserRepository::new(session).get_user("a@x.com"))
        .unwrap();
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    service
        .submit_query(
            |session| Ok(Some(SqliteUserRepository::new(session).list_users()?.len())),
            move |n| sink.set(n),
        )
        .unwrap();
    service.run_until_idle();

    assert_eq!(handle.wait(), Some(user()));
    assert_eq!(count.get(), 1);
}
