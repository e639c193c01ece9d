use chrono::NaiveDate;
use klex_core::db::open_db_in_memory;
use klex_core::model::{Flux, MediaFile, User};
use klex_core::repo::media_repo::{MediaFileRepository, SqliteMediaFileRepository};
use klex_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use klex_core::{ConnectionSession, RepoError, TransactionState};

fn session() -> ConnectionSession {
    ConnectionSession::new(open_db_in_memory().unwrap())
}

fn sample_user() -> User {
    User::new("a@x.com", "A", "B", 30, 12, "en")
}

fn owned_file(id: i64, email: &str) -> MediaFile {
    let mut file = MediaFile::new(
        id,
        4096,
        NaiveDate::from_ymd_opt(2022, 1, 15).unwrap(),
        email,
    );
    file.flux.push(Flux::video(1, 900, "h264", 1280, 720));
    file
}

#[test]
fn added_user_is_listed_with_every_field() {
    let session = session();
    let users = SqliteUserRepository::new(&session);

    users.add_user(&sample_user()).unwrap();
    session.commit().unwrap();

    let listed = users.list_users().unwrap();
    assert_eq!(listed, vec![sample_user()]);
    assert_eq!(listed[0].access_code_display(), "0012");
}

#[test]
fn nothing_is_durable_before_commit() {
    let session = session();
    let users = SqliteUserRepository::new(&session);

    users.add_user(&sample_user()).unwrap();
    assert_eq!(session.transaction_state().unwrap(), TransactionState::Open);
    session.rollback().unwrap();

    assert!(users.list_users().unwrap().is_empty());
}

#[test]
fn invalid_user_is_rejected_before_any_statement() {
    let session = session();
    let users = SqliteUserRepository::new(&session);

    let mut user = sample_user();
    user.preferred_language = "eng".to_string();
    let err = users.add_user(&user).unwrap_err();

    assert!(matches!(err, RepoError::Validation(ref v) if v.field == "preferred_language"));
    assert_eq!(session.transaction_state().unwrap(), TransactionState::Idle);
}

#[test]
fn email_rename_repoints_owned_media_files() {
    let session = session();
    let users = SqliteUserRepository::new(&session);
    let media = SqliteMediaFileRepository::new(&session);

    users.add_user(&sample_user()).unwrap();
    media.add_media_file(&owned_file(7, "a@x.com")).unwrap();
    session.commit().unwrap();

    let mut renamed = sample_user();
    renamed.email = "new@x.com".to_string();
    renamed.age = 31;
    assert_eq!(users.update_user("a@x.com", &renamed).unwrap(), 1);
    session.commit().unwrap();

    assert!(users.get_user("a@x.com").unwrap().is_none());
    assert_eq!(users.get_user("new@x.com").unwrap(), Some(renamed));
    let file = media.get_media_file(7).unwrap().unwrap();
    assert_eq!(file.user_email.as_deref(), Some("new@x.com"));
}

#[test]
fn stale_rename_matches_nothing_and_changes_nothing() {
    let session = session();
    let users = SqliteUserRepository::new(&session);
    users.add_user(&sample_user()).unwrap();
    session.commit().unwrap();

    let mut edited = sample_user();
    edited.first_name = "Changed".to_string();
    let matched = users.update_user("ghost@x.com", &edited).unwrap();
    session.commit().unwrap();

    assert_eq!(matched, 0);
    assert_eq!(users.list_users().unwrap(), vec![sample_user()]);
}

#[test]
fn deleting_a_user_who_owns_files_fails_at_commit() {
    let session = session();
    let users = SqliteUserRepository::new(&session);
    let media = SqliteMediaFileRepository::new(&session);
    users.add_user(&sample_user()).unwrap();
    media.add_media_file(&owned_file(1, "a@x.com")).unwrap();
    session.commit().unwrap();

    assert_eq!(users.delete_user("a@x.com").unwrap(), 1);
    let err = session.commit().unwrap_err();
    assert!(err.to_string().to_lowercase().contains("foreign key"));
    assert_eq!(session.transaction_state().unwrap(), TransactionState::Open);

    session.rollback().unwrap();
    assert_eq!(users.list_users().unwrap().len(), 1);
}
