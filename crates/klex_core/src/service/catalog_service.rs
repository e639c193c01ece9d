//! User-visible catalog actions on top of the task executor.
//!
//! # Responsibility
//! - Run each action as one unit: its statements, then `commit()`.
//! - Roll back inside that same unit when any step fails or panics.
//!
//! # Invariants
//! - A failed action never leaves its transaction open.
//! - `on_committed` runs on the control thread only after a durable commit.

use crate::executor::{ExecResult, QueryHandle, TaskError, TaskExecutor, TaskId};
use crate::model::{Film, MediaFile};
use crate::repo::film_repo::{FilmRepository, SqliteFilmRepository};
use crate::repo::media_repo::{MediaFileRepository, SqliteMediaFileRepository};
use crate::repo::{RepoError, RepoResult};
use crate::session::ConnectionSession;
use log::{info, warn};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

/// Coordinates one committed chain per user action.
pub struct CatalogService {
    executor: TaskExecutor,
}

impl CatalogService {
    pub fn new(executor: TaskExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Runs `work` and commits in one unit.
    ///
    /// On failure the unit rolls back before `on_error` receives the error.
    pub fn submit_action<W, S, E>(&self, work: W, on_committed: S, on_error: E) -> ExecResult<TaskId>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<()> + Send + 'static,
        S: FnOnce() + 'static,
        E: FnOnce(TaskError) + 'static,
    {
        self.executor.execute_then(
            move |session| commit_or_rollback(session, work),
            on_committed,
            Some(Box::new(on_error)),
        )
    }

    /// Read-only action; no commit is issued.
    pub fn submit_query<W, T, R>(&self, work: W, on_result: R) -> ExecResult<TaskId>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<Option<T>> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(T) + 'static,
    {
        self.executor.query_then(work, on_result, None)
    }

    /// Read-only action whose value is collected through a handle.
    pub fn fetch<W, T>(&self, work: W) -> ExecResult<QueryHandle<T>>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<Option<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.executor.query(work)
    }

    /// Inserts `film`, then every file with its flux and film link, as one
    /// committed action.
    pub fn create_film_with_files<S, E>(
        &self,
        film: Film,
        files: Vec<MediaFile>,
        on_committed: S,
        on_error: E,
    ) -> ExecResult<TaskId>
    where
        S: FnOnce() + 'static,
        E: FnOnce(TaskError) + 'static,
    {
        self.submit_action(
            move |session| {
                let films = SqliteFilmRepository::new(session);
                let media = SqliteMediaFileRepository::new(session);
                films.add_film(&film)?;
                let key = film.key();
                for file in &files {
                    media.add_media_file(file)?;
                    films.add_file_to_film(file.id, &key)?;
                }
                info!(
                    "event=film_create module=service status=ok files={}",
                    files.len()
                );
                Ok(())
            },
            on_committed,
            on_error,
        )
    }

    /// Runs every pending unit and its continuation.
    pub fn run_until_idle(&self) -> usize {
        self.executor.run_until_idle()
    }

    pub fn shutdown(self) -> ExecResult<()> {
        self.executor.shutdown()
    }
}

fn commit_or_rollback<W>(session: &ConnectionSession, work: W) -> RepoResult<()>
where
    W: FnOnce(&ConnectionSession) -> RepoResult<()>,
{
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        work(session)?;
        session.commit().map_err(RepoError::from)
    }));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            roll_back_after_failure(session);
            Err(err)
        }
        Err(payload) => {
            roll_back_after_failure(session);
            resume_unwind(payload)
        }
    }
}

fn roll_back_after_failure(session: &ConnectionSession) {
    match session.rollback() {
        Ok(()) => info!("event=action_rollback module=service status=ok"),
        Err(err) => warn!("event=action_rollback module=service status=error error={err}"),
    }
}
