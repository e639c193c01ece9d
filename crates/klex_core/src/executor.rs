//! Worker pool that runs catalog work off the control thread.
//!
//! # Responsibility
//! - Run units of work against the shared `ConnectionSession` on a fixed
//!   set of named worker threads.
//! - Deliver every completion (value or error) back to the control thread,
//!   where registered continuations run inside `pump`/`run_until_idle`.
//!
//! # Invariants
//! - `TaskExecutor` is neither `Send` nor `Sync`: the thread that builds it
//!   is the control thread, and every continuation runs there.
//! - A unit's continuation runs only after its work returned.
//! - With `pool_size == 1` units run one at a time in submission order.
//!   Larger pools give no ordering across units, and concurrent units share
//!   the session's single open transaction.
//! - A worker panic is caught and delivered as `TaskError::Panicked`.
//! - Shutdown discards queued units, detaches in-flight ones, then rolls
//!   back and closes the session.

use crate::db::DbError;
use crate::logging::sanitize_message;
use crate::repo::{RepoError, RepoResult};
use crate::session::ConnectionSession;
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

const MAX_PANIC_MESSAGE_CHARS: usize = 256;

pub type TaskId = u64;
pub type ExecResult<T> = Result<T, ExecutorError>;

/// Continuation for a failed unit.
pub type ErrorHandler = Box<dyn FnOnce(TaskError)>;

type Payload = Box<dyn Any + Send>;
type TaskOutcome = Result<Option<Payload>, TaskError>;
type Job = Box<dyn FnOnce(&ConnectionSession) -> TaskOutcome + Send>;
type ErrorPresenter = Rc<dyn Fn(&TaskError)>;

/// Error delivered to continuations on the control thread.
#[derive(Debug)]
pub enum TaskError {
    Failed(RepoError),
    /// The work panicked; carries the sanitized panic message.
    Panicked(String),
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "{err}"),
            Self::Panicked(message) => write!(f, "task panicked: {message}"),
        }
    }
}

impl Error for TaskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

impl From<RepoError> for TaskError {
    fn from(value: RepoError) -> Self {
        Self::Failed(value)
    }
}

impl From<DbError> for TaskError {
    fn from(value: DbError) -> Self {
        Self::Failed(RepoError::Db(value))
    }
}

/// Error raised by the executor itself.
#[derive(Debug)]
pub enum ExecutorError {
    InvalidConfig(String),
    Spawn(std::io::Error),
    /// Work was submitted after shutdown began or every worker exited.
    ShutDown,
    /// Teardown rollback/close failed.
    Session(DbError),
}

impl Display for ExecutorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(message) => write!(f, "invalid executor config: {message}"),
            Self::Spawn(err) => write!(f, "failed to spawn worker thread: {err}"),
            Self::ShutDown => write!(f, "executor is shut down"),
            Self::Session(err) => write!(f, "session teardown failed: {err}"),
        }
    }
}

impl Error for ExecutorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            Self::Session(err) => Some(err),
            Self::InvalidConfig(_) | Self::ShutDown => None,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads. `1` gives single-writer FIFO semantics.
    pub pool_size: usize,
    pub thread_name_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pool_size: 1,
            thread_name_prefix: "klex-db".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ExecResult<()> {
        if self.pool_size == 0 {
            return Err(ExecutorError::InvalidConfig(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ExecutorError::InvalidConfig(
                "thread_name_prefix must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result slot of one `query` unit, filled by the worker.
pub struct QueryHandle<T> {
    id: TaskId,
    receiver: Receiver<Option<T>>,
}

impl<T> QueryHandle<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the value if the unit already finished with one.
    ///
    /// `None` means still running, failed, or finished without a value.
    pub fn try_take(&self) -> Option<T> {
        self.receiver.try_recv().ok().flatten()
    }

    /// Blocks until the unit finishes. Failed, discarded or panicked units
    /// resolve to `None`.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok().flatten()
    }
}

struct Envelope {
    id: TaskId,
    job: Job,
}

struct Completion {
    id: TaskId,
    outcome: TaskOutcome,
}

struct Continuation {
    on_value: Option<Box<dyn FnOnce(Option<Payload>)>>,
    on_error: Option<ErrorHandler>,
}

/// Fixed-size worker pool bound to one `ConnectionSession`.
pub struct TaskExecutor {
    session: Arc<ConnectionSession>,
    jobs: Option<Sender<Envelope>>,
    completions: Receiver<Completion>,
    continuations: RefCell<HashMap<TaskId, Continuation>>,
    presenter: RefCell<ErrorPresenter>,
    next_id: Cell<TaskId>,
    in_flight: Cell<usize>,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("in_flight", &self.in_flight.get())
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    /// Spawns `config.pool_size` workers sharing `session`.
    pub fn new(session: ConnectionSession, config: ExecutorConfig) -> ExecResult<Self> {
        config.validate()?;
        let session = Arc::new(session);
        let (job_tx, job_rx) = mpsc::channel::<Envelope>();
        let (done_tx, done_rx) = mpsc::channel::<Completion>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let stopping = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.pool_size);
        for index in 0..config.pool_size {
            let jobs = Arc::clone(&job_rx);
            let done = done_tx.clone();
            let session = Arc::clone(&session);
            let stopping = Arc::clone(&stopping);
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || run_worker(index, &jobs, &done, &session, &stopping))
                .map_err(ExecutorError::Spawn)?;
            workers.push(handle);
        }

        info!(
            "event=executor_start module=executor status=ok pool_size={}",
            config.pool_size
        );
        Ok(Self {
            session,
            jobs: Some(job_tx),
            completions: done_rx,
            continuations: RefCell::new(HashMap::new()),
            presenter: RefCell::new(Rc::new(present_error)),
            next_id: Cell::new(1),
            in_flight: Cell::new(0),
            stopping,
            workers,
        })
    }

    /// The shared session, for control-thread reads outside the pool.
    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// Replaces the hook used when a failed unit has no `on_error`.
    pub fn set_error_presenter<F>(&self, presenter: F)
    where
        F: Fn(&TaskError) + 'static,
    {
        *self.presenter.borrow_mut() = Rc::new(presenter);
    }

    /// Runs `work` on a worker; failures go to the error presenter.
    pub fn execute<W>(&self, work: W) -> ExecResult<TaskId>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<()> + Send + 'static,
    {
        self.submit(
            unit_job(work),
            Continuation {
                on_value: None,
                on_error: None,
            },
        )
    }

    /// Runs `work`, then `on_success` or `on_error` on the control thread.
    /// A `None` error handler falls back to the error presenter.
    pub fn execute_then<W, S>(
        &self,
        work: W,
        on_success: S,
        on_error: Option<ErrorHandler>,
    ) -> ExecResult<TaskId>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<()> + Send + 'static,
        S: FnOnce() + 'static,
    {
        self.submit(
            unit_job(work),
            Continuation {
                on_value: Some(Box::new(move |_| on_success())),
                on_error,
            },
        )
    }

    /// Runs `work` and exposes its value through a handle.
    pub fn query<W, T>(&self, work: W) -> ExecResult<QueryHandle<T>>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<Option<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (slot_tx, slot_rx) = mpsc::channel::<Option<T>>();
        let job: Job = Box::new(move |session| match work(session) {
            Ok(value) => {
                let _ = slot_tx.send(value);
                Ok(None)
            }
            Err(err) => {
                let _ = slot_tx.send(None);
                Err(TaskError::Failed(err))
            }
        });
        let id = self.submit(
            job,
            Continuation {
                on_value: None,
                on_error: None,
            },
        )?;
        Ok(QueryHandle {
            id,
            receiver: slot_rx,
        })
    }

    /// Runs `work`, then `on_result` with its value on the control thread.
    /// `Ok(None)` skips `on_result`.
    pub fn query_then<W, T, R>(
        &self,
        work: W,
        on_result: R,
        on_error: Option<ErrorHandler>,
    ) -> ExecResult<TaskId>
    where
        W: FnOnce(&ConnectionSession) -> RepoResult<Option<T>> + Send + 'static,
        T: Send + 'static,
        R: FnOnce(T) + 'static,
    {
        let job: Job = Box::new(move |session| {
            let value = work(session)?;
            Ok(value.map(|value| Box::new(value) as Payload))
        });
        self.submit(
            job,
            Continuation {
                on_value: Some(Box::new(move |payload| {
                    let Some(payload) = payload else {
                        return;
                    };
                    match payload.downcast::<T>() {
                        Ok(value) => on_result(*value),
                        Err(_) => error!(
                            "event=task_dispatch module=executor status=error error_code=payload_type_mismatch"
                        ),
                    }
                })),
                on_error,
            },
        )
    }

    /// Runs every continuation whose unit already completed. Never blocks.
    pub fn pump(&self) -> usize {
        let mut dispatched = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.dispatch(completion);
            dispatched += 1;
        }
        dispatched
    }

    /// Blocks until every submitted unit completed and its continuation ran.
    ///
    /// Continuations may submit more work; those units are awaited too.
    pub fn run_until_idle(&self) -> usize {
        let mut dispatched = 0;
        while self.in_flight.get() > 0 {
            match self.completions.recv() {
                Ok(completion) => {
                    self.dispatch(completion);
                    dispatched += 1;
                }
                Err(_) => {
                    warn!(
                        "event=executor_idle module=executor status=workers_gone pending={}",
                        self.in_flight.get()
                    );
                    break;
                }
            }
        }
        dispatched
    }

    /// Units submitted whose continuation has not run yet.
    pub fn pending(&self) -> usize {
        self.in_flight.get()
    }

    /// Stops the pool, then rolls back and closes the session.
    ///
    /// Queued units are discarded and in-flight units are detached; their
    /// continuations never run.
    pub fn shutdown(mut self) -> ExecResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> ExecResult<()> {
        if self.jobs.is_none() {
            return Ok(());
        }
        self.stopping.store(true, Ordering::SeqCst);
        self.jobs = None;
        let detached = self.workers.len();
        self.workers.clear();
        let discarded = self.continuations.borrow().len();
        self.continuations.borrow_mut().clear();

        // `close` rolls back and releases the connection under one lock.
        let close = self.session.close();
        info!(
            "event=executor_shutdown module=executor status=ok workers_detached={} continuations_dropped={}",
            detached, discarded
        );
        close.map_err(ExecutorError::Session)
    }

    fn submit(&self, job: Job, continuation: Continuation) -> ExecResult<TaskId> {
        let jobs = self.jobs.as_ref().ok_or(ExecutorError::ShutDown)?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        self.continuations.borrow_mut().insert(id, continuation);
        if jobs.send(Envelope { id, job }).is_err() {
            self.continuations.borrow_mut().remove(&id);
            return Err(ExecutorError::ShutDown);
        }
        self.in_flight.set(self.in_flight.get() + 1);
        debug!("event=task_submit module=executor task_id={id}");
        Ok(id)
    }

    fn dispatch(&self, completion: Completion) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
        let continuation = self.continuations.borrow_mut().remove(&completion.id);
        let Some(continuation) = continuation else {
            return;
        };

        match completion.outcome {
            Ok(payload) => {
                if let Some(on_value) = continuation.on_value {
                    on_value(payload);
                }
            }
            Err(err) => match continuation.on_error {
                Some(on_error) => on_error(err),
                None => {
                    let presenter = Rc::clone(&self.presenter.borrow());
                    presenter(&err);
                }
            },
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("event=executor_shutdown module=executor status=error error={err}");
        }
    }
}

fn unit_job<W>(work: W) -> Job
where
    W: FnOnce(&ConnectionSession) -> RepoResult<()> + Send + 'static,
{
    Box::new(move |session| {
        work(session)?;
        Ok(None)
    })
}

fn run_worker(
    index: usize,
    jobs: &Mutex<Receiver<Envelope>>,
    done: &Sender<Completion>,
    session: &ConnectionSession,
    stopping: &AtomicBool,
) {
    debug!("event=worker_start module=executor worker={index}");
    loop {
        let envelope = {
            let Ok(receiver) = jobs.lock() else {
                break;
            };
            match receiver.recv() {
                Ok(envelope) => envelope,
                Err(_) => break,
            }
        };
        if stopping.load(Ordering::SeqCst) {
            debug!(
                "event=task_discard module=executor worker={} task_id={}",
                index, envelope.id
            );
            continue;
        }

        let started_at = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| (envelope.job)(session)))
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
        let status = match &outcome {
            Ok(_) => "ok",
            Err(TaskError::Failed(_)) => "error",
            Err(TaskError::Panicked(_)) => "panicked",
        };
        debug!(
            "event=task_done module=executor worker={} task_id={} status={} duration_ms={}",
            index,
            envelope.id,
            status,
            started_at.elapsed().as_millis()
        );

        if done
            .send(Completion {
                id: envelope.id,
                outcome,
            })
            .is_err()
        {
            break;
        }
    }
    debug!("event=worker_stop module=executor worker={index}");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let raw = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    sanitize_message(&raw, MAX_PANIC_MESSAGE_CHARS)
}

fn present_error(err: &TaskError) {
    error!("event=task_failed module=executor status=error error={err}");
}
