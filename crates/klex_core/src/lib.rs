//! Core data-access layer for the KLEX media catalog.
//! Owns the single connection session, the worker pool that runs catalog
//! work off the control thread, and the cascading relational gateway.

pub mod db;
pub mod executor;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use executor::{
    ErrorHandler, ExecResult, ExecutorConfig, ExecutorError, QueryHandle, TaskError,
    TaskExecutor, TaskId,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use repo::{RepoError, RepoResult};
pub use service::CatalogService;
pub use session::{ConnectionSession, TransactionState};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
