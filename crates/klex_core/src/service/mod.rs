//! Use-case layer over the executor and the gateway.
//!
//! # Responsibility
//! - Express each user-visible action as one committed unit of work.
//! - Keep callers free of manual `commit()`/`rollback()` bookkeeping.

pub mod catalog_service;

pub use catalog_service::CatalogService;
