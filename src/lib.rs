//! Static, searchable mirror of an RT ticket tracker export.
//!
//! An export is a directory (or a zip archive) of `<id>.json` ticket
//! documents. [`ingest`] turns it into a manifest plus a full-text index;
//! the server then answers searches through [`pagination`] and serves
//! tickets and attachments through [`repository`].

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod offsets;
pub mod pagination;
pub mod repository;
pub mod search;
pub mod storage;

pub use error::{AppError, Result};
