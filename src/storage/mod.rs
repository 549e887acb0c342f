//! SQLite storage layer for content deploy.
//!
//! This module provides the target content store using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Revisions for types that keep them
//! - Audit events carrying the acting identity
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation
//! - [`store`] - Store capability consumed by import and export

pub mod events;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use sqlite::{MutationContext, SqliteStorage};
pub use store::{IdentityResolver, RecordStore};
