//! Content deploy - move content between sites as files
//!
//! This crate provides the core functionality for the `dcd` CLI tool.
//! Content records are exported to a folder of JSON files, one per record,
//! and imported on another site in dependency order, reconciled against
//! what the target already holds.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Record, TypeDescriptor, Account, PathAlias)
//! - [`storage`] - SQLite target store
//! - [`sync`] - Import, export and URL aliases
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
