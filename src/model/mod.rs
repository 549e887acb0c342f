//! Data models for content deploy.
//!
//! This module contains the domain models:
//! - Record (and the references between records)
//! - TypeDescriptor / TypeRegistry
//! - Account
//! - PathAlias

pub mod entity_type;
pub mod record;

pub use entity_type::{
    FILE_TYPE, TypeDescriptor, TypeKind, TypeRegistry, TypeRole, USER_TYPE,
};
pub use record::{ANONYMOUS_ID, Account, EntityRef, PathAlias, ROOT_ID, Record};
