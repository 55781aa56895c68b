//! # Regtrack Common Library
//!
//! Shared code for the regtrack services including:
//! - Record models (master, flavour, document, collection)
//! - Role constants and the ACL policy
//! - Search query compiler
//! - Configuration loading
//! - Common error types

pub mod acl;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod roles;

pub use error::{Error, Result};
