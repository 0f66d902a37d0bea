//! # JukeQ Common Library
//!
//! Shared code for the JukeQ request-queue service:
//! - Database initialization, schema, and models
//! - Request status lifecycle
//! - Configuration loading and root folder resolution
//! - Error taxonomy
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use db::models::RequestStatus;
pub use error::{Error, Result};
