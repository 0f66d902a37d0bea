//! Database initialization, models, and collaborator write paths

pub mod init;
pub mod models;
pub mod seed;

pub use init::*;
pub use models::*;
pub use seed::*;
