//! Kernel services.
//!
//! Services own the rules around stored resources. Route handlers stay thin
//! and call into these; every service is cheap to clone.

pub mod connection;
pub mod content;
pub mod edit_lease;
mod error;
pub mod project;
pub mod schema;
pub mod sync;
pub mod user;

pub use connection::ConnectionService;
pub use content::ContentService;
pub use edit_lease::EditLeaseService;
pub use error::{ServiceError, ServiceResult};
pub use project::ProjectService;
pub use schema::SchemaService;
pub use sync::SyncService;
pub use user::UserService;
