//! Resource models.
//!
//! Every model round-trips through JSON documents in the resource store,
//! using camelCase keys on the wire.

pub mod content;
pub mod project;
pub mod schema;
pub mod user;

pub use content::Content;
pub use project::{EnvironmentSettings, Project, SyncSettings};
pub use schema::{FieldDefinition, Schema};
pub use user::{StoredToken, User};
