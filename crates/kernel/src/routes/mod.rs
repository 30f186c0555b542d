//! HTTP route handlers.

pub mod connection;
pub mod content;
pub mod health;
pub mod helpers;
pub mod media;
pub mod project;
pub mod schema;
pub mod sync;
