//! HTTP middleware components.

pub mod api_token;

pub use api_token::{CurrentUser, authenticate_api_token};
