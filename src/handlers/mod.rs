//! HTTP handlers for admin pages and the JSON API.

pub mod admin;
pub mod api;
pub use admin::*;
pub use api::*;
