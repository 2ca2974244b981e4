//! Request extractors.

pub mod session;
pub use session::{AdminSession, UserId, SESSION_COOKIE, SESSION_ID_HEADER, USER_ID_HEADER};
