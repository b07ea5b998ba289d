//! Record operations on behalf of an authenticated user.
//!
//! Handlers resolve the caller with the auth guard and pass the [`User`]
//! in explicitly; services validate before touching storage.
//!
//! [`User`]: crate::db::User

pub mod inventory;
pub mod part_request;
