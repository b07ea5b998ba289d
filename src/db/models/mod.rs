//! Record schemas split into domain-specific modules.

pub mod common;
pub mod inventory;
pub mod part_request;
pub mod user;

pub use common::*;
pub use inventory::*;
pub use part_request::*;
pub use user::*;
