//! Data models shared by the session core.
//!
//! - `UserProfile`: identity plus role, as returned by the credential service
//! - `Role`: coarse-grained access level used by the route guard
//! - `Registration`: fields submitted when creating an account

pub mod user;

pub use user::{Registration, Role, UserProfile};
