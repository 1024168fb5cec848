//! Persisted credential cache.
//!
//! This module provides:
//! - `KeyValueStore`: the durable string store, with file, keychain and
//!   in-memory backends
//! - `CredentialCache`: the session token and user snapshot kept on top of it
//!
//! The token is the only authoritative entry. The user snapshot is a display
//! hint and is never used to decide whether someone is signed in.

pub mod credentials;
pub mod store;

pub use credentials::{CachedData, CredentialCache, PersistedCredential, TOKEN_KEY, USER_KEY};
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
