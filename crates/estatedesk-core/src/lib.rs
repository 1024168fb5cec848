//! estatedesk core: the session and authentication layer of the listings app.
//!
//! Wiring, from the application entry point:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use estatedesk_core::api::ApiClient;
//! use estatedesk_core::auth::{HttpCredentialService, SessionStore};
//! use estatedesk_core::cache::{CredentialCache, MemoryStore};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let cache = CredentialCache::new(Arc::new(MemoryStore::new()));
//! let api = ApiClient::new("https://api.example.com")?;
//! let service = Arc::new(HttpCredentialService::new(api, cache.clone()));
//! let session = SessionStore::new(service, cache);
//! session.bootstrap().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod utils;

pub use auth::{AuthError, GuardDecision, RouteGuard, SessionState, SessionStore};
pub use config::Config;
pub use models::{Role, UserProfile};
