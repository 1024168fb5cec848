//! REST client for the listings API.
//!
//! This module provides the `ApiClient` used by the HTTP credential service.
//! Authenticated calls send the session token as a bearer header.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
