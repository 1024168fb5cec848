//! Small formatting helpers.

pub mod format;

pub use format::{format_phone, mask_token};
