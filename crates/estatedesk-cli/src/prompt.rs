//! Terminal input for the sign-in and registration commands.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

/// Maximum length for names and emails.
pub const MAX_TEXT_LENGTH: usize = 100;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for a phone number as typed.
pub const MAX_PHONE_LENGTH: usize = 32;

/// Trimmed `input`, rejecting control characters and anything over `max_len`.
pub fn sanitize(input: &str, max_len: usize) -> Result<String> {
    check(input.trim(), max_len)
}

/// Like [`sanitize`] but keeps surrounding spaces, which may be part of a
/// password. Only the line ending is stripped.
pub fn sanitize_password(input: &str) -> Result<String> {
    check(input.trim_end_matches(['\r', '\n']), MAX_PASSWORD_LENGTH)
}

fn check(value: &str, max_len: usize) -> Result<String> {
    if value.chars().any(char::is_control) {
        bail!("Input must not contain control characters");
    }
    if value.chars().count() > max_len {
        bail!("Input must be at most {} characters", max_len);
    }
    Ok(value.to_string())
}

/// Read one line from stdin. An empty answer falls back to `default`.
pub fn prompt_line(label: &str, default: Option<&str>, max_len: usize) -> Result<String> {
    let mut stdout = io::stdout();
    match default {
        Some(default) => write!(stdout, "{} [{}]: ", label, default)?,
        None => write!(stdout, "{}: ", label)?,
    }
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    let value = sanitize(&line, max_len)?;
    match default {
        Some(default) if value.is_empty() => Ok(default.to_string()),
        _ => Ok(value),
    }
}

/// Read a password without echoing it.
pub fn prompt_password(label: &str) -> Result<String> {
    let password =
        rpassword::prompt_password(format!("{}: ", label)).context("Failed to read password")?;
    sanitize_password(&password)
}
