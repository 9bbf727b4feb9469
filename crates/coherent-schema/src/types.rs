//! Shared value types and identifier rules.

use std::collections::BTreeMap;
use thiserror::Error;

/// Key-value content of a settings store.
///
/// Ordering carries no meaning; a `BTreeMap` keeps comparisons set-based and
/// serialized output stable.
pub type Settings = BTreeMap<String, String>;

const MAX_ID_LEN: usize = 128;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidId(pub &'static str);

/// Settings store ids double as file names, so they are restricted to a
/// portable character set and may not be hidden files.
pub fn validate_store_id(id: &str) -> Result<(), InvalidId> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(InvalidId("store id must be 1-128 characters"));
    }
    if id.starts_with('.') {
        return Err(InvalidId("store id must not start with '.'"));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(InvalidId("store id must match [a-zA-Z0-9._-]"));
    }
    if id.ends_with(".lock") {
        return Err(InvalidId("store id must not end with '.lock'"));
    }
    Ok(())
}

pub fn validate_module_id(id: &str) -> Result<(), InvalidId> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(InvalidId("module id must be 1-128 characters"));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidId("module id must not contain whitespace"));
    }
    Ok(())
}
