//! Storage key derivation: `<ip>_<token>_<YYYYMMDD-HHMMSS>`.

use crate::models::upload::StorageKey;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use uuid::Uuid;

/// Hex characters of the random token.
const TOKEN_LEN: usize = 8;
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Key for `ip` at the current UTC time.
pub fn generate(ip: IpAddr) -> StorageKey {
    generate_at(ip, Utc::now())
}

/// Key for `ip` at `now`. The timestamp is fixed width so keys from one
/// address sort by arrival time.
pub fn generate_at(ip: IpAddr, now: DateTime<Utc>) -> StorageKey {
    let token = Uuid::new_v4().simple().to_string();
    StorageKey::new(format!(
        "{}_{}_{}",
        ip,
        &token[..TOKEN_LEN],
        now.format(TIMESTAMP_FORMAT)
    ))
}

/// Generated key, suffixed with the caller's file name when it survives
/// sanitizing. The name goes last so its extension stays at the end.
pub fn compose(base: &StorageKey, file_name: Option<&str>) -> StorageKey {
    match file_name.and_then(sanitize_file_name) {
        Some(name) => StorageKey::new(format!("{}_{}", base, name)),
        None => base.clone(),
    }
}

/// Key under which the transformed copy of `original` is stored.
pub fn modified_key(original: &StorageKey) -> StorageKey {
    StorageKey::new(format!("modified_{}", original))
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let last = trimmed
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(trimmed);

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Collapse dot runs so the name can never spell `..`.
    let mut sanitized = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if c == '.' && sanitized.ends_with('.') {
            continue;
        }
        sanitized.push(c);
    }

    if sanitized.chars().all(|c| c == '.' || c == '_') {
        None
    } else {
        Some(sanitized)
    }
}
