//! Row version policy.
//!
//! Versions are dot-separated unsigned decimal fragments (`"3"`, `"1.0"`,
//! `"2.4.9"`). Bumping increments the last fragment and keeps its width, so
//! `"1.09"` becomes `"1.10"` and `"007"` becomes `"008"`.

use std::fmt::Debug;

use thiserror::Error;

/// Version string that does not follow the version grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version '{version}': {reason}")]
pub struct VersionFormatError {
    pub version: String,
    pub reason: &'static str,
}

/// Computes the next version identifier from the current one.
///
/// Implementations must be pure: the same input always yields the same
/// output and nothing is persisted.
pub trait VersionPolicy: Debug + Send + Sync {
    fn next_version(&self, current: &str) -> Result<String, VersionFormatError>;
}

/// Dotted numeric versions, bumping the least significant fragment.
#[derive(Debug, Default, Clone, Copy)]
pub struct DottedVersion;

impl VersionPolicy for DottedVersion {
    fn next_version(&self, current: &str) -> Result<String, VersionFormatError> {
        let invalid = |reason| VersionFormatError {
            version: current.to_string(),
            reason,
        };

        if current.is_empty() {
            return Err(invalid("empty version"));
        }

        let (head, last) = match current.rfind('.') {
            Some(pos) => (&current[..=pos], &current[pos + 1..]),
            None => ("", current),
        };

        for fragment in current.split('.') {
            if fragment.is_empty() {
                return Err(invalid("empty fragment"));
            }
            if !fragment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("fragment is not an unsigned number"));
            }
        }

        let bumped = last
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| invalid("fragment out of range"))?;

        Ok(format!("{head}{bumped:0width$}", width = last.len()))
    }
}

/// Bumps `current` with the default [`DottedVersion`] policy.
pub fn next_version(current: &str) -> Result<String, VersionFormatError> {
    DottedVersion.next_version(current)
}
