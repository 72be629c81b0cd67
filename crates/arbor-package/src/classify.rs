//! Payload classification.
//!
//! Given the first bytes of an executable payload, decide whether it is a
//! raw executable, a package archive, or a payload that declares a custom
//! runner. Classification looks at a capped prefix only; a runner
//! declaration whose terminating newline falls outside the cap is treated
//! as a raw executable rather than an error.

/// Magic constant at the start of a package archive.
pub const ARCHIVE_MAGIC: [u8; 8] = [0xc8, 0xbf, 0x0b, 0x48, 0xad, 0xab, 0xc5, 0x11];

/// Literal marker opening a runner declaration.
pub const RUNNER_MARKER: &[u8] = b"#!fuchsia ";

/// Maximum number of payload bytes classification will look at.
pub const CLASSIFY_PREFIX_CAP: usize = 2048;

/// How a payload should be launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchKind {
    /// A raw executable; spawn it directly.
    Process,
    /// A package archive; unpack before launching.
    Archive,
    /// A payload declaring the named delegated runner.
    Runner(String),
}

/// Classify a payload by its leading bytes.
///
/// Priority: archive magic, then runner marker, then raw process. Only the
/// first [`CLASSIFY_PREFIX_CAP`] bytes are consulted; a runner marker with
/// no newline inside the cap degrades to [`LaunchKind::Process`].
#[must_use]
pub fn classify(payload: &[u8]) -> LaunchKind {
    let prefix = &payload[..payload.len().min(CLASSIFY_PREFIX_CAP)];

    if prefix.starts_with(&ARCHIVE_MAGIC) {
        return LaunchKind::Archive;
    }

    if prefix.starts_with(RUNNER_MARKER) {
        let declaration = &prefix[RUNNER_MARKER.len()..];
        if let Some(end) = declaration.iter().position(|&b| b == b'\n') {
            let name = String::from_utf8_lossy(&declaration[..end]).into_owned();
            return LaunchKind::Runner(name);
        }
    }

    LaunchKind::Process
}
