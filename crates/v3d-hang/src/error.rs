use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HangDumpError {
    /// The leading version tag is not the one (and only) supported layout.
    /// There is no forward-compat guessing for unknown versions.
    #[error("unsupported hang dump version {0}")]
    UnsupportedVersion(u32),

    #[error("truncated hang dump: {what} needs {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
}
