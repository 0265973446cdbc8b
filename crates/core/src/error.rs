//! Unified error types for docket.

use std::path::PathBuf;

/// Errors raised by the core crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing the cache backing file failed.
    #[error("CACHE_ERROR: {path}: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache document could not be serialized.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    CacheSerialize(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::CacheIo { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_error_display() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(source);
        assert!(err.to_string().starts_with("CACHE_ERROR: serialization failed"));
    }

    #[test]
    fn test_cache_io_display_includes_path() {
        let err = Error::cache_io("/tmp/cache.json", std::io::Error::other("disk full"));
        let msg = err.to_string();
        assert!(msg.starts_with("CACHE_ERROR"));
        assert!(msg.contains("/tmp/cache.json"));
        assert!(msg.contains("disk full"));
    }
}
