//! Typed error hierarchy for the filter.
//!
//! Uses `thiserror` for library-grade errors.  Application code should wrap
//! these in `anyhow::Result` at call sites.

use crate::types::PixelFormat;

/// All errors originating from the supra filter stack.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    // ── Bind time ─────────────────────────────────────────────────────
    #[error("Filter bind failed: {0}")]
    BindFailed(String),

    // ── Stream contract ───────────────────────────────────────────────
    #[error("Stream failed: {0}")]
    StreamFailed(String),

    #[error("Unsupported input format: {0:?}")]
    UnsupportedFormat(PixelFormat),

    // ── Video processor ───────────────────────────────────────────────
    #[error("Video processor error: {0}")]
    Processor(String),

    #[error("Processor view error: {0}")]
    View(String),

    #[error("Processing submission error: {0}")]
    Submit(String),

    // ── Vendor extensions ─────────────────────────────────────────────
    #[error("Vendor extension error: {0}")]
    Extension(String),

    // ── Frame ingest ──────────────────────────────────────────────────
    #[error("Surface upload error: {0}")]
    Upload(String),

    #[error("Texture allocation error: {0}")]
    Allocation(String),
}

impl FilterError {
    /// Whether this error ends the stream (the host must stop the filter)
    /// rather than costing a single frame.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(self, Self::BindFailed(_) | Self::StreamFailed(_))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::FilterError;

    #[test]
    fn only_bind_and_stream_errors_are_fatal() {
        assert!(FilterError::BindFailed("no device".into()).is_stream_fatal());
        assert!(FilterError::StreamFailed("odd dims".into()).is_stream_fatal());
        assert!(!FilterError::Processor("enumerator".into()).is_stream_fatal());
        assert!(!FilterError::Submit("blt".into()).is_stream_fatal());
        assert!(!FilterError::Extension("vpe".into()).is_stream_fatal());
    }
}
