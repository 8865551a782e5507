//! Structured error types for the Vellum PDF writer.
//!
//! Every fallible operation in the crate returns [`PdfError`]. The variants
//! group into four kinds (see [`ErrorKind`]): I/O failures are fatal for the
//! operation in progress, format errors are fatal for the resource being
//! loaded, value errors reject a single bad argument, and structural errors
//! indicate misuse of the document lifecycle.

use std::io;

use thiserror::Error;

/// The unified error type returned by all public Vellum API functions.
#[derive(Debug, Error)]
pub enum PdfError {
    /// Opening, writing, or flushing the output file failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A font file could not be parsed as a TrueType font.
    #[error("font format error: {0}")]
    FontFormat(String),

    /// An image file could not be decoded.
    #[error("image format error: {0}")]
    ImageFormat(String),

    /// The document was closed without any pages.
    #[error("document has no pages")]
    NoPages,

    /// A builder was used after it was finished, or finished twice.
    #[error("content builder already finished")]
    BuilderFinished,

    /// A resource id did not refer to an allocated resource.
    #[error("unknown resource id")]
    BadResourceId,

    /// A color component passed to a raw operator was outside `[0, 1]`.
    #[error("color component out of range")]
    ColorOutOfRange,

    /// Line widths must be non-negative.
    #[error("negative line width")]
    NegativeLineWidth,

    /// Dash array entries must be non-negative.
    #[error("negative dash array entry")]
    NegativeDash,

    /// A dash array must contain at least one entry.
    #[error("empty dash array")]
    ZeroLengthArray,

    /// Flatness must lie in `[0, 100]`.
    #[error("flatness out of range")]
    InvalidFlatness,

    /// An ICC profile blob was empty or unusable.
    #[error("invalid ICC profile")]
    InvalidIccProfile,

    /// A color value carried the wrong number of channels for its colorspace.
    #[error("expected {expected} color channels, got {got}")]
    ChannelCountMismatch { expected: usize, got: usize },

    /// An operation was invoked on the wrong kind of content builder,
    /// e.g. pattern color outside a page context.
    #[error("operation not valid for this builder kind")]
    InvalidContextType,

    /// A Coons continuation patch was added before any full patch.
    #[error("continuation patch without a preceding patch")]
    DanglingContinuation,
}

/// Coarse classification of an error, matching the crate's error model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Value,
    Structural,
}

impl PdfError {
    /// Which of the four error families this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfError::Io(_) => ErrorKind::Io,
            PdfError::FontFormat(_) | PdfError::ImageFormat(_) | PdfError::InvalidIccProfile => {
                ErrorKind::Format
            }
            PdfError::BadResourceId
            | PdfError::ColorOutOfRange
            | PdfError::NegativeLineWidth
            | PdfError::NegativeDash
            | PdfError::ZeroLengthArray
            | PdfError::InvalidFlatness
            | PdfError::ChannelCountMismatch { .. } => ErrorKind::Value,
            PdfError::NoPages
            | PdfError::BuilderFinished
            | PdfError::InvalidContextType
            | PdfError::DanglingContinuation => ErrorKind::Structural,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(PdfError::NoPages.kind(), ErrorKind::Structural);
        assert_eq!(PdfError::NegativeLineWidth.kind(), ErrorKind::Value);
        assert_eq!(
            PdfError::FontFormat("bad magic".into()).kind(),
            ErrorKind::Format
        );
        let io = PdfError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_display_messages() {
        let e = PdfError::ChannelCountMismatch { expected: 4, got: 3 };
        assert_eq!(e.to_string(), "expected 4 color channels, got 3");
        assert_eq!(PdfError::NoPages.to_string(), "document has no pages");
    }
}
