//! Error types for encoding and decoding presence-map containers.

use thiserror::Error;

/// Result type alias for container operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Coarse classification of an [`Error`], used by callers that only care
/// about which stage of the pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Framing,
    Compression,
    Overflow,
    Io,
}

/// Container encode/decode errors.
///
/// Every variant aborts the current operation. Nothing here is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, detected before any I/O happens.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The container is shorter than its 8-byte size header.
    #[error("truncated container header: expected 8 bytes, got {got}")]
    TruncatedHeader { got: usize },

    /// Only one byte of a 2-byte frame length was present.
    #[error("truncated length field for frame {frame}")]
    TruncatedLength { frame: u64 },

    /// A frame payload ended before its declared length.
    #[error("incomplete frame {frame}: expected {expected}, got {got}")]
    IncompleteFrame { frame: u64, expected: usize, got: usize },

    /// The frames decoded to fewer bytes than the header's original size.
    #[error("container ended after {got} bytes but header records {expected}")]
    ShortContainer { expected: u64, got: u64 },

    /// An encoded block whose length is not a whole number of entries.
    #[error("encoded block of {len} bytes is not a multiple of the {entry_size}-byte entry size")]
    PartialEntry { len: usize, entry_size: usize },

    /// The compressor failed on a frame.
    #[error("codec failure in frame {frame}")]
    Compression {
        frame: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A decoded block did not re-encode to the stored frame payload.
    #[error("frame {frame} failed verification: re-encoded payload differs")]
    VerifyMismatch { frame: u64 },

    /// A compressed frame does not fit the 2-byte length field.
    #[error("frame {frame} compressed to {len} bytes, exceeding the 65535-byte frame limit")]
    Overflow { frame: u64, len: usize },

    /// I/O error from the underlying reader or writer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Wrap a codec failure with the index of the frame it happened in.
    pub fn compression(frame: u64, source: anyhow::Error) -> Self {
        Error::Compression {
            frame,
            source: source.into(),
        }
    }

    /// Which pipeline stage this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::TruncatedHeader { .. }
            | Error::TruncatedLength { .. }
            | Error::IncompleteFrame { .. }
            | Error::ShortContainer { .. }
            | Error::PartialEntry { .. } => ErrorKind::Framing,
            Error::Compression { .. } | Error::VerifyMismatch { .. } => ErrorKind::Compression,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Index of the frame the error refers to, when there is one.
    pub fn frame(&self) -> Option<u64> {
        match self {
            Error::TruncatedLength { frame }
            | Error::IncompleteFrame { frame, .. }
            | Error::Compression { frame, .. }
            | Error::VerifyMismatch { frame }
            | Error::Overflow { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::config("x").kind(), ErrorKind::Config);
        assert_eq!(Error::TruncatedLength { frame: 3 }.kind(), ErrorKind::Framing);
        assert_eq!(
            Error::PartialEntry { len: 5, entry_size: 2 }.kind(),
            ErrorKind::Framing
        );
        assert_eq!(Error::Overflow { frame: 0, len: 70_000 }.kind(), ErrorKind::Overflow);
        assert_eq!(
            Error::compression(7, anyhow::anyhow!("bad stream")).kind(),
            ErrorKind::Compression
        );
    }

    #[test]
    fn test_incomplete_frame_message() {
        let err = Error::IncompleteFrame {
            frame: 2,
            expected: 5,
            got: 2,
        };
        assert_eq!(err.to_string(), "incomplete frame 2: expected 5, got 2");
        assert_eq!(err.frame(), Some(2));
    }

    #[test]
    fn test_compression_error_keeps_source() {
        use std::error::Error as _;
        let err = Error::compression(4, anyhow::anyhow!("corrupt deflate stream"));
        assert_eq!(err.frame(), Some(4));
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("corrupt deflate stream"));
    }
}
