//! Error taxonomy for the reader.
//!
//! A missing path from [`crate::squashfs::Squashfs::select`] is deliberately *not* a variant
//! here: per the on-disk contract a lookup miss is routine and surfaces as `Option::None`, never
//! as an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SquashfsError>;

#[derive(Debug, Error)]
pub enum SquashfsError {
    /// Bad magic, unsupported version, an out-of-range type field, a directory region whose
    /// byte count doesn't match its header, or any other on-disk structural inconsistency.
    #[error("format error: {0}")]
    Format(String),

    /// Unknown compression id, or a decompressor failed to produce the expected output.
    #[error("compression error: {0}")]
    Compression(String),

    /// Short read, seek past end, or any other failure from the underlying byte source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SquashfsError {
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }

    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::Compression(msg.into())
    }
}
