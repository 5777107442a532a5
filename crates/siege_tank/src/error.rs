//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::compression::DataFormat;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// The archive index or header violates the Tank layout
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The caller asked for something the archive cannot answer
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// failed to decompress resource "{path}"
    #[error("failed to decompress resource \"{path}\"")]
    Codec {
        path: String,
        #[source]
        source: CodecError,
    },

    /// resource checksum did not match the stored value
    #[error(
        "resource \"{path}\" checksum 0x{actual:08X} does not match the expected 0x{expected:08X}"
    )]
    ChecksumMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    /// failed to write resource file
    #[error("failed to write resource file \"{}\"", .path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Structural errors in the on-disk index. Always fatal to the operation
/// in progress; the archive or resource is treated as unusable.
#[derive(Error, Diagnostic, Debug)]
pub enum FormatError {
    /// header product id doesn't match the expected value
    #[error("header product id doesn't match the expected value")]
    ProductIdMismatch,

    /// header tank id doesn't match the expected value
    #[error("header tank id doesn't match the expected value")]
    TankIdMismatch,

    /// invalid directory offset: {0}
    #[error("invalid directory offset: {0}")]
    InvalidDirOffset(u32),

    /// invalid directory parent offset: {0}
    #[error("invalid directory parent offset: {0}")]
    InvalidDirParentOffset(u32),

    /// invalid directory child offset: {0}
    #[error("invalid directory child offset: {0}")]
    InvalidChildOffset(u32),

    /// invalid file offset: {0}
    #[error("invalid file offset: {0}")]
    InvalidFileOffset(u32),

    /// invalid file parent offset: {0}
    #[error("invalid file parent offset: {0}")]
    InvalidFileParentOffset(u32),

    /// found an orphaned directory entry
    #[error("found an orphaned directory entry \"{0}\"")]
    OrphanDirEntry(String),

    /// found an orphaned file entry
    #[error("found an orphaned file entry \"{name}\" (parent offset {parent_offset})")]
    OrphanFileEntry { name: String, parent_offset: u32 },

    /// the parent chain of a directory never reaches the root
    #[error("parent chain of directory \"{0}\" does not terminate at the root")]
    ParentChainLoop(String),

    /// a chunk decompressed to an unexpected number of bytes
    #[error("chunk {index} of \"{path}\" decompressed to {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        path: String,
        index: usize,
        expected: u32,
        actual: usize,
    },
}

/// Errors caused by asking the archive for the wrong thing
#[derive(Error, Diagnostic, Debug)]
pub enum UsageError {
    /// resource not found in archive
    #[error("resource \"{0}\" not found in archive")]
    ResourceNotFound(String),

    /// resource is a directory, not a file
    #[error("resource \"{0}\" is a directory and cannot be extracted as a file")]
    NotAFile(String),
}

/// Decompression failures, fatal to the single resource being extracted
#[derive(Error, Diagnostic, Debug)]
pub enum CodecError {
    /// {0} decompression is not supported
    #[error("{0} decompression is not supported")]
    UnsupportedFormat(DataFormat),

    /// corrupt zlib stream
    #[error("corrupt zlib stream")]
    Inflate(#[source] std::io::Error),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
