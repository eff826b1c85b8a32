//! Error type shared by every container operation.
//!
//! Each variant belongs to exactly one [`ErrorKind`], so callers and tests
//! can branch on the kind instead of matching message text.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ZvfsError>;

/// Coarse classification of a [`ZvfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Exists,
    NotFound,
    Format,
    Validation,
    Alignment,
    Capacity,
    Io,
}

#[derive(Error, Debug)]
pub enum ZvfsError {
    // ── Exists ───────────────────────────────────────────────────────────────
    #[error("container already exists: {}", .0.display())]
    ContainerExists(PathBuf),
    #[error("an active file named '{0}' already exists")]
    NameTaken(String),

    // ── NotFound ─────────────────────────────────────────────────────────────
    #[error("container not found: {}", .0.display())]
    ContainerMissing(PathBuf),
    #[error("host file not found: {}", .0.display())]
    HostFileMissing(PathBuf),
    #[error("file '{0}' not found in container")]
    EntryNotFound(String),

    // ── Format ───────────────────────────────────────────────────────────────
    #[error("invalid magic number")]
    InvalidMagic,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("truncated container: {0}")]
    Truncated(&'static str),

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("invalid header field: {0}")]
    InvalidHeader(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),

    // ── Alignment ────────────────────────────────────────────────────────────
    #[error("start offset {0} is not 64-byte aligned")]
    Misaligned(u64),

    // ── Capacity ─────────────────────────────────────────────────────────────
    #[error("entry table is full")]
    TableFull,
    #[error("data region limit exceeded: write would end at byte {end}")]
    DataLimit { end: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ZvfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZvfsError::ContainerExists(_) | ZvfsError::NameTaken(_) => ErrorKind::Exists,
            ZvfsError::ContainerMissing(_)
            | ZvfsError::HostFileMissing(_)
            | ZvfsError::EntryNotFound(_) => ErrorKind::NotFound,
            ZvfsError::InvalidMagic
            | ZvfsError::UnsupportedVersion(_)
            | ZvfsError::Truncated(_) => ErrorKind::Format,
            ZvfsError::InvalidHeader(_) | ZvfsError::InvalidName(_) => ErrorKind::Validation,
            ZvfsError::Misaligned(_) => ErrorKind::Alignment,
            ZvfsError::TableFull | ZvfsError::DataLimit { .. } => ErrorKind::Capacity,
            ZvfsError::Io(_) => ErrorKind::Io,
        }
    }
}
