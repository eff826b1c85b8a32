//! Fixed 64-byte file-entry record, one per entry-table slot.
//!
//! ```text
//! off  size  field
//!   0    32  name (UTF-8, null-padded, at most 31 bytes)
//!  32     4  start   (64-byte aligned data offset)
//!  36     4  length  (exact payload length, no padding)
//!  40     1  type    (always ENTRY_TYPE)
//!  41     1  flag    (0 = active, 1 = tombstoned)
//!  42     2  reserved
//!  44     8  created (unix seconds)
//!  52    12  reserved
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::Utc;
use std::io::{self, Cursor, Read, Write};

use crate::error::{Result, ZvfsError};
use crate::header::{ALIGNMENT, ENTRY_SIZE};

pub const NAME_FIELD_SIZE: usize = 32;
pub const MAX_NAME_LEN:    usize = NAME_FIELD_SIZE - 1;
pub const ENTRY_TYPE:      u8 = 0;

pub const FLAG_ACTIVE:     u8 = 0;
pub const FLAG_DELETED:    u8 = 1;

/// Lifecycle of one table slot.  `Deleted` is terminal until a compaction
/// resets the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Active,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name:    String,
    pub start:   u32,
    pub length:  u32,
    pub kind:    u8,
    pub flag:    u8,
    pub created: u64,
}

/// Reject empty names and names longer than [`MAX_NAME_LEN`] bytes.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ZvfsError::InvalidName("name must contain at least one character".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ZvfsError::InvalidName(format!(
            "'{name}' is {} bytes, at most {MAX_NAME_LEN} allowed",
            name.len()
        )));
    }
    if name.contains('\0') {
        return Err(ZvfsError::InvalidName("name must not contain NUL".into()));
    }
    Ok(())
}

/// Current time in unix seconds, clamped at zero.
pub fn now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

fn check_alignment(start: u32) -> Result<()> {
    if u64::from(start) % ALIGNMENT != 0 {
        return Err(ZvfsError::Misaligned(u64::from(start)));
    }
    Ok(())
}

impl FileEntry {
    /// Active entry stamped with the current time.
    pub fn new(name: &str, start: u32, length: u32) -> Result<Self> {
        Self::with_created(name, start, length, now())
    }

    /// Active entry carrying an existing creation time (used by compaction).
    pub fn with_created(name: &str, start: u32, length: u32, created: u64) -> Result<Self> {
        validate_name(name)?;
        check_alignment(start)?;
        Ok(Self {
            name: name.to_owned(),
            start,
            length,
            kind: ENTRY_TYPE,
            flag: FLAG_ACTIVE,
            created,
        })
    }

    pub fn state(&self) -> SlotState {
        if self.flag == FLAG_DELETED {
            SlotState::Deleted
        } else if self.name.is_empty() {
            SlotState::Empty
        } else {
            SlotState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SlotState::Active
    }

    /// Flip the tombstone flag.  Callers check [`is_active`](Self::is_active)
    /// first; calling this twice is not an error here.
    pub fn mark_deleted(&mut self) {
        self.flag = FLAG_DELETED;
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut name = [0u8; NAME_FIELD_SIZE];
        let raw = self.name.as_bytes();
        let n = raw.len().min(MAX_NAME_LEN);
        name[..n].copy_from_slice(&raw[..n]);
        writer.write_all(&name)?;
        writer.write_u32::<LittleEndian>(self.start)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u8(self.kind)?;
        writer.write_u8(self.flag)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u64::<LittleEndian>(self.created)?;
        writer.write_all(&[0u8; 12])?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE as usize] {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        let _ = self.write(&mut buf[..]);
        buf
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; ENTRY_SIZE as usize];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ZvfsError::Truncated("entry table"),
            _ => ZvfsError::Io(e),
        })?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8; ENTRY_SIZE as usize]) -> Result<Self> {
        let raw_name = &buf[..NAME_FIELD_SIZE];
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD_SIZE);
        let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();

        let mut r = Cursor::new(&buf[NAME_FIELD_SIZE..]);
        let start  = r.read_u32::<LittleEndian>()?;
        let length = r.read_u32::<LittleEndian>()?;
        let kind   = r.read_u8()?;
        let flag   = r.read_u8()?;
        let _reserved = r.read_u16::<LittleEndian>()?;
        let created = r.read_u64::<LittleEndian>()?;
        check_alignment(start)?;
        Ok(Self { name, start, length, kind, flag, created })
    }
}
