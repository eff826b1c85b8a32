//! Fixed 64-byte container header.
//!
//! ```text
//! off  size  field
//!   0     8  magic "ZVFSDSK1"
//!   8     1  version
//!   9     1  flags (bit 0 = entry table full)
//!  10     2  reserved
//!  12     2  file_count
//!  14     2  file_capacity     (32)
//!  16     2  file_entry_size   (64)
//!  18     2  reserved
//!  20     4  file_table_offset (64)
//!  24     4  data_start_offset (2112)
//!  28     4  next_free_offset
//!  32     4  free_entry_offset (0 = table full)
//!  36     2  deleted_files
//!  38    26  reserved
//! ```
//!
//! All integers are little-endian.  The header is the only record of where
//! the next write may land, so cursor bounds are checked both when a header
//! is built and when one is decoded.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

use crate::error::{Result, ZvfsError};

pub const MAGIC:             &[u8; 8] = b"ZVFSDSK1";
pub const VERSION:           u8  = 1;
pub const HEADER_SIZE:       u32 = 64;
pub const FILE_CAPACITY:     u16 = 32;
pub const ENTRY_SIZE:        u16 = 64;
pub const FILE_TABLE_OFFSET: u32 = HEADER_SIZE;
pub const DATA_START:        u32 = HEADER_SIZE + FILE_CAPACITY as u32 * ENTRY_SIZE as u32;
/// Addressable ceiling of a container (4 GiB).
pub const MAX_OFFSET:        u64 = 1 << 32;
/// Every data block starts on, and is padded to, this boundary.
pub const ALIGNMENT:         u64 = 64;

pub const FLAG_TABLE_FULL:   u8  = 0x01;

/// Round `n` up to the next multiple of [`ALIGNMENT`].
pub fn align_up(n: u64) -> u64 {
    n.div_ceil(ALIGNMENT) * ALIGNMENT
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version:           u8,
    pub flags:             u8,
    pub file_count:        u16,
    pub file_capacity:     u16,
    pub file_entry_size:   u16,
    pub file_table_offset: u32,
    pub data_start_offset: u32,
    pub next_free_offset:  u32,
    pub free_entry_offset: u32,
    pub deleted_files:     u16,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    /// Header of an empty container.
    pub fn new() -> Self {
        Self {
            version:           VERSION,
            flags:             0,
            file_count:        0,
            file_capacity:     FILE_CAPACITY,
            file_entry_size:   ENTRY_SIZE,
            file_table_offset: FILE_TABLE_OFFSET,
            data_start_offset: DATA_START,
            next_free_offset:  DATA_START,
            free_entry_offset: FILE_TABLE_OFFSET,
            deleted_files:     0,
        }
    }

    /// Header with explicit allocator cursors.  A zero `free_entry_offset`
    /// marks the table full and sets [`FLAG_TABLE_FULL`].
    pub fn with_cursors(next_free_offset: u32, free_entry_offset: u32) -> Result<Self> {
        let mut header = Self::new();
        header.next_free_offset  = next_free_offset;
        header.free_entry_offset = free_entry_offset;
        if free_entry_offset == 0 {
            header.flags |= FLAG_TABLE_FULL;
        }
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.file_capacity != FILE_CAPACITY
            || self.file_entry_size != ENTRY_SIZE
            || self.file_table_offset != FILE_TABLE_OFFSET
            || self.data_start_offset != DATA_START
        {
            return Err(ZvfsError::InvalidHeader(format!(
                "table geometry {}x{} at {} / data at {} does not match {}x{} at {} / data at {}",
                self.file_capacity, self.file_entry_size,
                self.file_table_offset, self.data_start_offset,
                FILE_CAPACITY, ENTRY_SIZE, FILE_TABLE_OFFSET, DATA_START,
            )));
        }
        let next = u64::from(self.next_free_offset);
        if next < u64::from(DATA_START) || next > MAX_OFFSET {
            return Err(ZvfsError::InvalidHeader(format!(
                "next_free_offset {next} outside [{DATA_START}, {MAX_OFFSET}]"
            )));
        }
        let free = self.free_entry_offset;
        if free != 0 && !(HEADER_SIZE..=DATA_START).contains(&free) {
            return Err(ZvfsError::InvalidHeader(format!(
                "free_entry_offset {free} is neither 0 nor within [{HEADER_SIZE}, {DATA_START}]"
            )));
        }
        if free != 0 && (free - FILE_TABLE_OFFSET) % u32::from(ENTRY_SIZE) != 0 {
            return Err(ZvfsError::InvalidHeader(format!(
                "free_entry_offset {free} is not on a {ENTRY_SIZE}-byte slot boundary"
            )));
        }
        if self.file_count > self.file_capacity {
            return Err(ZvfsError::InvalidHeader(format!(
                "file_count {} exceeds capacity {}",
                self.file_count, self.file_capacity
            )));
        }
        Ok(())
    }

    pub fn is_table_full(&self) -> bool {
        self.free_entry_offset == 0
            || self.free_entry_offset >= self.data_start_offset
            || self.flags & FLAG_TABLE_FULL != 0
    }

    /// Never-used slots left for new inserts; tombstoned slots are not free.
    pub fn free_slots(&self) -> u32 {
        if self.is_table_full() {
            return 0;
        }
        (self.data_start_offset - self.free_entry_offset) / u32::from(self.file_entry_size)
    }

    /// Byte offset of the slot the next insert will occupy.
    pub fn next_entry_slot(&self) -> Result<u32> {
        if self.is_table_full() {
            return Err(ZvfsError::TableFull);
        }
        Ok(self.free_entry_offset)
    }

    /// Advance both cursors past an insert that used `slot_offset` and whose
    /// padded data ends at `data_end`.
    pub fn record_insert(&mut self, slot_offset: u32, data_end: u32) {
        let next_slot = slot_offset + u32::from(self.file_entry_size);
        if next_slot >= self.data_start_offset {
            self.free_entry_offset = 0;
            self.flags |= FLAG_TABLE_FULL;
        } else {
            self.free_entry_offset = next_slot;
        }
        self.next_free_offset = data_end;
        self.file_count = self.file_count.saturating_add(1);
    }

    pub fn record_delete(&mut self) {
        self.file_count    = self.file_count.saturating_sub(1);
        self.deleted_files = self.deleted_files.saturating_add(1);
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u8(self.version)?;
        writer.write_u8(self.flags)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u16::<LittleEndian>(self.file_count)?;
        writer.write_u16::<LittleEndian>(self.file_capacity)?;
        writer.write_u16::<LittleEndian>(self.file_entry_size)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(self.file_table_offset)?;
        writer.write_u32::<LittleEndian>(self.data_start_offset)?;
        writer.write_u32::<LittleEndian>(self.next_free_offset)?;
        writer.write_u32::<LittleEndian>(self.free_entry_offset)?;
        writer.write_u16::<LittleEndian>(self.deleted_files)?;
        writer.write_all(&[0u8; 26])?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        // A fixed-size slice of exactly HEADER_SIZE bytes cannot run short.
        let _ = self.write(&mut buf[..]);
        buf
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ZvfsError::Truncated("header"),
            _ => ZvfsError::Io(e),
        })?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if &buf[..8] != MAGIC {
            return Err(ZvfsError::InvalidMagic);
        }
        let mut r = Cursor::new(&buf[8..]);
        let version = r.read_u8()?;
        if version != VERSION {
            return Err(ZvfsError::UnsupportedVersion(version));
        }
        let flags = r.read_u8()?;
        let _reserved = r.read_u16::<LittleEndian>()?;
        let file_count      = r.read_u16::<LittleEndian>()?;
        let file_capacity   = r.read_u16::<LittleEndian>()?;
        let file_entry_size = r.read_u16::<LittleEndian>()?;
        let _reserved = r.read_u16::<LittleEndian>()?;
        let header = Self {
            version,
            flags,
            file_count,
            file_capacity,
            file_entry_size,
            file_table_offset: r.read_u32::<LittleEndian>()?,
            data_start_offset: r.read_u32::<LittleEndian>()?,
            next_free_offset:  r.read_u32::<LittleEndian>()?,
            free_entry_offset: r.read_u32::<LittleEndian>()?,
            deleted_files:     r.read_u16::<LittleEndian>()?,
        };
        header.validate()?;
        Ok(header)
    }
}
