//! Plain-data results returned by container operations.
//!
//! All of these derive `Serialize` so the CLI can emit them as JSON.

use serde::Serialize;

/// Where an insert landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertReceipt {
    pub name:         String,
    pub length:       u32,
    /// Byte offset of the entry record in the table.
    pub entry_offset: u32,
    /// Byte offset of the payload in the data region.
    pub start:        u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub slot:    usize,
    pub name:    String,
    pub start:   u32,
    pub length:  u32,
    pub created: u64,
}

/// Active files in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub files:      Vec<EntryInfo>,
    pub capacity:   u16,
    pub free_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub file_count:       u16,
    pub free_slots:       u32,
    pub deleted_files:    u16,
    /// Sum of `length` over every non-empty slot, tombstones included.
    pub total_space_used: u64,
    pub next_free_offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactReport {
    pub removed:          usize,
    /// Unpadded byte length of the removed payloads.
    pub bytes_freed:      u64,
    pub file_count:       u16,
    pub next_free_offset: u32,
}
