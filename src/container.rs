//! [`Container`]: create, open, and operate on a `.zvfs` container.
//!
//! ```no_run
//! use zvfs::Container;
//!
//! let mut fs = Container::create("disk.zvfs")?;
//! fs.insert("readme.txt", b"Hello, world!")?;
//! assert_eq!(fs.fetch("readme.txt")?, b"Hello, world!");
//! fs.delete("readme.txt")?;
//! # Ok::<(), zvfs::ZvfsError>(())
//! ```
//!
//! Every operation is a self-contained read-modify-write pass: the header
//! (and the entry table when a scan is needed) is re-read from the store on
//! each call, nothing is cached between calls.  Only one writer may touch a
//! container at a time; no locking is performed.

use std::fs::{File, OpenOptions};
use std::io::{self, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::entry::{self, validate_name, FileEntry, SlotState};
use crate::error::{Result, ZvfsError};
use crate::header::{align_up, Header, ENTRY_SIZE};
use crate::report::{EntryInfo, InsertReceipt, Inspection, Listing};
use crate::storage::{persist, Durability, Storage};

// ── ContainerOptions ──────────────────────────────────────────────────────────

/// Configuration for [`Container::create_with_options`] and friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerOptions {
    pub durability: Durability,
}

// ── Container ─────────────────────────────────────────────────────────────────

pub struct Container<S = File> {
    pub(crate) store:   S,
    pub(crate) options: ContainerOptions,
}

impl Container<File> {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, ContainerOptions::default())
    }

    /// Create a new container file.  Fails if anything already exists at
    /// `path`.
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => ZvfsError::ContainerExists(path.to_owned()),
                _ => ZvfsError::Io(e),
            })?;
        let container = Self::format(file, options)?;
        info!(path = %path.display(), "created container");
        Ok(container)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ContainerOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ContainerOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ZvfsError::ContainerMissing(path.to_owned()),
                _ => ZvfsError::Io(e),
            })?;
        Self::from_store(file, options)
    }
}

impl<S: Storage> Container<S> {
    /// Write a fresh header and a zeroed entry table at the start of `store`.
    /// No data-region bytes are allocated.
    pub fn format(mut store: S, options: ContainerOptions) -> Result<Self> {
        let header = Header::new();
        store.seek(SeekFrom::Start(0))?;
        header.write(&mut store)?;
        let table_len = usize::from(header.file_capacity) * usize::from(header.file_entry_size);
        store.write_all(&vec![0u8; table_len])?;
        persist(&mut store, options.durability)?;
        Ok(Self { store, options })
    }

    /// Wrap an existing container, checking that its header decodes.
    pub fn from_store(store: S, options: ContainerOptions) -> Result<Self> {
        let mut container = Self { store, options };
        container.header()?;
        Ok(container)
    }

    pub fn options(&self) -> ContainerOptions {
        self.options
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    // ── Raw table access ─────────────────────────────────────────────────────

    pub fn header(&mut self) -> Result<Header> {
        self.store.seek(SeekFrom::Start(0))?;
        Header::read(&mut self.store)
    }

    fn write_header(&mut self, header: &Header) -> Result<()> {
        self.store.seek(SeekFrom::Start(0))?;
        header.write(&mut self.store)?;
        Ok(())
    }

    /// All table slots in slot order, empty ones included.
    pub fn entries(&mut self) -> Result<Vec<FileEntry>> {
        let header = self.header()?;
        self.read_table(&header)
    }

    fn read_table(&mut self, header: &Header) -> Result<Vec<FileEntry>> {
        self.store.seek(SeekFrom::Start(u64::from(header.file_table_offset)))?;
        (0..header.file_capacity)
            .map(|_| FileEntry::read(&mut self.store))
            .collect()
    }

    fn write_entry(&mut self, entry_offset: u32, entry: &FileEntry) -> Result<()> {
        self.store.seek(SeekFrom::Start(u64::from(entry_offset)))?;
        entry.write(&mut self.store)?;
        Ok(())
    }

    pub(crate) fn read_payload(&mut self, entry: &FileEntry) -> Result<Vec<u8>> {
        self.store.seek(SeekFrom::Start(u64::from(entry.start)))?;
        let mut data = vec![0u8; entry.length as usize];
        self.store.read_exact(&mut data).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ZvfsError::Truncated("data region"),
            _ => ZvfsError::Io(e),
        })?;
        Ok(data)
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    /// Store `data` under `name`.  A tombstoned entry with the same name does
    /// not block the insert.
    pub fn insert(&mut self, name: &str, data: &[u8]) -> Result<InsertReceipt> {
        self.insert_with_created(name, data, entry::now())
    }

    pub(crate) fn insert_with_created(
        &mut self,
        name:    &str,
        data:    &[u8],
        created: u64,
    ) -> Result<InsertReceipt> {
        validate_name(name)?;
        let mut header = self.header()?;
        let entries = self.read_table(&header)?;
        if entries.iter().any(|e| e.is_active() && e.name == name) {
            return Err(ZvfsError::NameTaken(name.to_owned()));
        }

        let entry_offset = header.next_entry_slot()?;

        let start  = align_up(u64::from(header.next_free_offset));
        let length = data.len() as u64;
        let padded = align_up(length);
        let end    = start + padded;
        if end > u64::from(u32::MAX) {
            return Err(ZvfsError::DataLimit { end });
        }
        let (start, length, end) = (start as u32, length as u32, end as u32);
        let entry = FileEntry::with_created(name, start, length, created)?;

        // Payload first, then the entry, then the header that makes it live.
        self.store.seek(SeekFrom::Start(u64::from(start)))?;
        self.store.write_all(data)?;
        self.store.write_all(&vec![0u8; (padded - u64::from(length)) as usize])?;
        self.write_entry(entry_offset, &entry)?;
        header.record_insert(entry_offset, end);
        self.write_header(&header)?;
        persist(&mut self.store, self.options.durability)?;

        debug!(file = name, length, start, entry_offset, "inserted file");
        Ok(InsertReceipt { name: name.to_owned(), length, entry_offset, start })
    }

    /// Tombstone the first active entry named `name`.  Its slot and bytes
    /// stay allocated until the container is compacted.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let mut header = self.header()?;
        let entries = self.read_table(&header)?;
        let (slot, mut entry) = entries
            .into_iter()
            .enumerate()
            .find(|(_, e)| e.is_active() && e.name == name)
            .ok_or_else(|| ZvfsError::EntryNotFound(name.to_owned()))?;

        entry.mark_deleted();
        let entry_offset = slot_offset(&header, slot);
        self.write_entry(entry_offset, &entry)?;
        header.record_delete();
        self.write_header(&header)?;
        persist(&mut self.store, self.options.durability)?;

        debug!(file = name, slot, "tombstoned file");
        Ok(())
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    /// Payload of the first slot named `name`, tombstoned or not.  Reading a
    /// tombstone is allowed as a recovery path and logs a warning.
    pub fn fetch(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entries()?
            .into_iter()
            .find(|e| e.state() != SlotState::Empty && e.name == name)
            .ok_or_else(|| ZvfsError::EntryNotFound(name.to_owned()))?;
        if entry.state() == SlotState::Deleted {
            warn!(file = name, "file is marked as deleted, recovering anyway");
        }
        self.read_payload(&entry)
    }

    /// Payload of the first *active* entry named `name`.
    pub fn read_active(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entries()?
            .into_iter()
            .find(|e| e.is_active() && e.name == name)
            .ok_or_else(|| ZvfsError::EntryNotFound(name.to_owned()))?;
        self.read_payload(&entry)
    }

    /// Active payload rendered as text.  Invalid UTF-8 is replaced, so binary
    /// content does not survive this path.
    pub fn dump(&mut self, name: &str) -> Result<String> {
        let data = self.read_active(name)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub fn list(&mut self) -> Result<Listing> {
        let header = self.header()?;
        let files = self
            .read_table(&header)?
            .into_iter()
            .enumerate()
            .filter(|(_, e)| e.is_active())
            .map(|(slot, e)| EntryInfo {
                slot,
                name:    e.name,
                start:   e.start,
                length:  e.length,
                created: e.created,
            })
            .collect();
        Ok(Listing {
            files,
            capacity:   header.file_capacity,
            free_slots: header.free_slots(),
        })
    }

    pub fn inspect(&mut self) -> Result<Inspection> {
        let header = self.header()?;
        // Tombstones keep counting until compaction.
        let total_space_used = self
            .read_table(&header)?
            .iter()
            .filter(|e| e.length > 0)
            .map(|e| u64::from(e.length))
            .sum();
        Ok(Inspection {
            file_count:       header.file_count,
            free_slots:       header.free_slots(),
            deleted_files:    header.deleted_files,
            total_space_used,
            next_free_offset: header.next_free_offset,
        })
    }
}

pub(crate) fn slot_offset(header: &Header, slot: usize) -> u32 {
    header.file_table_offset + slot as u32 * u32::from(ENTRY_SIZE)
}
