pub mod error;
pub mod header;
pub mod entry;
pub mod storage;
pub mod report;
pub mod container;
pub mod compact;

pub use error::{ErrorKind, Result, ZvfsError};
pub use header::Header;
pub use entry::{FileEntry, SlotState};
pub use storage::{Durability, Durable, Storage};
pub use report::{CompactReport, EntryInfo, InsertReceipt, Inspection, Listing};
pub use container::{Container, ContainerOptions};
pub use compact::compact_file;
