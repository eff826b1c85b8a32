//! Backing-store seam: anything seekable that can also be made durable.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

/// How hard a mutation pushes its bytes toward the disk before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Durability {
    /// Flush and fsync after every mutation.
    #[default]
    Sync,
    /// Flush userspace buffers only.
    Flush,
}

/// A store whose written bytes can be forced to stable storage.
pub trait Durable {
    fn sync(&mut self) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Durable for Cursor<Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Durable + ?Sized> Durable for &mut T {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Everything a container needs from its backing store.
pub trait Storage: Read + Write + Seek + Durable {}

impl<T: Read + Write + Seek + Durable> Storage for T {}

/// Flush `store`, then sync it when `durability` asks for it.
pub fn persist<S: Write + Durable>(store: &mut S, durability: Durability) -> io::Result<()> {
    store.flush()?;
    if durability == Durability::Sync {
        store.sync()?;
    }
    Ok(())
}
