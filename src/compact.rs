//! Compaction: drop tombstones by rebuilding the container from its active
//! entries.
//!
//! Survivors are read out of the source in full before anything is written.
//! They are then replayed through the normal insert path, in slot order and
//! with their original creation times, into a freshly formatted store.  The
//! file-level entry point builds that store as a temporary file next to the
//! container and renames it into place, so the live container is never left
//! half-reset.

use std::fs::{self, File};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::container::{Container, ContainerOptions};
use crate::entry::SlotState;
use crate::error::{Result, ZvfsError};
use crate::report::CompactReport;
use crate::storage::{persist, Durability, Storage};

struct Survivor {
    name:    String,
    data:    Vec<u8>,
    created: u64,
}

struct Sweep {
    survivors:   Vec<Survivor>,
    removed:     usize,
    bytes_freed: u64,
}

fn sweep<S: Storage>(src: &mut Container<S>) -> Result<Sweep> {
    let mut sweep = Sweep { survivors: Vec::new(), removed: 0, bytes_freed: 0 };
    for entry in src.entries()? {
        match entry.state() {
            SlotState::Deleted => {
                sweep.removed     += 1;
                sweep.bytes_freed += u64::from(entry.length);
            }
            SlotState::Active => {
                let data = src.read_payload(&entry)?;
                sweep.survivors.push(Survivor {
                    name:    entry.name,
                    data,
                    created: entry.created,
                });
            }
            SlotState::Empty => {}
        }
    }
    Ok(sweep)
}

fn rebuild<D: Storage>(
    dst:       D,
    survivors: Vec<Survivor>,
    options:   ContainerOptions,
) -> Result<Container<D>> {
    // Replay without per-insert fsync; one sync at the end covers it.
    let replay = ContainerOptions { durability: Durability::Flush };
    let mut out = Container::format(dst, replay)?;
    for s in survivors {
        out.insert_with_created(&s.name, &s.data, s.created)?;
    }
    persist(&mut out.store, options.durability)?;
    out.options = options;
    Ok(out)
}

fn summarize<D: Storage>(out: &mut Container<D>, removed: usize, bytes_freed: u64) -> Result<CompactReport> {
    let header = out.header()?;
    Ok(CompactReport {
        removed,
        bytes_freed,
        file_count:       header.file_count,
        next_free_offset: header.next_free_offset,
    })
}

impl<S: Storage> Container<S> {
    /// Write a compacted copy of this container into `dst`.  The source is
    /// only read.
    pub fn compact_to<D: Storage>(&mut self, dst: D) -> Result<(Container<D>, CompactReport)> {
        let Sweep { survivors, removed, bytes_freed } = sweep(self)?;
        let mut out = rebuild(dst, survivors, self.options)?;
        let report = summarize(&mut out, removed, bytes_freed)?;
        Ok((out, report))
    }
}

/// Compact the container at `path` in place.
///
/// A container with no tombstones is left untouched.  Otherwise the
/// compacted copy is written to a temporary file in the same directory,
/// synced, and atomically renamed over `path`.
pub fn compact_file<P: AsRef<Path>>(path: P, options: ContainerOptions) -> Result<CompactReport> {
    let path = path.as_ref();
    let mut src = Container::open_with_options(path, options)?;
    let Sweep { survivors, removed, bytes_freed } = sweep(&mut src)?;
    if removed == 0 {
        info!(path = %path.display(), "no deleted files, container already clean");
        return summarize(&mut src, 0, 0);
    }
    let permissions = src.store.metadata()?.permissions();
    drop(src);

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    let mut out = rebuild(tmp.reopen()?, survivors, options)?;
    let report = summarize(&mut out, removed, bytes_freed)?;
    drop(out);

    fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| ZvfsError::Io(e.error))?;
    if options.durability == Durability::Sync {
        // Best-effort: not every platform can open a directory for syncing.
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            warn!(dir = %dir.display(), error = %e, "directory sync failed");
        }
    }

    info!(
        path = %path.display(),
        removed = report.removed,
        bytes_freed = report.bytes_freed,
        file_count = report.file_count,
        "compacted container"
    );
    Ok(report)
}
