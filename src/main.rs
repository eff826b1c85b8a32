use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use zvfs::compact::compact_file;
use zvfs::{Container, ContainerOptions, Durability, ZvfsError};

#[derive(Parser)]
#[command(name = "zvfs", about = "Single-file flat filesystem container CLI")]
struct Cli {
    /// Flush without fsync after each change (faster, not crash-safe)
    #[arg(long, global = true)]
    no_sync: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty container
    Mkfs {
        path: PathBuf,
    },
    /// Show container usage
    Gifs {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Add a host file to the container
    Addfs {
        path:     PathBuf,
        hostfile: PathBuf,
        /// Store under this name instead of the host file's base name
        #[arg(long)]
        name:     Option<String>,
    },
    /// Extract a file (tombstoned files included) to the host
    Getfs {
        path: PathBuf,
        name: String,
        /// Output path (default: the file name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Mark a file as deleted
    Rmfs {
        path: PathBuf,
        name: String,
    },
    /// Print a file's contents
    Catfs {
        path: PathBuf,
        name: String,
        /// Print a hex dump instead of text
        #[arg(long)]
        hex:  bool,
    },
    /// List active files
    Lsfs {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Compact away deleted files
    Dfrgfs {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ZVFS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = ContainerOptions {
        durability: if cli.no_sync { Durability::Flush } else { Durability::Sync },
    };

    match cli.command {

        // ── Mkfs ─────────────────────────────────────────────────────────────
        Commands::Mkfs { path } => {
            Container::create_with_options(&path, options)?;
            println!("Created empty filesystem: {}", path.display());
        }

        // ── Gifs ─────────────────────────────────────────────────────────────
        Commands::Gifs { path, json } => {
            let info = Container::open_with_options(&path, options)?.inspect()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Filesystem:       {}", path.display());
                println!("Files present:    {}", info.file_count);
                println!("Free entries:     {}", info.free_slots);
                println!("Deleted files:    {}", info.deleted_files);
                println!("Total space used: {} bytes", info.total_space_used);
            }
        }

        // ── Addfs ────────────────────────────────────────────────────────────
        Commands::Addfs { path, hostfile, name } => {
            let mut fs = Container::open_with_options(&path, options)?;
            if !hostfile.is_file() {
                return Err(ZvfsError::HostFileMissing(hostfile).into());
            }
            let name = match name {
                Some(n) => n,
                None => hostfile
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let data = std::fs::read(&hostfile)?;
            let receipt = fs.insert(&name, &data)?;
            println!(
                "Added file: {} ({} bytes), entry at offset {}, data at offset {}",
                receipt.name, receipt.length, receipt.entry_offset, receipt.start
            );
        }

        // ── Getfs ────────────────────────────────────────────────────────────
        Commands::Getfs { path, name, output } => {
            let data = Container::open_with_options(&path, options)?.fetch(&name)?;
            let out = output.unwrap_or_else(|| PathBuf::from(&name));
            if out.exists() {
                warn!(path = %out.display(), "host file exists and will be overwritten");
            }
            std::fs::write(&out, &data)?;
            println!("Extracted file: {} ({} bytes) to {}", name, data.len(), out.display());
        }

        // ── Rmfs ─────────────────────────────────────────────────────────────
        Commands::Rmfs { path, name } => {
            Container::open_with_options(&path, options)?.delete(&name)?;
            println!("Removed {name} from filesystem.");
        }

        // ── Catfs ────────────────────────────────────────────────────────────
        Commands::Catfs { path, name, hex } => {
            let mut fs = Container::open_with_options(&path, options)?;
            if hex {
                let data = fs.read_active(&name)?;
                for (i, row) in data.chunks(16).enumerate() {
                    println!("{:08x}  {}", i * 16, hex::encode(row));
                }
            } else {
                println!("{}", fs.dump(&name)?);
            }
        }

        // ── Lsfs ─────────────────────────────────────────────────────────────
        Commands::Lsfs { path, json } => {
            let listing = Container::open_with_options(&path, options)?.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }
            println!("Files in virtual filesystem: {}", path.display());
            println!("{:<32} {:>12}  {:<20}", "Name", "Size (bytes)", "Created");
            for f in &listing.files {
                println!("{:<32} {:>12}  {:<20}", f.name, f.length, format_time(f.created));
            }
            if listing.files.is_empty() {
                println!("No active files found in the filesystem.");
            }
            println!("Total files listed:   {}", listing.files.len());
            println!("Filesystem capacity:  {} slots", listing.capacity);
            println!("Free slots remaining: {}", listing.free_slots);
        }

        // ── Dfrgfs ───────────────────────────────────────────────────────────
        Commands::Dfrgfs { path, json } => {
            let report = compact_file(&path, options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.removed == 0 {
                println!("No deleted files to remove. Filesystem already clean.");
            } else {
                println!("Files removed:         {}", report.removed);
                println!("Bytes freed:           {} (file data, padding not counted)", report.bytes_freed);
                println!("Active files:          {}", report.file_count);
                println!("Next free data offset: {}", report.next_free_offset);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn format_time(secs: u64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into())
}
