//! Logging setup: console output plus an optional size-rotated log file.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Default size at which the log file is rotated (1 MiB).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1024 * 1024;

/// Default number of log files kept, the active one included.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Log file location and rotation limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    /// Active log file.
    pub path: PathBuf,
    /// Size at which the file is rotated.
    pub max_size_bytes: u64,
    /// Files kept, the active one included.
    pub max_files: usize,
}

impl LogFile {
    /// A log file with default rotation limits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }

    /// Rotates the file if it has outgrown its limit, then opens it for
    /// appending. Missing parent directories are created.
    ///
    /// Rotation happens when the process starts: `tally.log` becomes
    /// `tally.log.1`, `tally.log.1` becomes `tally.log.2` and so on, and the
    /// oldest file past `max_files` is dropped.
    pub fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };
        if len >= self.max_size_bytes {
            self.rotate()?;
        }

        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn rotate(&self) -> io::Result<()> {
        let archives = self.max_files.saturating_sub(1);
        if archives == 0 {
            return remove_if_exists(&self.path);
        }

        remove_if_exists(&self.archive(archives))?;
        for index in (1..archives).rev() {
            let from = self.archive(index);
            if from.exists() {
                fs::rename(&from, self.archive(index + 1))?;
            }
        }
        fs::rename(&self.path, self.archive(1))
    }

    /// Path of the `index`-th rotated file.
    pub fn archive(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` unless `verbose` is set. When a
/// log file is given, every event is written to the console and to the file.
pub fn init(level: &str, verbose: bool, file: Option<File>) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(io::stdout.and(Arc::new(file)))
            .init(),
        None => builder.init(),
    }
}
