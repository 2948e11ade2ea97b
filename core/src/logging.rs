use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

pub const DEFAULT_LOG_FILE: &str = "usb_device_log.txt";

const MAX_LOG_SIZE: u64 = 1024 * 1024;
const BACKUP_COUNT: u32 = 5;

/// Rotating file sink behind the `log` facade, the audit trail independent
/// of the window. Lines are `<timestamp> - <LEVEL> - <message>`, flushed per
/// record. Once a write would push the file past the size threshold the
/// live file is shifted to `.1`, existing backups shift up and the oldest
/// is dropped.
pub struct RotatingFileLogger {
    level: LevelFilter,
    inner: Mutex<LogFile>,
}

struct LogFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_size: u64,
    backups: u32,
}

impl RotatingFileLogger {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_limits(path, MAX_LOG_SIZE, BACKUP_COUNT)
    }

    pub fn with_limits(path: impl Into<PathBuf>, max_size: u64, backups: u32) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {:?}", path))?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            level: LevelFilter::Info,
            inner: Mutex::new(LogFile { path, file, written, max_size, backups }),
        })
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Installs this logger as the process-wide `log` sink. Fails if a
    /// logger is already installed.
    pub fn install(self) -> Result<()> {
        log::set_max_level(self.level);
        log::set_boxed_logger(Box::new(self))
            .context("Failed to install rotating file logger")
    }

    fn write_line(&self, level: Level, message: &str) {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            level,
            message
        );
        self.inner.lock().unwrap().write(&line);
    }
}

impl Log for RotatingFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.write_line(record.level(), &record.args().to_string());
        }
    }

    fn flush(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            let _ = inner.file.flush();
        }
    }
}

impl LogFile {
    // The logger cannot propagate errors to callers of log!(); failures go
    // to stderr and the record is dropped.
    fn write(&mut self, line: &str) {
        if self.written + line.len() as u64 > self.max_size {
            if let Err(e) = self.rotate() {
                eprintln!("Log rotation failed: {e}");
            }
        }
        match self.file.write_all(line.as_bytes()).and_then(|_| self.file.flush()) {
            Ok(()) => self.written += line.len() as u64,
            Err(e) => eprintln!("Log write failed: {e}"),
        }
    }

    fn rotate(&mut self) -> Result<()> {
        let oldest = backup_path(&self.path, self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for i in (1..self.backups).rev() {
            let from = backup_path(&self.path, i);
            if from.exists() {
                fs::rename(&from, backup_path(&self.path, i + 1))?;
            }
        }
        fs::rename(&self.path, backup_path(&self.path, 1))?;
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

fn backup_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}
