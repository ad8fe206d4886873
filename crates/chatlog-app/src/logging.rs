use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PREFIX: &str = "chatlog-";
pub const LOG_FILE_SUFFIX: &str = ".log";

fn env_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

pub fn init_console_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Log to `<data_dir>/logs/chatlog-YYYY-MM-DD.log`, one file per UTC day,
/// keeping `retention_days` worth of files.
pub fn init_logging(data_dir: &str, retention_days: i64) -> Result<()> {
    let dir = LogDir::create(PathBuf::from(data_dir).join("logs"), retention_days)?;
    dir.prune(Utc::now())?;
    let writer = DailyWriter::open(dir, Utc::now())?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(())
}

/// Directory of daily log files and the naming scheme inside it.
#[derive(Debug)]
pub struct LogDir {
    path: PathBuf,
    retention_days: i64,
}

impl LogDir {
    pub fn create(path: PathBuf, retention_days: i64) -> Result<Self> {
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create log directory: {}", path.display()))?;
        Ok(LogDir {
            path,
            retention_days,
        })
    }

    pub fn file_for(&self, day: NaiveDate) -> PathBuf {
        self.path.join(format!(
            "{LOG_FILE_PREFIX}{}{LOG_FILE_SUFFIX}",
            day.format("%Y-%m-%d")
        ))
    }

    fn day_of(file_name: &str) -> Option<NaiveDate> {
        let body = file_name
            .strip_prefix(LOG_FILE_PREFIX)?
            .strip_suffix(LOG_FILE_SUFFIX)?;
        NaiveDate::parse_from_str(body, "%Y-%m-%d").ok()
    }

    fn open(&self, day: NaiveDate) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(day))
    }

    /// Delete log files dated before the retention window. Other files stay.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<()> {
        let cutoff = (now - Duration::days(self.retention_days)).date_naive();
        let entries = match fs::read_dir(&self.path) {
            Ok(v) => v,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        for path in entries.flatten().map(|entry| entry.path()) {
            let expired = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(Self::day_of)
                .is_some_and(|day| day < cutoff);
            if expired && path.is_file() {
                let _ = fs::remove_file(&path);
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct OpenDay {
    day: NaiveDate,
    file: File,
}

/// `MakeWriter` that switches to a new file when the UTC date changes.
#[derive(Clone, Debug)]
struct DailyWriter {
    dir: Arc<LogDir>,
    current: Arc<Mutex<OpenDay>>,
}

impl DailyWriter {
    fn open(dir: LogDir, now: DateTime<Utc>) -> Result<Self> {
        let day = now.date_naive();
        let file = dir.open(day)?;
        Ok(DailyWriter {
            dir: Arc::new(dir),
            current: Arc::new(Mutex::new(OpenDay { day, file })),
        })
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, OpenDay>> {
        self.current
            .lock()
            .map_err(|_| io::Error::other("failed to lock log writer"))
    }
}

impl<'a> MakeWriter<'a> for DailyWriter {
    type Writer = DailyWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for DailyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let now = Utc::now();
        let mut current = self.lock()?;
        if current.day != now.date_naive() {
            current.file.flush()?;
            current.file = self.dir.open(now.date_naive())?;
            current.day = now.date_naive();
            let _ = self.dir.prune(now);
        }
        current.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}
