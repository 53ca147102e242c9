//! Session telemetry.
//!
//! Components never reach for a global logger. They are handed an
//! `Arc<dyn Telemetry>` at construction and report through it; delivery is
//! best effort and a failing sink never surfaces as an error.
//!
//! Implementations:
//! - [`TracingTelemetry`] forwards to `tracing` with a `session` field.
//! - [`FileTelemetry`] appends to `<root>/<level>/<timestamp>_<session>.log`.
//! - [`MemoryTelemetry`] keeps records in memory, for tests.
//! - [`Fanout`] sends every record to several of the above.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

/// Severity of a telemetry record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging collaborator injected into every component.
pub trait Telemetry: Send + Sync {
    /// Identifier shared by every record of this process.
    fn session_id(&self) -> &str;

    fn log(&self, level: Level, message: &str);

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warning(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// 16 lowercase hex characters.
pub fn new_session_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Forwards records to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    session: String,
}

impl TracingTelemetry {
    pub fn new(session: impl Into<String>) -> Self {
        TracingTelemetry {
            session: session.into(),
        }
    }
}

impl Telemetry for TracingTelemetry {
    fn session_id(&self) -> &str {
        &self.session
    }

    fn log(&self, level: Level, message: &str) {
        let session = self.session.as_str();
        match level {
            Level::Info => tracing::info!(session, "{message}"),
            Level::Warning => tracing::warn!(session, "{message}"),
            Level::Error => tracing::error!(session, "{message}"),
        }
    }
}

/// Appends records to per-level log files under `root`.
///
/// Each record goes to `<root>/<level>/<YYYY-MM-DD_HH-MM-SS>_<session>.log`
/// as `[timestamp] [LEVEL] [ID:session] message`. Directories are created on
/// demand; write failures are reported to `tracing` and otherwise dropped.
#[derive(Debug, Clone)]
pub struct FileTelemetry {
    session: String,
    root: PathBuf,
}

impl FileTelemetry {
    pub fn new(root: impl Into<PathBuf>, session: impl Into<String>) -> Self {
        FileTelemetry {
            session: session.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, level: Level, now: &chrono::DateTime<chrono::Local>) -> PathBuf {
        let stamp = now.format("%Y-%m-%d_%H-%M-%S");
        self.root
            .join(level.as_str())
            .join(format!("{}_{}.log", stamp, self.session))
    }

    fn append(&self, level: Level, message: &str) -> std::io::Result<()> {
        let now = chrono::Local::now();
        let path = self.path_for(level, &now);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(
            file,
            "[{}] [{}] [ID:{}] {}",
            now.format("%Y-%m-%d %H:%M:%S%.6f"),
            level.as_str().to_ascii_uppercase(),
            self.session,
            message
        )
    }
}

impl Telemetry for FileTelemetry {
    fn session_id(&self) -> &str {
        &self.session
    }

    fn log(&self, level: Level, message: &str) {
        if let Err(e) = self.append(level, message) {
            tracing::debug!(root = %self.root.display(), error = %e, "log file write failed");
        }
    }
}

/// A captured telemetry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub message: String,
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    session: String,
    records: Mutex<Vec<Record>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        MemoryTelemetry {
            session: new_session_id(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Whether any record at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }
}

impl Telemetry for MemoryTelemetry {
    fn session_id(&self) -> &str {
        &self.session
    }

    fn log(&self, level: Level, message: &str) {
        self.records.lock().push(Record {
            level,
            message: message.to_string(),
        });
    }
}

/// Sends each record to every sink.
pub struct Fanout {
    session: String,
    sinks: Vec<Arc<dyn Telemetry>>,
}

impl Fanout {
    pub fn new(session: impl Into<String>, sinks: Vec<Arc<dyn Telemetry>>) -> Self {
        Fanout {
            session: session.into(),
            sinks,
        }
    }
}

impl Telemetry for Fanout {
    fn session_id(&self) -> &str {
        &self.session
    }

    fn log(&self, level: Level, message: &str) {
        for sink in &self.sinks {
            sink.log(level, message);
        }
    }
}
