//! Periodic background snapshots of the live grid.
//!
//! A [`RecoverySupervisor`] owns one named thread. Every `interval` it takes
//! a consistent [`NumericGrid::snapshot`] and hands it to a [`SnapshotSink`].
//! A failed cycle is reported through telemetry and the loop carries on.
//! Stopping interrupts the wait immediately and joins the thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::Result;
use crate::grid::NumericGrid;
use crate::storage::{self, SaveReport};
use crate::telemetry::Telemetry;
use zsheet_engine::engine::Matrix;

/// Where snapshots go.
pub trait SnapshotSink: Send + Sync {
    /// Persist one snapshot. Returns the number of bytes written.
    fn persist(&self, snapshot: &Matrix) -> Result<u64>;

    fn describe(&self) -> String;
}

/// Writes each snapshot as `.zsff`, replacing the previous one.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSink for FileSink {
    fn persist(&self, snapshot: &Matrix) -> Result<u64> {
        let SaveReport { bytes, .. } = storage::save(snapshot, &self.path)?;
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Counters shared between the worker and its handle.
#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    failures: AtomicU64,
}

pub struct RecoverySupervisor;

impl RecoverySupervisor {
    /// Spawn the snapshot thread. The first snapshot is taken one `interval`
    /// after start.
    pub fn start(
        grid: Arc<NumericGrid>,
        sink: Arc<dyn SnapshotSink>,
        interval: Duration,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<RecoveryHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let counters = Arc::new(Counters::default());
        let worker_counters = counters.clone();

        telemetry.info(&format!(
            "Auto-Recovery Daemon started. Target: {} every {}s",
            sink.describe(),
            interval.as_secs_f64()
        ));

        let thread = std::thread::Builder::new()
            .name("zsheet-recovery".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if run_once(&grid, sink.as_ref(), telemetry.as_ref()).is_err() {
                        worker_counters.failures.fetch_add(1, Ordering::Relaxed);
                    }
                    worker_counters.cycles.fetch_add(1, Ordering::Release);
                }
                tracing::debug!("recovery thread exiting");
            })?;

        Ok(RecoveryHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            counters,
        })
    }
}

/// One snapshot cycle. Failures are logged as errors and returned.
pub fn run_once(grid: &NumericGrid, sink: &dyn SnapshotSink, telemetry: &dyn Telemetry) -> Result<u64> {
    let snapshot = grid.snapshot();
    match sink.persist(&snapshot) {
        Ok(bytes) => {
            telemetry.info(&format!("Snapshot verified. Size: {bytes} bytes."));
            Ok(bytes)
        }
        Err(e) => {
            telemetry.error(&format!("Auto-recovery failure: {e}"));
            Err(e)
        }
    }
}

/// Running supervisor. Dropping it stops and joins the thread.
pub struct RecoveryHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl RecoveryHandle {
    /// Completed snapshot cycles so far, failed ones included.
    pub fn snapshots_taken(&self) -> u64 {
        self.counters.cycles.load(Ordering::Acquire)
    }

    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("recovery thread panicked");
        }
    }
}

impl Drop for RecoveryHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZsheetError;
    use crate::telemetry::{Level, MemoryTelemetry};
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct CaptureSink {
        seen: Mutex<Vec<Matrix>>,
        fail: bool,
    }

    impl SnapshotSink for CaptureSink {
        fn persist(&self, snapshot: &Matrix) -> Result<u64> {
            if self.fail {
                return Err(ZsheetError::Io(std::io::Error::other("disk full")));
            }
            self.seen.lock().push(snapshot.clone());
            Ok((snapshot.len() * 8) as u64)
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_run_once_logs_size() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let grid = NumericGrid::new(2, 2, telemetry.clone());
        let sink = CaptureSink::default();
        assert_eq!(run_once(&grid, &sink, telemetry.as_ref()).unwrap(), 32);
        assert!(telemetry.contains(Level::Info, "Snapshot verified. Size: 32 bytes."));
    }

    #[test]
    fn test_failures_are_logged_and_loop_continues() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let grid = Arc::new(NumericGrid::new(2, 2, telemetry.clone()));
        let sink = Arc::new(CaptureSink { fail: true, ..Default::default() });
        let handle = RecoverySupervisor::start(
            grid,
            sink,
            Duration::from_millis(5),
            telemetry.clone(),
        )
        .unwrap();
        assert!(wait_for(|| handle.snapshots_taken() >= 2));
        assert!(handle.failures() >= 2);
        assert!(handle.is_running());
        handle.stop();
        assert!(telemetry.contains(Level::Error, "Auto-recovery failure"));
    }

    #[test]
    fn test_snapshots_reflect_edits() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let grid = Arc::new(NumericGrid::new(3, 3, telemetry.clone()));
        grid.set_cell(1, 1, "9").unwrap();
        let sink = Arc::new(CaptureSink::default());
        let handle = RecoverySupervisor::start(
            grid.clone(),
            sink.clone(),
            Duration::from_millis(5),
            telemetry,
        )
        .unwrap();
        assert!(wait_for(|| handle.snapshots_taken() >= 1));
        handle.stop();
        let seen = sink.seen.lock();
        assert_eq!(seen[0].as_slice()[4], 9.0);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let grid = Arc::new(NumericGrid::new(1, 1, telemetry.clone()));
        let handle = RecoverySupervisor::start(
            grid,
            Arc::new(CaptureSink::default()),
            Duration::from_secs(3600),
            telemetry,
        )
        .unwrap();
        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_file_sink_writes_zsff() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("data").join("recovery.zsff"));
        let bytes = sink.persist(&Matrix::zeros(2, 3)).unwrap();
        assert_eq!(bytes, 16 + 6 * 8);
        assert_eq!(storage::load(sink.path()).unwrap().dimensions(), (2, 3));
    }
}
