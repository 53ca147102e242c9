use std::path::Path;
use std::sync::Arc;

use super::Session;
use crate::recovery::{FileSink, RecoverySupervisor};
use crate::storage::{self, write_csv};

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Session {
    /// Save the grid as `.zsff`. On failure the grid and `file_path` are untouched.
    pub fn on_save_requested(&mut self, path: &Path) -> bool {
        let snapshot = self.grid.snapshot();
        match storage::save(&snapshot, path) {
            Ok(report) => {
                self.telemetry.info(&format!(
                    "File saved: {}. Hash: {}",
                    path.display(),
                    report.short_digest()
                ));
                self.file_path = Some(path.to_path_buf());
                self.modified = false;
                self.set_status(format!("SAVED: {}", display_name(path)));
                true
            }
            Err(e) => {
                self.telemetry
                    .error(&format!("Save failed for {}: {e}", path.display()));
                self.set_status(format!("SAVE FAILED: {e}"));
                false
            }
        }
    }

    /// Load `.zsff` or CSV into the grid. On failure the grid is untouched.
    pub fn on_load_requested(&mut self, path: &Path) -> bool {
        self.telemetry
            .info(&format!("Importing dataset: {}", path.display()));
        let report = match storage::load_report(path) {
            Ok(report) => report,
            Err(e) => {
                self.telemetry
                    .error(&format!("Load failed for {}: {e}", path.display()));
                self.set_status(format!("LOAD FAILED: {e}"));
                return false;
            }
        };

        let (rows, cols) = report.matrix.dimensions();
        if (rows, cols) != self.grid.dimensions() {
            let (grid_rows, grid_cols) = self.grid.dimensions();
            self.telemetry.warning(&format!(
                "{} is {rows}x{cols}, fitted to the {grid_rows}x{grid_cols} grid",
                display_name(path)
            ));
        }
        if report.sanitized > 0 {
            self.telemetry.warning(&format!(
                "{} cells in {} were not finite numbers and were stored as 0",
                report.sanitized,
                display_name(path)
            ));
        }

        self.grid.replace(&report.matrix);
        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        self.set_status("LOAD COMPLETE");
        true
    }

    /// Write the grid as CSV.
    pub fn export_csv(&mut self, path: &Path) -> bool {
        match write_csv(path, &self.grid.snapshot()) {
            Ok(()) => {
                self.telemetry
                    .info(&format!("Exported CSV: {}", path.display()));
                self.set_status(format!("EXPORTED: {}", display_name(path)));
                true
            }
            Err(e) => {
                self.telemetry
                    .error(&format!("Export failed for {}: {e}", path.display()));
                self.set_status(format!("EXPORT FAILED: {e}"));
                false
            }
        }
    }

    /// Load the last auto-recovery snapshot, if there is one.
    pub fn recover(&mut self) -> bool {
        let path = self.config.recovery_path();
        if !path.exists() {
            self.set_status("NO RECOVERY SNAPSHOT");
            return false;
        }
        let ok = self.on_load_requested(&path);
        if ok {
            // Recovered data has not been saved anywhere by the user yet.
            self.file_path = None;
            self.modified = true;
            self.set_status("RECOVERED");
        }
        ok
    }

    /// Start periodic snapshots to `<data_dir>/recovery.zsff`.
    ///
    /// Returns false when recovery is disabled, already running, or the
    /// thread cannot be spawned. A data directory that cannot be created is
    /// logged; each cycle then reports its own failure.
    pub fn start_recovery(&mut self) -> bool {
        if !self.config.recovery_enabled || self.recovery.is_some() {
            return false;
        }
        let data_dir = self.config.data_dir();
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            self.telemetry.warning(&format!(
                "Cannot create data directory {}: {e}",
                data_dir.display()
            ));
        }

        let sink = Arc::new(FileSink::new(self.config.recovery_path()));
        match RecoverySupervisor::start(
            self.grid.clone(),
            sink,
            self.config.recovery_interval(),
            self.telemetry.clone(),
        ) {
            Ok(handle) => {
                self.recovery = Some(handle);
                true
            }
            Err(e) => {
                self.telemetry
                    .error(&format!("Auto-recovery could not start: {e}"));
                false
            }
        }
    }

    /// Stop the snapshot thread, if running.
    pub fn stop_recovery(&mut self) {
        if let Some(handle) = self.recovery.take() {
            handle.stop();
        }
    }

    /// Snapshots written by the running supervisor, if any.
    pub fn recovery_snapshots(&self) -> Option<u64> {
        self.recovery.as_ref().map(|h| h.snapshots_taken())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::telemetry::{Level, MemoryTelemetry};

    fn session_in(dir: &Path) -> (Session, Arc<MemoryTelemetry>) {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let config = Config {
            rows: 4,
            cols: 4,
            data_dir: Some(dir.to_path_buf()),
            ..Config::default()
        };
        (Session::new(config, telemetry.clone()), telemetry)
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.zsff");
        let (mut s, telemetry) = session_in(dir.path());
        s.on_cell_edit(0, 0, "1.5");
        s.on_cell_edit(3, 3, "-2");
        assert!(s.on_save_requested(&path));
        assert_eq!(s.status(), "SAVED: sheet.zsff");
        assert!(!s.modified);
        assert!(telemetry.contains(Level::Info, "Hash: "));

        let (mut other, _) = session_in(dir.path());
        assert!(other.on_load_requested(&path));
        assert_eq!(other.value(0, 0), Some(1.5));
        assert_eq!(other.value(3, 3), Some(-2.0));
        assert_eq!(other.status(), "LOAD COMPLETE");
    }

    #[test]
    fn test_failed_load_leaves_grid() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.zsff");
        std::fs::write(&bad, b"garbage").unwrap();
        let (mut s, telemetry) = session_in(dir.path());
        s.on_cell_edit(1, 1, "7");
        s.on_cell_edit(1, 2, "=SUM");

        assert!(!s.on_load_requested(&bad));
        assert!(s.status().starts_with("LOAD FAILED"));
        assert_eq!(s.value(1, 1), Some(7.0));
        assert_eq!(s.grid.formula_at(1, 2).as_deref(), Some("=SUM"));
        assert!(telemetry.contains(Level::Error, "bad.zsff"));

        assert!(!s.on_load_requested(&dir.path().join("missing.csv")));
        assert_eq!(s.value(1, 1), Some(7.0));
    }

    #[test]
    fn test_failed_save_reports() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let (mut s, _) = session_in(dir.path());
        s.on_cell_edit(0, 0, "1");
        assert!(!s.on_save_requested(&blocker.join("x.zsff")));
        assert!(s.status().starts_with("SAVE FAILED"));
        assert!(s.modified);
        assert_eq!(s.file_path, None);
    }

    #[test]
    fn test_load_csv_fits_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        std::fs::write(&path, "1,2,3,4,5,6\nx,8\n").unwrap();
        let (mut s, telemetry) = session_in(dir.path());
        assert!(s.on_load_requested(&path));
        assert_eq!(s.value(0, 3), Some(4.0));
        assert_eq!(s.value(1, 0), Some(0.0));
        assert_eq!(s.value(1, 1), Some(8.0));
        assert!(telemetry.contains(Level::Warning, "fitted to the 4x4 grid"));
        assert!(telemetry.contains(Level::Warning, "1 cells"));
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let (mut s, _) = session_in(dir.path());
        s.on_cell_edit(0, 1, "2.5");
        assert!(s.export_csv(&path));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert_eq!(content.lines().next(), Some("0,2.5,0,0"));
    }

    #[test]
    fn test_recover() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session_in(dir.path());
        assert!(!s.recover());
        assert_eq!(s.status(), "NO RECOVERY SNAPSHOT");

        s.on_cell_edit(2, 2, "42");
        let recovery = s.config().recovery_path();
        storage::save(&s.grid.snapshot(), &recovery).unwrap();

        let (mut fresh, _) = session_in(dir.path());
        assert!(fresh.recover());
        assert_eq!(fresh.value(2, 2), Some(42.0));
        assert_eq!(fresh.status(), "RECOVERED");
        assert!(fresh.modified);
    }

    #[test]
    fn test_start_recovery_once() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, telemetry) = session_in(&dir.path().join("data"));
        assert!(s.start_recovery());
        assert!(!s.start_recovery());
        assert!(dir.path().join("data").is_dir());
        assert_eq!(s.recovery_snapshots(), Some(0));
        s.stop_recovery();
        assert_eq!(s.recovery_snapshots(), None);
        assert!(telemetry.contains(Level::Info, "Auto-Recovery Daemon started"));
    }

    #[test]
    fn test_start_recovery_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = Arc::new(MemoryTelemetry::new());
        let config = Config {
            recovery_enabled: false,
            data_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let mut s = Session::new(config, telemetry);
        assert!(!s.start_recovery());
    }
}
