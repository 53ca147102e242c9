use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use zsheet_engine::accel::{AcceleratedOps, select_backend};
use zsheet_engine::engine::{CellRef, format_number};

use crate::config::Config;
use crate::grid::NumericGrid;
use crate::recovery::RecoveryHandle;
use crate::telemetry::{Fanout, FileTelemetry, Telemetry, TracingTelemetry, new_session_id};

/// `(average, total, count)` shown beside the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    pub average: f64,
    pub total: f64,
    pub count: usize,
}

impl Stats {
    pub fn of(values: impl IntoIterator<Item = f64>) -> Stats {
        let (total, count) = values
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        let average = if count == 0 { 0.0 } else { total / count as f64 };
        Stats {
            average,
            total,
            count,
        }
    }

    /// Stats for a single selected cell.
    pub fn single(value: f64) -> Stats {
        Stats {
            average: value,
            total: value,
            count: 1,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AVG: {} | SUM: {} | COUNT: {}",
            format_number(self.average),
            format_number(self.total),
            self.count
        )
    }
}

/// UI-agnostic session: the grid plus everything a front end talks to.
pub struct Session {
    /// The live grid, shared with the recovery thread.
    pub grid: Arc<NumericGrid>,
    pub(crate) backend: Box<dyn AcceleratedOps>,
    pub(crate) telemetry: Arc<dyn Telemetry>,
    pub(crate) config: Config,
    pub(crate) status: String,
    pub(crate) selection: Option<CellRef>,
    pub(crate) selection_stats: Stats,
    pub(crate) last_total: Option<f64>,
    pub(crate) recovery: Option<RecoveryHandle>,
    /// Last file saved or loaded.
    pub file_path: Option<PathBuf>,
    /// Whether the grid changed since the last save or load.
    pub modified: bool,
}

impl Session {
    /// Create a session reporting to `telemetry`.
    ///
    /// Touches no files; recovery is started separately with
    /// [`Session::start_recovery`].
    pub fn new(config: Config, telemetry: Arc<dyn Telemetry>) -> Self {
        let backend = select_backend(config.backend);
        let grid = Arc::new(NumericGrid::new(config.rows, config.cols, telemetry.clone()));
        telemetry.info(&format!(
            "Booting zsheet {}x{}. Engine: {} (requested {})",
            config.rows,
            config.cols,
            backend.name(),
            config.backend
        ));

        Session {
            grid,
            backend,
            telemetry,
            config,
            status: "READY".to_string(),
            selection: None,
            selection_stats: Stats::default(),
            last_total: None,
            recovery: None,
            file_path: None,
            modified: false,
        }
    }

    /// Create a session with the standard telemetry for `config`: `tracing`,
    /// plus per-level log files under the data directory when `file_logs` is set.
    pub fn with_config(config: Config) -> Self {
        let session = new_session_id();
        let mut sinks: Vec<Arc<dyn Telemetry>> = Vec::new();
        sinks.push(Arc::new(TracingTelemetry::new(&session)));
        if config.file_logs {
            sinks.push(Arc::new(FileTelemetry::new(config.log_dir(), &session)));
        }
        let telemetry = Arc::new(Fanout::new(session, sinks));
        Session::new(config, telemetry)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.telemetry
    }

    pub fn session_id(&self) -> &str {
        self.telemetry.session_id()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Last status text.
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selection(&self) -> Option<CellRef> {
        self.selection
    }

    /// Stats for the current selection.
    pub fn stats(&self) -> Stats {
        self.selection_stats
    }

    /// Result of the most recent `SUM_ALL`.
    pub fn last_total(&self) -> Option<f64> {
        self.last_total
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.grid.dimensions()
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}
