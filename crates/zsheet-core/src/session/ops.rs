use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use zsheet_engine::engine::{CellRef, format_grouped, format_number};

use super::{Session, Stats};
use crate::grid::RecalcReport;

/// Bulk operations a front end can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    SumAll,
    Scale,
}

impl OpCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpCode::SumAll => "SUM_ALL",
            OpCode::Scale => "SCALE",
        }
    }
}

impl FromStr for OpCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUM_ALL" => Ok(OpCode::SumAll),
            "SCALE" => Ok(OpCode::Scale),
            other => Err(format!("Unknown operation: {}", other)),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Session {
    /// Apply an edit and return the value now stored for repaint.
    ///
    /// Problems never escape: a bad formula or number stores 0.0 and sets
    /// the status; an out-of-range coordinate changes nothing.
    pub fn on_cell_edit(&mut self, row: usize, col: usize, text: &str) -> f64 {
        let write = match self.grid.set_cell(row, col, text) {
            Ok(write) => write,
            Err(e) => {
                self.telemetry.error(&format!("Edit rejected: {e}"));
                self.set_status(e.to_string());
                return 0.0;
            }
        };

        self.modified = true;
        match &write.issue {
            Some(e) => self.set_status(format!("{}: {e}", write.cell)),
            None => self.set_status(format!("{} = {}", write.cell, format_number(write.value))),
        }

        if self.config.recalc_on_edit {
            self.grid.recalculate();
        }
        if self.selection == Some(write.cell) {
            self.selection_stats = Stats::single(write.value);
        }
        write.value
    }

    /// Select a cell and return its editable text.
    pub fn on_cell_select(&mut self, row: usize, col: usize) -> String {
        let text = match self.grid.cell_input(row, col) {
            Ok(text) => text,
            Err(e) => {
                self.telemetry.warning(&format!("Select rejected: {e}"));
                self.set_status(e.to_string());
                return String::new();
            }
        };
        let value = self.grid.get_cell(row, col).unwrap_or(0.0);
        self.selection = Some(CellRef::new(row, col));
        self.selection_stats = Stats::single(value);
        self.telemetry.info(&format!("Cell Select: [{row}, {col}]"));
        text
    }

    /// Current value of a cell, or None outside the grid.
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.grid.get_cell(row, col).ok()
    }

    /// Stats over every cell of the grid.
    pub fn grid_stats(&self) -> Stats {
        Stats::of(self.grid.snapshot().iter())
    }

    /// Re-evaluate every formula against the current grid.
    pub fn recalculate(&mut self) -> RecalcReport {
        let report = self.grid.recalculate();
        if report.failed > 0 {
            self.set_status(format!(
                "RECALCULATED {} FORMULAS, {} FAILED",
                report.evaluated, report.failed
            ));
        } else {
            self.set_status(format!("RECALCULATED {} FORMULAS", report.evaluated));
        }
        report
    }

    /// Run a bulk operation on a snapshot of the grid.
    ///
    /// `SUM_ALL` reports the total in the status text. `SCALE` multiplies by
    /// the configured factor and replaces the grid, dropping formulas.
    pub fn on_accelerated_op_requested(&mut self, op: OpCode) -> bool {
        let snapshot = self.grid.snapshot();
        let started = Instant::now();

        match op {
            OpCode::SumAll => {
                let total = self.backend.sum_all(&snapshot);
                self.last_total = Some(total);
                self.telemetry
                    .info(&format!("{} engine SUM result: {total}", self.backend.name()));
                self.set_status(format!("TOTAL: {}", format_grouped(total)));
            }
            OpCode::Scale => {
                let factor = self.config.scale_factor;
                let scaled = self.backend.scale(&snapshot, factor);
                let sanitized = self.grid.replace(&scaled);
                if sanitized > 0 {
                    self.telemetry.warning(&format!(
                        "Scale by {factor} overflowed {sanitized} cells, stored as 0"
                    ));
                }
                self.modified = true;
                self.set_status(format!("SCALED BY {}", format_number(factor)));
            }
        }

        self.telemetry.info(&format!(
            "Execution timing: {:.4}ms ({op} on {})",
            started.elapsed().as_secs_f64() * 1000.0,
            self.backend.name()
        ));
        true
    }
}
