//! The live numeric grid shared between the foreground and auto-recovery.
//!
//! Locking: one `RwLock` guards the matrix. A cell write (including the
//! formula evaluation that feeds it) holds the write lock; a snapshot holds
//! the read lock for the full copy. The formula registry is only mutated
//! while the write lock is held, so a cell's value and its registry entry
//! always change together.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use zsheet_engine::engine::{CellRef, Matrix, evaluate_at};

use crate::error::{Result, ZsheetError, snippet};
use crate::telemetry::Telemetry;

/// What kind of content a cell write stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Number,
    Formula,
}

/// Result of [`NumericGrid::set_cell`].
///
/// The edit is always applied. `issue` carries a recovered problem (bad
/// formula or unparseable number) whose cell was stored as 0.0.
#[derive(Debug)]
pub struct CellWrite {
    pub cell: CellRef,
    pub kind: CellKind,
    pub value: f64,
    pub issue: Option<ZsheetError>,
}

/// Outcome of a grid-wide recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcReport {
    pub evaluated: usize,
    pub failed: usize,
}

pub struct NumericGrid {
    rows: usize,
    cols: usize,
    matrix: RwLock<Matrix>,
    formulas: DashMap<CellRef, String>,
    telemetry: Arc<dyn Telemetry>,
}

/// Parse plain cell input. Empty input is a deliberate zero.
fn parse_plain(text: &str) -> std::result::Result<f64, ZsheetError> {
    if text.is_empty() {
        return Ok(0.0);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ZsheetError::Parse {
            input: snippet(text),
        }),
    }
}

impl NumericGrid {
    pub fn new(rows: usize, cols: usize, telemetry: Arc<dyn Telemetry>) -> Self {
        NumericGrid {
            rows,
            cols,
            matrix: RwLock::new(Matrix::zeros(rows, cols)),
            formulas: DashMap::new(),
            telemetry,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn check(&self, row: usize, col: usize) -> Result<CellRef> {
        let cell = CellRef::new(row, col);
        if cell.in_bounds(self.rows, self.cols) {
            Ok(cell)
        } else {
            Err(ZsheetError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Apply one edit.
    ///
    /// Text starting with `=` registers a formula and stores its result;
    /// anything else drops a registered formula and stores the parsed number.
    /// Failures store 0.0 and are reported through [`CellWrite::issue`].
    pub fn set_cell(&self, row: usize, col: usize, raw: &str) -> Result<CellWrite> {
        let cell = self.check(row, col)?;
        let text = raw.trim();

        let write = if text.starts_with('=') {
            let mut matrix = self.matrix.write();
            self.formulas.insert(cell, text.to_string());
            let result = evaluate_at(text, &matrix, cell);
            let value = *result.as_ref().unwrap_or(&0.0);
            matrix.set(cell, value);
            drop(matrix);

            CellWrite {
                cell,
                kind: CellKind::Formula,
                value,
                issue: result.err().map(ZsheetError::from),
            }
        } else {
            let parsed = parse_plain(text);
            let value = *parsed.as_ref().unwrap_or(&0.0);
            let mut matrix = self.matrix.write();
            self.formulas.remove(&cell);
            matrix.set(cell, value);
            drop(matrix);

            CellWrite {
                cell,
                kind: CellKind::Number,
                value,
                issue: parsed.err(),
            }
        };

        match (&write.issue, write.kind) {
            (Some(e), CellKind::Formula) => self.telemetry.warning(&format!(
                "Formula error at [{row},{col}] {:?}: {e}",
                snippet(text)
            )),
            (Some(_), CellKind::Number) => self.telemetry.warning(&format!(
                "Invalid data input at row {row} col {col}: {:?}",
                snippet(text)
            )),
            (None, CellKind::Formula) => self.telemetry.info(&format!(
                "Cell [{row},{col}] formula calculated: {}",
                write.value
            )),
            (None, CellKind::Number) => {}
        }
        tracing::debug!(%cell, value = write.value, kind = ?write.kind, "cell written");

        Ok(write)
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Result<f64> {
        let cell = self.check(row, col)?;
        Ok(self.matrix.read().get(cell).unwrap_or(0.0))
    }

    /// Editable text for a cell: the formula if one is registered, else the number.
    pub fn cell_input(&self, row: usize, col: usize) -> Result<String> {
        let cell = self.check(row, col)?;
        if let Some(formula) = self.formulas.get(&cell) {
            return Ok(formula.value().clone());
        }
        Ok(self.matrix.read().get(cell).unwrap_or(0.0).to_string())
    }

    pub fn formula_at(&self, row: usize, col: usize) -> Option<String> {
        self.formulas
            .get(&CellRef::new(row, col))
            .map(|f| f.value().clone())
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    /// Registered formulas in row-major order.
    pub fn formulas(&self) -> Vec<(CellRef, String)> {
        let mut all: Vec<(CellRef, String)> = self
            .formulas
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(cell, _)| *cell);
        all
    }

    /// Owned copy of the whole matrix, never torn by a concurrent `set_cell`.
    pub fn snapshot(&self) -> Matrix {
        self.matrix.read().clone()
    }

    /// Re-evaluate every registered formula in row-major order.
    pub fn recalculate(&self) -> RecalcReport {
        let mut report = RecalcReport::default();
        for (cell, _) in self.formulas() {
            let mut matrix = self.matrix.write();
            // Registry may have changed since the listing was taken.
            let Some(formula) = self.formulas.get(&cell).map(|f| f.value().clone()) else {
                continue;
            };
            let result = evaluate_at(&formula, &matrix, cell);
            matrix.set(cell, *result.as_ref().unwrap_or(&0.0));
            drop(matrix);

            report.evaluated += 1;
            if let Err(e) = result {
                report.failed += 1;
                self.telemetry
                    .warning(&format!("Recalculation failed at {cell}: {e}"));
            }
        }
        tracing::debug!(evaluated = report.evaluated, failed = report.failed, "recalculated");
        report
    }

    /// Replace the whole matrix (load, scale). The input is clipped or padded
    /// to the grid's dimensions, non-finite entries become 0.0 and every
    /// formula registration is dropped. Returns how many entries were sanitized.
    pub fn replace(&self, incoming: &Matrix) -> usize {
        let mut next = incoming.fit_to(self.rows, self.cols);
        let sanitized = next.sanitize();
        let mut matrix = self.matrix.write();
        *matrix = next;
        self.formulas.clear();
        drop(matrix);
        sanitized
    }
}
