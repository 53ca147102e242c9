//! Spreadsheet engine API.
//!
//! This module provides the numeric core of the spreadsheet:
//!
//! - [`CellRef`] - Cell reference parsing (A1 notation ↔ row/col indices)
//! - [`Matrix`] - Dense row-major grid storage
//! - [`evaluate`] / [`evaluate_at`] - Whole-grid aggregates and restricted arithmetic
//! - [`format_number`] - Format values for display

mod cell_ref;
mod eval;
mod expr;
mod format;
mod matrix;

pub use cell_ref::CellRef;
pub use eval::{Aggregate, EvalError, evaluate, evaluate_at, formula_body};
pub use expr::{MAX_DEPTH, eval_arithmetic};
pub use format::{format_grouped, format_number};
pub use matrix::Matrix;
