//! zsheet_engine - Numeric spreadsheet engine (matrix, formulas, bulk ops).

pub mod accel;
pub mod engine;
