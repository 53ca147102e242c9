//! zsheet-core - UI-agnostic grid, storage, recovery and session.

pub mod config;
pub mod error;
pub mod grid;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{Result, ZsheetError};
pub use grid::{CellKind, CellWrite, NumericGrid, RecalcReport};
pub use recovery::{FileSink, RecoveryHandle, RecoverySupervisor, SnapshotSink};
pub use session::{OpCode, Session, Stats};
pub use telemetry::{Level, Telemetry};

pub use zsheet_engine::engine::{CellRef, Matrix};
