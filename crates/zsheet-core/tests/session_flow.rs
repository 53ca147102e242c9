//! End-to-end session flows through files on disk.

use std::sync::Arc;

use zsheet_core::storage;
use zsheet_core::telemetry::{Level, MemoryTelemetry};
use zsheet_core::{Config, OpCode, Session};

fn session(dir: &std::path::Path) -> (Session, Arc<MemoryTelemetry>) {
    let telemetry = Arc::new(MemoryTelemetry::new());
    let config = Config {
        data_dir: Some(dir.to_path_buf()),
        ..Config::default()
    };
    (Session::new(config, telemetry.clone()), telemetry)
}

#[test]
fn test_edit_aggregate_save_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (mut s, _) = session(dir.path());

    s.on_cell_edit(0, 0, "10");
    s.on_cell_edit(0, 1, "20");
    s.on_cell_edit(1, 0, "=(1+2)*4");
    // AVG covers every other cell: (10 + 20 + 12) / 1299.
    let avg = s.on_cell_edit(2, 0, "=AVG");
    assert!((avg - 42.0 / 1299.0).abs() < 1e-12);
    assert_eq!(s.on_cell_edit(3, 0, "=max"), 20.0);

    let path = dir.path().join("book.ZSFF");
    assert!(s.on_save_requested(&path));

    let (mut back, _) = session(dir.path());
    assert!(back.on_load_requested(&path));
    assert_eq!(back.grid.snapshot(), s.grid.snapshot());
    // Formulas are not persisted.
    assert_eq!(back.on_cell_select(3, 0), "20");
}

#[test]
fn test_csv_non_numeric_token_becomes_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.csv");
    std::fs::write(&path, "1,2,3\n4,oops,6\n").unwrap();

    let (mut s, telemetry) = session(dir.path());
    assert!(s.on_load_requested(&path));
    assert_eq!(s.value(1, 1), Some(0.0));
    assert_eq!(s.value(1, 2), Some(6.0));
    assert!(telemetry.contains(Level::Warning, "stored as 0"));

    s.on_accelerated_op_requested(OpCode::SumAll);
    assert_eq!(s.last_total(), Some(16.0));
    assert_eq!(s.status(), "TOTAL: 16.00");
}

#[test]
fn test_csv_export_reimports() {
    let dir = tempfile::tempdir().unwrap();
    let (mut s, _) = session(dir.path());
    s.on_cell_edit(4, 7, "0.125");
    s.on_cell_edit(49, 25, "-1e6");

    let path = dir.path().join("out").join("grid.csv");
    assert!(s.export_csv(&path));
    assert_eq!(storage::load(&path).unwrap(), s.grid.snapshot());
}

#[test]
fn test_scale_then_sum() {
    let dir = tempfile::tempdir().unwrap();
    let (mut s, _) = session(dir.path());
    s.on_cell_edit(0, 0, "2");
    s.on_cell_edit(10, 10, "4");
    assert!(s.on_accelerated_op_requested(OpCode::Scale));
    assert!(s.on_accelerated_op_requested(OpCode::SumAll));
    assert_eq!(s.last_total(), Some(9.0));
}

#[test]
fn test_corrupt_file_keeps_grid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.zsff");
    let (mut s, _) = session(dir.path());
    s.on_cell_edit(0, 0, "5");
    assert!(s.on_save_requested(&path));

    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, bytes).unwrap();

    s.on_cell_edit(0, 0, "6");
    assert!(!s.on_load_requested(&path));
    assert_eq!(s.value(0, 0), Some(6.0));
    assert!(s.status().contains("mismatch"), "{}", s.status());
}
