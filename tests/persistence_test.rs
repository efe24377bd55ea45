#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn run(db_path: &std::path::Path, rows: &[&str]) -> String {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "op,requester,train,date,from,to,class,hold").unwrap();
    for row in rows {
        writeln!(csv, "{row}").unwrap();
    }

    let output = Command::new(cargo_bin!("seat-hold"))
        .arg(csv.path())
        .arg("--catalog")
        .arg("tests/fixtures/catalog.json")
        .arg("--db-path")
        .arg(db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: hold one of the two second-class seats
    let stdout1 = run(&db_path, &["hold,alice,D5,2025-10-01,BJP,SHH,second,h1"]);
    assert!(stdout1.contains("D5,2025-10-01,BJP,SHH,second,2,1,1"));

    // 2. Second run: the active hold is restored before new requests are served
    let stdout2 = run(
        &db_path,
        &[
            "hold,bob,D5,2025-10-01,BJP,SHH,second,h1",
            "hold,carol,D5,2025-10-01,BJP,SHH,second,h2",
        ],
    );
    assert!(stdout2.contains("D5,2025-10-01,BJP,SHH,second,2,2,0"));
}
