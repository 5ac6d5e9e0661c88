//! Changes the working directory, so it lives in its own test binary.

use photo_dupes_core::scanner::{load_folder, LoadOptions};
use photo_dupes_core::storage::Database;
use photo_dupes_core::SilentReporter;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_relative_then_absolute_load_keeps_one_record() {
    let root = tempdir().unwrap();
    let lib = root.path().join("lib");
    fs::create_dir(&lib).unwrap();
    fs::write(lib.join("a.jpg"), b"not really a jpeg").unwrap();

    let previous = env::current_dir().unwrap();
    env::set_current_dir(root.path()).unwrap();
    let mut db = Database::open_in_memory().unwrap();
    let first = load_folder(&mut db, Path::new("lib"), &LoadOptions::default(), &SilentReporter);
    env::set_current_dir(previous).unwrap();

    assert_eq!(first.unwrap().inserted, 1);
    let second =
        load_folder(&mut db, &lib, &LoadOptions::default(), &SilentReporter).unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 1);

    let records = db.find_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].full_path(),
        lib.canonicalize().unwrap().join("a.jpg")
    );
}
