use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photo_dupes_core::analysis::find_duplicate_groups;
use photo_dupes_core::hasher::normalize::normalize_path;
use photo_dupes_core::hasher::{
    difference_hash, run_hash_pass, HashRequest, PERCEPTUAL_SIZE_LIMIT,
};
use photo_dupes_core::scanner::{load_folder, LoadOptions};
use photo_dupes_core::storage::models::*;
use photo_dupes_core::storage::Database;
use photo_dupes_core::{AppConfig, SilentReporter};
use std::fs::{self, OpenOptions};
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

fn gradient(width: u32, height: u32, seed: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 255) / width) as u8 ^ seed,
            ((y * 255) / height) as u8,
            seed,
        ])
    }))
}

/// Layout:
///   root/
///     sunset.png          gradient
///     sunset_copy.png     byte copy of sunset.png
///     other.png           different gradient
///     broken.jpg          text, not an image
///     truncated.png       first half of a real PNG
///     clip.mp4            arbitrary bytes
fn create_library(root: &Path) {
    gradient(96, 64, 0).save(root.join("sunset.png")).unwrap();
    fs::copy(root.join("sunset.png"), root.join("sunset_copy.png")).unwrap();
    gradient(96, 64, 0x5A).save(root.join("other.png")).unwrap();
    fs::write(root.join("broken.jpg"), b"definitely not a jpeg").unwrap();

    let mut png = Vec::new();
    gradient(64, 64, 3)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    fs::write(root.join("truncated.png"), &png[..png.len() / 2]).unwrap();

    fs::write(root.join("clip.mp4"), vec![0x42u8; 2048]).unwrap();
}

fn find(db: &mut Database, root: &Path, name: &str) -> MediaFile {
    let root = root.canonicalize().unwrap();
    db.find_by_path(&root.join(name)).unwrap().unwrap()
}

/// A real PNG padded with zeros to `len` bytes. The padding stays sparse on disk.
fn padded_png(path: &Path, len: u64) {
    gradient(32, 32, 7).save(path).unwrap();
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

fn config() -> AppConfig {
    AppConfig {
        hash_workers: 2,
        ..Default::default()
    }
}

#[test]
fn test_load_twice_keeps_one_record_per_path() {
    let root = tempdir().unwrap();
    create_library(root.path());
    let mut db = Database::open_in_memory().unwrap();

    let first = load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();
    assert_eq!(first.inserted, 6);
    let second =
        load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 6);
    assert_eq!(db.count_media_files().unwrap(), 6);

    let replaced = load_folder(
        &mut db,
        root.path(),
        &LoadOptions {
            replace: true,
            ..Default::default()
        },
        &SilentReporter,
    )
    .unwrap();
    assert_eq!(replaced.inserted, 6);
    assert_eq!(db.count_media_files().unwrap(), 6);
}

#[test]
fn test_full_hash_pass_outcomes() {
    let root = tempdir().unwrap();
    create_library(root.path());
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();

    let summary =
        run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();
    assert_eq!(summary.candidates, 6);
    assert_eq!(summary.processed, 4);
    assert_eq!(summary.invalid, 2);
    assert_eq!(summary.failed, 0);

    let sunset = find(&mut db, root.path(), "sunset.png");
    assert_eq!(sunset.format_valid, Some(true));
    assert!(sunset.sha.is_some());
    assert!(sunset.average_hash.is_some());
    assert!(sunset.perceptual_hash.is_some());
    let expected = difference_hash(&normalize_path(&sunset.full_path()).unwrap());
    assert_eq!(
        sunset.fingerprint(FingerprintKind::Difference),
        Some(FingerprintValue::Perceptual(expected))
    );

    let copy = find(&mut db, root.path(), "sunset_copy.png");
    assert_eq!(copy.sha, sunset.sha);
    assert_eq!(copy.difference_hash, sunset.difference_hash);

    // Not a recognisable container: sticky invalid and demoted to Unknown.
    let broken = find(&mut db, root.path(), "broken.jpg");
    assert_eq!(broken.format_valid, Some(false));
    assert_eq!(broken.group(), MediaGroup::Unknown);
    assert!(broken.sha.is_some());
    assert!(broken.difference_hash.is_none());

    // Recognised but corrupt: invalid, group unchanged.
    let truncated = find(&mut db, root.path(), "truncated.png");
    assert_eq!(truncated.format_valid, Some(false));
    assert_eq!(truncated.group(), MediaGroup::Photo);

    // Video gets a digest and nothing else.
    let clip = find(&mut db, root.path(), "clip.mp4");
    assert!(clip.sha.is_some());
    assert!(clip.average_hash.is_none());
    assert_eq!(clip.format_valid, None);
}

#[test]
fn test_second_pass_processes_nothing() {
    let root = tempdir().unwrap();
    create_library(root.path());
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();

    run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();
    let before = db.find_all().unwrap();

    let again =
        run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(again.written, 0);
    assert_eq!(db.find_all().unwrap(), before);
}

#[test]
fn test_partial_request_only_fills_requested_kinds() {
    let root = tempdir().unwrap();
    create_library(root.path());
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();

    let request = HashRequest {
        difference: true,
        ..Default::default()
    };
    let summary = run_hash_pass(&mut db, &request, &config(), &SilentReporter, false).unwrap();
    // Three decodable photos; the video has nothing to do.
    assert_eq!(summary.processed, 3);

    let sunset = find(&mut db, root.path(), "sunset.png");
    assert!(sunset.difference_hash.is_some());
    assert!(sunset.sha.is_none());
    assert!(sunset.average_hash.is_none());
}

#[test]
fn test_duplicates_found_after_hash_pass() {
    let root = tempdir().unwrap();
    create_library(root.path());
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();
    run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();

    let groups = find_duplicate_groups(&mut db, FingerprintKind::Sha, None).unwrap();
    assert_eq!(groups.len(), 1);
    let names: Vec<&str> = groups[0]
        .members
        .iter()
        .map(|m| m.file_name.as_str())
        .collect();
    assert!(names.contains(&"sunset.png"));
    assert!(names.contains(&"sunset_copy.png"));

    let by_difference =
        find_duplicate_groups(&mut db, FingerprintKind::Difference, None).unwrap();
    assert!(by_difference
        .iter()
        .any(|g| g.members.iter().any(|m| m.file_name == "sunset_copy.png")));
}

#[test]
fn test_oversize_photo_gets_digest_only() {
    let root = tempdir().unwrap();
    let limit = PERCEPTUAL_SIZE_LIMIT as u64;
    padded_png(&root.path().join("over.png"), limit + 1);
    padded_png(&root.path().join("at_limit.png"), limit);
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();

    let summary =
        run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.invalid, 0);

    let over = find(&mut db, root.path(), "over.png");
    assert_eq!(over.file_size, 71_000_001);
    assert!(over.sha.is_some());
    assert!(over.average_hash.is_none());
    assert!(over.difference_hash.is_none());
    assert!(over.perceptual_hash.is_none());
    assert_eq!(over.format_valid, None);

    let at_limit = find(&mut db, root.path(), "at_limit.png");
    assert_eq!(at_limit.file_size, 71_000_000);
    assert!(at_limit.sha.is_some());
    assert!(at_limit.difference_hash.is_some());
    assert_eq!(at_limit.format_valid, Some(true));

    // Nothing left but perceptual kinds, which the oversize photo never gets.
    let again =
        run_hash_pass(&mut db, &HashRequest::all(), &config(), &SilentReporter, false).unwrap();
    assert_eq!(again.candidates, 1);
    assert_eq!(again.dropped, 1);
    assert_eq!(again.processed, 0);
}

#[test]
fn test_every_candidate_is_counted_once_across_workers() {
    let root = tempdir().unwrap();
    for i in 0..6u8 {
        let batch = root.path().join(format!("batch{}", i));
        fs::create_dir_all(&batch).unwrap();
        create_library(&batch);
    }
    let mut db = Database::open_in_memory().unwrap();
    load_folder(&mut db, root.path(), &LoadOptions::default(), &SilentReporter).unwrap();
    fs::remove_file(root.path().join("batch0").join("other.png")).unwrap();
    fs::remove_file(root.path().join("batch3").join("clip.mp4")).unwrap();

    let config = AppConfig {
        hash_workers: 4,
        ..Default::default()
    };
    let request = HashRequest {
        sha: true,
        difference: true,
        ..Default::default()
    };
    let first = run_hash_pass(&mut db, &request, &config, &SilentReporter, false).unwrap();
    assert_eq!(first.candidates, 36);
    assert_eq!(first.failed, 2);
    assert_eq!(first.invalid, 12);
    assert_eq!(
        first.processed + first.dropped + first.invalid + first.failed,
        first.candidates
    );

    // Invalid records and videos come back as drops; the two missing files fail again.
    let widened = HashRequest {
        average: true,
        ..request
    };
    let second = run_hash_pass(&mut db, &widened, &config, &SilentReporter, false).unwrap();
    assert_eq!(second.candidates, 36);
    assert_eq!(second.failed, 2);
    assert_eq!(second.processed, 17);
    assert_eq!(second.dropped, 17);
    assert_eq!(
        second.processed + second.dropped + second.invalid + second.failed,
        second.candidates
    );
}
