use crate::error::Error;
use crate::scanner::resolve_folder;
use crate::storage::{Database, MediaGroup};
use ::exif::{Exif, In, Reader, Tag, Value};
use chrono::NaiveDateTime;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

pub const DATE_NOT_FOUND: &str = "Date not found";
pub const NOT_VALID_IMAGE: &str = "Not valid image";
pub const READ_ERROR: &str = "ERROR - see log";

/// Creation time read from EXIF. `raw` is always set: either the tag text or
/// one of the diagnostics above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationTimestamp {
    pub parsed: Option<NaiveDateTime>,
    pub raw: String,
}

impl CreationTimestamp {
    fn diagnostic(raw: &str) -> Self {
        Self {
            parsed: None,
            raw: raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub ifd: String,
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExifSummary {
    pub examined: usize,
    pub dated: usize,
    pub undated: usize,
    pub elapsed: Duration,
}

fn read_exif(path: &Path) -> Result<Exif, ::exif::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Reader::new().read_from_container(&mut reader)
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    }
}

/// EXIF stores `YYYY:MM:DD HH:MM:SS`. All-zero dates are treated as absent.
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Read `DateTimeOriginal`, falling back to `DateTime`. Never fails; problems
/// are reported through `raw`.
pub fn extract_creation_timestamp(path: &Path) -> CreationTimestamp {
    let exif = match read_exif(path) {
        Ok(exif) => exif,
        Err(::exif::Error::NotFound(_)) => return CreationTimestamp::diagnostic(DATE_NOT_FOUND),
        Err(::exif::Error::Io(err)) => {
            error!("Error reading {}: {}", path.display(), err);
            return CreationTimestamp::diagnostic(READ_ERROR);
        }
        Err(err) => {
            debug!("No EXIF container in {}: {}", path.display(), err);
            return CreationTimestamp::diagnostic(NOT_VALID_IMAGE);
        }
    };

    let raw = [Tag::DateTimeOriginal, Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, In::PRIMARY))
        .find_map(|field| ascii_value(&field.value));

    match raw {
        Some(raw) => CreationTimestamp {
            parsed: parse_exif_datetime(&raw),
            raw,
        },
        None => CreationTimestamp::diagnostic(DATE_NOT_FOUND),
    }
}

/// Extract creation timestamps for photo records below `folder_prefix`.
/// Records that already carry a raw value are left alone unless `replace`.
/// An empty prefix covers the whole store; any other prefix must be an
/// existing folder and is resolved to its absolute form first.
pub fn fill_creation_timestamps(
    db: &mut Database,
    folder_prefix: &str,
    replace: bool,
    verbose: bool,
) -> Result<ExifSummary, Error> {
    let start = Instant::now();
    let prefix = if folder_prefix.is_empty() {
        String::new()
    } else {
        resolve_folder(Path::new(folder_prefix))?
            .to_string_lossy()
            .into_owned()
    };
    let pending: Vec<(i32, PathBuf)> = db
        .find_by_folder_prefix(&prefix)?
        .into_iter()
        .filter(|record| record.group() == MediaGroup::Photo)
        .filter(|record| replace || record.content_created_raw.is_none())
        .map(|record| (record.id, record.full_path()))
        .collect();

    let extracted: Vec<(i32, PathBuf, CreationTimestamp)> = pending
        .into_par_iter()
        .map(|(id, path)| {
            let timestamp = extract_creation_timestamp(&path);
            (id, path, timestamp)
        })
        .collect();

    let mut summary = ExifSummary::default();
    for (id, path, timestamp) in extracted {
        db.set_content_created(id, timestamp.parsed, &timestamp.raw)?;
        summary.examined += 1;
        if timestamp.parsed.is_some() {
            summary.dated += 1;
        } else {
            summary.undated += 1;
        }
        if verbose {
            info!("{} -> {}", path.display(), timestamp.raw);
        } else {
            debug!("{} -> {}", path.display(), timestamp.raw);
        }
    }

    summary.elapsed = start.elapsed();
    info!(
        "EXIF pass: examined {}, dated {}, undated {} in {:.2?}",
        summary.examined, summary.dated, summary.undated, summary.elapsed
    );
    Ok(summary)
}

/// Every EXIF field in the file, in directory order.
pub fn dump_metadata(path: &Path) -> Result<Vec<MetadataEntry>, Error> {
    let exif = read_exif(path)?;
    Ok(exif
        .fields()
        .map(|field| MetadataEntry {
            ifd: field.ifd_num.to_string(),
            tag: field.tag.to_string(),
            value: field.display_value().with_unit(&exif).to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_exif_datetime() {
        let parsed = parse_exif_datetime("2019:06:01 12:30:45").unwrap();
        assert_eq!(parsed.to_string(), "2019-06-01 12:30:45");
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
        assert_eq!(parse_exif_datetime("garbage"), None);
    }

    #[test]
    fn test_non_image_reports_not_valid() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"plain text, no container here").unwrap();
        let timestamp = extract_creation_timestamp(file.path());
        assert_eq!(timestamp.parsed, None);
        assert_eq!(timestamp.raw, NOT_VALID_IMAGE);
    }

    #[test]
    fn test_prefix_is_resolved_before_matching() {
        use crate::storage::NewMediaFile;

        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        std::fs::create_dir(&lib).unwrap();
        std::fs::write(lib.join("a.jpg"), b"no exif in here").unwrap();

        let mut db = Database::open_in_memory().unwrap();
        db.upsert_by_path(&NewMediaFile {
            folder: lib.canonicalize().unwrap().to_string_lossy().into_owned(),
            file_name: "a.jpg".to_string(),
            file_ext: ".JPG".to_string(),
            media_group: "Photo".to_string(),
            file_size: 15,
            file_created: None,
            content_created: None,
            content_created_raw: None,
        })
        .unwrap();

        let roundabout = lib.join(".").to_string_lossy().into_owned();
        let summary = fill_creation_timestamps(&mut db, &roundabout, false, false).unwrap();
        assert_eq!(summary.examined, 1);
        assert_eq!(summary.undated, 1);

        let missing = dir.path().join("nope").to_string_lossy().into_owned();
        assert!(matches!(
            fill_creation_timestamps(&mut db, &missing, false, false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_file_never_panics() {
        let timestamp = extract_creation_timestamp(Path::new("/no/such/file.jpg"));
        assert_eq!(timestamp.parsed, None);
        assert_eq!(timestamp.raw, READ_ERROR);
    }
}
