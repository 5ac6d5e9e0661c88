use super::exif::extract_creation_timestamp;
use crate::analysis::resolver::move_file;
use crate::error::Error;
use crate::scanner::resolve_folder;
use crate::storage::queries::split_path;
use crate::storage::{Database, MediaFile, MediaGroup};
use chrono::{Datelike, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct OrganizeSummary {
    pub examined: usize,
    pub moved: usize,
    /// No usable date, destination taken, or the move failed.
    pub dropped: usize,
    pub elapsed: Duration,
}

/// `<target_root>/<year>/<month>/<file_name>`, month zero-padded.
pub fn dated_destination(target_root: &Path, taken: &NaiveDateTime, file_name: &str) -> PathBuf {
    target_root
        .join(format!("{:04}", taken.year()))
        .join(format!("{:02}", taken.month()))
        .join(file_name)
}

/// Stored creation time, or a fresh EXIF read that is saved on the record.
fn creation_time(db: &mut Database, record: &MediaFile) -> Result<Option<NaiveDateTime>, Error> {
    if let Some(stored) = record.content_created {
        return Ok(Some(stored));
    }
    let timestamp = extract_creation_timestamp(&record.full_path());
    db.set_content_created(record.id, timestamp.parsed, &timestamp.raw)?;
    Ok(timestamp.parsed)
}

/// Move the photos stored directly in `folder` into a year/month tree under
/// `target_root`, following each move in the database. Photos without a
/// creation date stay where they are. Videos are not touched.
pub fn organize_by_date(
    db: &mut Database,
    folder: &Path,
    target_root: &Path,
    verbose: bool,
) -> Result<OrganizeSummary, Error> {
    let start = Instant::now();
    let source = resolve_folder(folder)?;
    fs::create_dir_all(target_root)?;
    let target_root = resolve_folder(target_root)?;
    let source_folder = source.to_string_lossy().into_owned();

    let photos: Vec<MediaFile> = db
        .find_by_folder_prefix(&source_folder)?
        .into_iter()
        .filter(|record| record.folder == source_folder)
        .filter(|record| record.group() == MediaGroup::Photo)
        .collect();
    let mut summary = OrganizeSummary {
        examined: photos.len(),
        ..Default::default()
    };
    if photos.is_empty() {
        warn!("No photo records in {}", source.display());
        return Ok(summary);
    }
    info!("Organizing {} photos from {}", photos.len(), source.display());

    for record in &photos {
        let current = record.full_path();
        let Some(taken) = creation_time(db, record)? else {
            warn!("No creation date for record {}, {}", record.id, current.display());
            summary.dropped += 1;
            continue;
        };

        let destination = dated_destination(&target_root, &taken, &record.file_name);
        if destination.exists() {
            warn!(
                "{} already exists, leaving record {} in place",
                destination.display(),
                record.id
            );
            summary.dropped += 1;
            continue;
        }
        let moved = destination
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| move_file(&current, &destination));
        if let Err(err) = moved {
            error!(
                "Moving record {} from {} to {} failed: {}",
                record.id,
                current.display(),
                destination.display(),
                err
            );
            summary.dropped += 1;
            continue;
        }

        let Some((new_folder, file_name)) = split_path(&destination) else {
            return Err(Error::Other(format!(
                "bad destination path {}",
                destination.display()
            )));
        };
        db.update_location(record.id, &new_folder, &file_name)?;
        summary.moved += 1;
        if verbose {
            info!("Moved {} -> {}", current.display(), destination.display());
        }
    }

    summary.elapsed = start.elapsed();
    info!(
        "Organize: examined {}, moved {}, dropped {} in {:.2?}",
        summary.examined, summary.moved, summary.dropped, summary.elapsed
    );
    Ok(summary)
}
