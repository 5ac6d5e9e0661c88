use super::media_type::{classify, normalized_extension};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::queries::split_path;
use crate::storage::{Database, MediaGroup, NewMediaFile};
use chrono::{DateTime, Local, NaiveDateTime};
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Only keep files of this group. `None` keeps photos and videos.
    pub media_group: Option<MediaGroup>,
    /// Truncate the store before loading.
    pub replace: bool,
    pub ignore_patterns: Vec<String>,
    pub verbose: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub found: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub elapsed: Duration,
}

fn compile_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

fn to_naive_local(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

/// Build the record for one file. Birth time is used when the platform has
/// one, modification time otherwise.
fn describe_file(path: &Path, media_group: MediaGroup, ext: String) -> Option<NewMediaFile> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("Error getting metadata for {}: {}", path.display(), err);
            return None;
        }
    };
    let (folder, file_name) = split_path(path)?;
    let file_created = metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(to_naive_local);
    Some(NewMediaFile {
        folder,
        file_name,
        file_ext: ext,
        media_group: media_group.as_str().to_string(),
        file_size: metadata.len() as i64,
        file_created,
        content_created: None,
        content_created_raw: None,
    })
}

/// Absolute, symlink-free form of `folder`. Records are keyed on this form, so
/// `lib`, `./lib` and `/home/me/lib` all land on the same rows.
pub fn resolve_folder(folder: &Path) -> Result<PathBuf, Error> {
    let resolved = fs::canonicalize(folder).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => {
            Error::NotFound(format!("folder {} does not exist", folder.display()))
        }
        _ => Error::Io(err),
    })?;
    if !resolved.is_dir() {
        return Err(Error::NotFound(format!(
            "{} is not a folder",
            folder.display()
        )));
    }
    Ok(resolved)
}

/// Walk `folder` and create a record for every recognised media file not
/// already in the store.
pub fn load_folder(
    db: &mut Database,
    folder: &Path,
    options: &LoadOptions,
    reporter: &dyn ProgressReporter,
) -> Result<LoadSummary, Error> {
    let root = resolve_folder(folder)?;
    let folder = root.as_path();
    let start = Instant::now();
    reporter.on_scan_start();

    if options.replace {
        db.truncate_all()?;
        info!("Store truncated before load");
    }

    let ignore_patterns = compile_patterns(&options.ignore_patterns);
    let mut summary = LoadSummary::default();
    let mut candidates: Vec<(PathBuf, MediaGroup, String)> = Vec::new();

    let walker = WalkDir::new(folder)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(entry.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!("Error walking {}: {}", folder.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        summary.found += 1;
        if summary.found % 1000 == 0 {
            reporter.on_scan_progress(summary.found);
        }

        let path = entry.into_path();
        let Some(ext) = normalized_extension(&path) else {
            summary.dropped += 1;
            continue;
        };
        let group = classify(&ext);
        let wanted = match options.media_group {
            Some(filter) => group == filter,
            None => group != MediaGroup::Unknown,
        };
        if !wanted {
            if options.verbose {
                info!("Dropped {}", path.display());
            } else {
                debug!("Dropped {}", path.display());
            }
            summary.dropped += 1;
            continue;
        }
        candidates.push((path, group, ext));
    }

    let candidate_count = candidates.len();
    let new_files: Vec<NewMediaFile> = candidates
        .into_par_iter()
        .filter_map(|(path, group, ext)| describe_file(&path, group, ext))
        .collect();
    // Files whose metadata could not be read.
    summary.dropped += candidate_count - new_files.len();

    reporter.on_db_write_start();
    let write_start = Instant::now();
    summary.inserted = db.insert_new_files(&new_files)?;
    summary.skipped = new_files.len() - summary.inserted;
    reporter.on_db_write_complete(summary.inserted, write_start.elapsed().as_secs_f64());

    summary.elapsed = start.elapsed();
    reporter.on_scan_complete(summary.inserted, summary.elapsed.as_secs_f64());
    info!(
        "Loaded {}: found {}, inserted {}, skipped {}, dropped {} in {:.2?}",
        folder.display(),
        summary.found,
        summary.inserted,
        summary.skipped,
        summary.dropped,
        summary.elapsed
    );
    Ok(summary)
}
