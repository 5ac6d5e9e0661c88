use super::grouper::{find_duplicate_groups, in_scope, select_keep_largest, DuplicateGroup};
use crate::config::AppConfig;
use crate::error::Error;
use crate::scanner::resolve_folder;
use crate::storage::queries::split_path;
use crate::storage::{Database, FingerprintKind, MediaFile};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// What happened to one group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberOutcome {
    Kept,
    Moved(PathBuf),
    MoveFailed(String),
    Deleted,
    DeleteFailed(String),
    /// Dry run: the member would have been deleted.
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveSummary {
    pub groups: usize,
    pub kept: usize,
    pub moved: usize,
    pub move_failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
    pub skipped: usize,
    pub reclaimed_bytes: i64,
    pub outcomes: Vec<(i32, MemberOutcome)>,
}

impl ResolveSummary {
    pub fn record(&mut self, record_id: i32, outcome: MemberOutcome) {
        match &outcome {
            MemberOutcome::Kept => self.kept += 1,
            MemberOutcome::Moved(_) => self.moved += 1,
            MemberOutcome::MoveFailed(_) => self.move_failed += 1,
            MemberOutcome::Deleted => self.deleted += 1,
            MemberOutcome::DeleteFailed(_) => self.delete_failed += 1,
            MemberOutcome::Skipped => self.skipped += 1,
        }
        self.outcomes.push((record_id, outcome));
    }

    pub fn outcome_of(&self, record_id: i32) -> Option<&MemberOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == record_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Pick a destination inside `target_dir`. A taken name gets the record id as prefix.
fn quarantine_destination(target_dir: &Path, record: &MediaFile) -> io::Result<PathBuf> {
    let plain = target_dir.join(&record.file_name);
    if !plain.exists() {
        return Ok(plain);
    }
    let prefixed = target_dir.join(format!("{}_{}", record.id, record.file_name));
    if !prefixed.exists() {
        return Ok(prefixed);
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already exists", prefixed.display()),
    ))
}

/// Rename, falling back to copy and remove when source and target sit on
/// different filesystems.
pub fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                "rename {} failed ({}), copying instead",
                source.display(),
                rename_err
            );
            fs::copy(source, destination)?;
            if let Err(err) = fs::remove_file(source) {
                let _ = fs::remove_file(destination);
                return Err(err);
            }
            Ok(())
        }
    }
}

fn quarantine_member(
    db: &mut Database,
    record: &MediaFile,
    target_dir: &Path,
) -> Result<MemberOutcome, Error> {
    let source = record.full_path();
    if !source.is_file() {
        return Ok(MemberOutcome::MoveFailed(format!(
            "{} does not exist",
            source.display()
        )));
    }
    let moved = fs::create_dir_all(target_dir)
        .and_then(|_| quarantine_destination(target_dir, record))
        .and_then(|destination| move_file(&source, &destination).map(|_| destination));
    let destination = match moved {
        Ok(destination) => destination,
        Err(err) => return Ok(MemberOutcome::MoveFailed(err.to_string())),
    };

    let Some((folder, file_name)) = split_path(&destination) else {
        return Err(Error::Other(format!(
            "bad quarantine path {}",
            destination.display()
        )));
    };
    db.update_location(record.id, &folder, &file_name)?;
    Ok(MemberOutcome::Moved(destination))
}

/// Absolute form of a configured root. The quarantine root is created when missing.
fn resolve_root(raw: &str, name: &str, create: bool) -> Result<PathBuf, Error> {
    if raw.is_empty() {
        return Err(Error::Usage(format!("{} is not configured", name)));
    }
    let path = Path::new(raw);
    if create {
        fs::create_dir_all(path)?;
    }
    resolve_folder(path).map_err(|err| match err {
        Error::NotFound(reason) => Error::Usage(format!("{}: {}", name, reason)),
        other => other,
    })
}

/// Move every non-kept member of each `kind` group under `managed_root` to
/// `quarantine_root/<value>/`. The database location follows each move.
///
/// Files already inside the quarantine root take no further part: they are
/// neither moved again nor chosen as the keep copy, so a second run only
/// retries members whose earlier move failed.
pub fn quarantine_duplicates(
    db: &mut Database,
    kind: FingerprintKind,
    config: &AppConfig,
    verbose: bool,
) -> Result<ResolveSummary, Error> {
    let managed_root = resolve_root(&config.managed_root, "managed_root", false)?;
    let quarantine_root = resolve_root(&config.quarantine_root, "quarantine_root", true)?;
    let managed = managed_root.to_string_lossy().into_owned();
    let quarantined = quarantine_root.to_string_lossy().into_owned();

    let all_groups = find_duplicate_groups(db, kind, None)?;
    if all_groups.is_empty() {
        return Err(Error::Usage(format!("no duplicate groups found by {}", kind)));
    }
    let groups: Vec<DuplicateGroup> = all_groups
        .into_iter()
        .filter_map(|mut group| {
            group.members.retain(|member| {
                in_scope(&member.folder, &managed) && !in_scope(&member.folder, &quarantined)
            });
            if group.members.len() < 2 {
                return None;
            }
            group.keep = select_keep_largest(&group.members);
            Some(group)
        })
        .collect();
    if groups.is_empty() {
        info!("Nothing left to move under {}", managed);
    }

    let mut summary = ResolveSummary {
        groups: groups.len(),
        ..Default::default()
    };

    for group in &groups {
        let target_dir = quarantine_root.join(group.value.to_string());
        summary.record(group.kept().id, MemberOutcome::Kept);
        for member in group.others() {
            let outcome = quarantine_member(db, member, &target_dir)?;
            match &outcome {
                MemberOutcome::Moved(destination) => {
                    summary.reclaimed_bytes += member.file_size;
                    if verbose {
                        info!(
                            "Moved {} -> {}",
                            member.full_path().display(),
                            destination.display()
                        );
                    } else {
                        debug!("Moved record {} to {}", member.id, destination.display());
                    }
                }
                MemberOutcome::MoveFailed(reason) => {
                    error!("Move failed for {}: {}", member.full_path().display(), reason);
                }
                _ => {}
            }
            summary.record(member.id, outcome);
        }
    }

    info!(
        "Quarantine by {}: {} groups, {} moved, {} failed",
        kind, summary.groups, summary.moved, summary.move_failed
    );
    Ok(summary)
}

/// Longest file name wins; equal lengths go to the earliest record.
pub fn select_keep_longest_name(members: &[MediaFile]) -> usize {
    let mut keep = 0;
    for (i, member) in members.iter().enumerate() {
        let current = &members[keep];
        let longer = member.file_name.chars().count() > current.file_name.chars().count();
        let tie_earlier = member.file_name.chars().count() == current.file_name.chars().count()
            && member.id < current.id;
        if longer || tie_earlier {
            keep = i;
        }
    }
    keep
}

/// Remove one member's file and then its record.
pub fn delete_member(db: &mut Database, record: &MediaFile) -> Result<MemberOutcome, Error> {
    let path = record.full_path();
    if !path.is_file() {
        return Ok(MemberOutcome::DeleteFailed(format!(
            "{} does not exist",
            path.display()
        )));
    }
    if let Err(err) = fs::remove_file(&path) {
        return Ok(MemberOutcome::DeleteFailed(err.to_string()));
    }
    db.delete(record.id)?;
    Ok(MemberOutcome::Deleted)
}

/// Delete all but one copy of each byte-identical group. With `dry_run`
/// nothing is touched and the would-be deletions are reported as skipped.
pub fn delete_exact_duplicates(
    db: &mut Database,
    kind: FingerprintKind,
    dry_run: bool,
    verbose: bool,
) -> Result<ResolveSummary, Error> {
    if kind.is_perceptual() {
        return Err(Error::Usage(format!(
            "{} hashes only find similar images; delete works on sha groups",
            kind
        )));
    }
    let mut groups: Vec<DuplicateGroup> = find_duplicate_groups(db, kind, None)?;
    if groups.is_empty() {
        return Err(Error::Usage(format!("no duplicate groups found by {}", kind)));
    }

    let mut summary = ResolveSummary {
        groups: groups.len(),
        ..Default::default()
    };
    for group in &mut groups {
        group.keep = select_keep_longest_name(&group.members);
        summary.record(group.kept().id, MemberOutcome::Kept);
        for member in group.others() {
            let outcome = if dry_run {
                info!("Would delete {}", member.full_path().display());
                MemberOutcome::Skipped
            } else {
                delete_member(db, member)?
            };
            match &outcome {
                MemberOutcome::Deleted => {
                    summary.reclaimed_bytes += member.file_size;
                    if verbose {
                        info!("Deleted {}", member.full_path().display());
                    }
                }
                MemberOutcome::DeleteFailed(reason) => {
                    warn!("Delete failed for record {}: {}", member.id, reason);
                }
                _ => {}
            }
            summary.record(member.id, outcome);
        }
    }

    info!(
        "Delete by {}{}: {} groups, {} deleted, {} failed, {} skipped",
        kind,
        if dry_run { " (dry run)" } else { "" },
        summary.groups,
        summary.deleted,
        summary.delete_failed,
        summary.skipped
    );
    Ok(summary)
}
