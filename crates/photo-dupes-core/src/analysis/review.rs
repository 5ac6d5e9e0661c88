use super::grouper::find_duplicate_groups;
use super::resolver::{delete_member, MemberOutcome, ResolveSummary};
use crate::error::Error;
use crate::storage::{Database, FingerprintKind, MediaFile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{info, warn};

pub const REVIEW_HEADER: [&str; 6] = [
    "HashValue",
    "RecordId1",
    "Filename1",
    "RecordId2",
    "Filename2",
    "ToDelete",
];

/// One exported pair of byte-identical files. `to_delete` is filled in by the
/// reviewer with `1` or `2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReviewRow {
    pub hash_value: String,
    pub record_id1: i32,
    pub filename1: String,
    pub record_id2: i32,
    pub filename2: String,
    pub to_delete: String,
}

/// A validated row: which record goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    pub line: u64,
    pub delete_id: i32,
}

/// Write one row per sha group with exactly two members.
pub fn export_pairs<W: io::Write>(db: &mut Database, writer: W) -> Result<usize, Error> {
    let groups = find_duplicate_groups(db, FingerprintKind::Sha, None)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for group in groups.iter().filter(|g| g.members.len() == 2) {
        let (first, second) = (&group.members[0], &group.members[1]);
        csv_writer.serialize(ReviewRow {
            hash_value: group.value.to_string(),
            record_id1: first.id,
            filename1: first.full_path().to_string_lossy().into_owned(),
            record_id2: second.id,
            filename2: second.full_path().to_string_lossy().into_owned(),
            to_delete: String::new(),
        })?;
        rows += 1;
    }
    if rows == 0 {
        csv_writer.write_record(REVIEW_HEADER)?;
    }
    csv_writer.flush()?;
    info!("Exported {} duplicate pairs for review", rows);
    Ok(rows)
}

pub fn export_pairs_to_path(db: &mut Database, path: &Path) -> Result<usize, Error> {
    export_pairs(db, File::create(path)?)
}

fn parse_id(field: &str, line: u64, column: &str) -> Result<i32, Error> {
    field.trim().parse::<i32>().map_err(|_| {
        Error::Usage(format!(
            "line {}: {} '{}' is not a record id",
            line, column, field
        ))
    })
}

/// Check every row before anything is touched. Any malformed row, or a record
/// marked for deletion on more than one row, fails the whole file.
pub fn parse_decisions<R: io::Read>(reader: R) -> Result<Vec<ReviewDecision>, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut decisions = Vec::new();
    let mut first_seen: HashMap<i32, u64> = HashMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != REVIEW_HEADER.len() {
            return Err(Error::Usage(format!(
                "line {}: expected {} fields, found {}",
                line,
                REVIEW_HEADER.len(),
                record.len()
            )));
        }
        let id1 = parse_id(&record[1], line, "RecordId1")?;
        let id2 = parse_id(&record[3], line, "RecordId2")?;
        let delete_id = match record[5].trim() {
            "1" => id1,
            "2" => id2,
            other => {
                return Err(Error::Usage(format!(
                    "line {}: ToDelete must be 1 or 2, found '{}'",
                    line, other
                )))
            }
        };
        if let Some(earlier) = first_seen.insert(delete_id, line) {
            return Err(Error::Usage(format!(
                "line {}: record {} is already marked for deletion on line {}",
                line, delete_id, earlier
            )));
        }
        decisions.push(ReviewDecision { line, delete_id });
    }
    Ok(decisions)
}

/// Apply reviewed decisions: each row removes one file and its record.
/// Every row and every referenced record is validated first.
pub fn import_decisions<R: io::Read>(
    db: &mut Database,
    reader: R,
    verbose: bool,
) -> Result<ResolveSummary, Error> {
    let decisions = parse_decisions(reader)?;

    let mut targets: Vec<MediaFile> = Vec::with_capacity(decisions.len());
    for decision in &decisions {
        match db.find_by_id(decision.delete_id)? {
            Some(record) => targets.push(record),
            None => {
                return Err(Error::Usage(format!(
                    "line {}: record {} does not exist",
                    decision.line, decision.delete_id
                )))
            }
        }
    }

    let mut summary = ResolveSummary {
        groups: targets.len(),
        ..Default::default()
    };
    for record in targets {
        let path = record.full_path();
        let outcome = if path.exists() {
            delete_member(db, &record)?
        } else {
            warn!("{} is already gone, removing its record", path.display());
            if db.delete(record.id)? {
                MemberOutcome::Deleted
            } else {
                MemberOutcome::DeleteFailed(format!("record {} was already removed", record.id))
            }
        };
        if outcome == MemberOutcome::Deleted {
            summary.reclaimed_bytes += record.file_size;
            if verbose {
                info!("Deleted {}", path.display());
            }
        }
        summary.record(record.id, outcome);
    }

    info!(
        "Review import: {} deleted, {} failed",
        summary.deleted, summary.delete_failed
    );
    Ok(summary)
}

pub fn import_decisions_from_path(
    db: &mut Database,
    path: &Path,
    verbose: bool,
) -> Result<ResolveSummary, Error> {
    import_decisions(db, File::open(path)?, verbose)
}
