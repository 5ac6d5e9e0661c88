use super::dhash::difference_hash_image;
use super::digest::sha256_file;
use super::normalize::{load_oriented, NormalizeError};
use super::perceptual::LibraryHashers;
use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::scanner::media_type::{classify, is_hashable, supports_perceptual};
use crate::storage::{Database, FingerprintKind, FingerprintUpdate, MediaFile, MediaGroup};
use dashmap::DashMap;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::fmt;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Files above this size are never decoded for perceptual hashing.
pub const PERCEPTUAL_SIZE_LIMIT: i64 = 71_000_000;

const PROGRESS_INTERVAL: usize = 1000;

/// Which fingerprint kinds a pass should fill in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashRequest {
    pub sha: bool,
    pub average: bool,
    pub difference: bool,
    pub perceptual: bool,
}

impl HashRequest {
    pub fn all() -> Self {
        Self {
            sha: true,
            average: true,
            difference: true,
            perceptual: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    pub fn wants(&self, kind: FingerprintKind) -> bool {
        match kind {
            FingerprintKind::Sha => self.sha,
            FingerprintKind::Average => self.average,
            FingerprintKind::Difference => self.difference,
            FingerprintKind::Perceptual => self.perceptual,
        }
    }

    pub fn kinds(&self) -> Vec<FingerprintKind> {
        FingerprintKind::ALL
            .into_iter()
            .filter(|kind| self.wants(*kind))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownGroup,
    MarkedInvalid,
    NotHashable,
    TooLargeForPerceptual,
    NothingToDo,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::UnknownGroup => "unknown media group",
            DropReason::MarkedInvalid => "marked invalid by an earlier pass",
            DropReason::NotHashable => "extension not hashable",
            DropReason::TooLargeForPerceptual => "too large for perceptual hashing",
            DropReason::NothingToDo => "no requested hash applies",
        };
        f.write_str(text)
    }
}

/// Work a record qualifies for in this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPlan {
    pub digest: bool,
    pub perceptual: Vec<FingerprintKind>,
    /// Perceptual kinds were wanted but the file is over the size limit.
    pub oversize: bool,
}

/// Decide what to compute for one record. Pure; touches neither the store nor the file.
pub fn plan_record(record: &MediaFile, request: &HashRequest) -> Result<WorkPlan, DropReason> {
    if record.group() == MediaGroup::Unknown {
        return Err(DropReason::UnknownGroup);
    }
    if record.is_marked_invalid() {
        return Err(DropReason::MarkedInvalid);
    }
    if !is_hashable(&record.file_ext) {
        return Err(DropReason::NotHashable);
    }

    let digest = request.sha && !record.has_fingerprint(FingerprintKind::Sha);
    let mut perceptual: Vec<FingerprintKind> = if supports_perceptual(&record.file_ext) {
        FingerprintKind::ALL
            .into_iter()
            .filter(|kind| kind.is_perceptual())
            .filter(|kind| request.wants(*kind) && !record.has_fingerprint(*kind))
            .collect()
    } else {
        Vec::new()
    };

    let oversize = !perceptual.is_empty() && record.file_size > PERCEPTUAL_SIZE_LIMIT;
    if oversize {
        perceptual.clear();
    }

    if !digest && perceptual.is_empty() {
        return Err(if oversize {
            DropReason::TooLargeForPerceptual
        } else {
            DropReason::NothingToDo
        });
    }
    Ok(WorkPlan {
        digest,
        perceptual,
        oversize,
    })
}

/// Count one processed or dropped record. Returns the new count when it lands
/// on a progress milestone; invalid and failed records never reach this.
fn settle(counter: &AtomicUsize) -> Option<usize> {
    let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
    (count % PROGRESS_INTERVAL == 0).then_some(count)
}

enum RecordOutcome {
    Hashed(FingerprintUpdate),
    /// Decoding failed for good; the update carries the sticky verdict.
    Invalid(FingerprintUpdate, NormalizeError),
    /// Transient failure; nothing is staged.
    Failed(String),
}

fn hash_record(record: &MediaFile, plan: &WorkPlan, hashers: &LibraryHashers) -> RecordOutcome {
    let path = record.full_path();
    let mut update = FingerprintUpdate::default();

    if plan.digest {
        match sha256_file(&path) {
            Ok(digest) => update.sha = Some(digest),
            Err(err) => return RecordOutcome::Failed(format!("{}: {}", path.display(), err)),
        }
    }

    if plan.perceptual.is_empty() {
        return RecordOutcome::Hashed(update);
    }

    let decoded = fs::read(&path)
        .map_err(NormalizeError::from)
        .and_then(|bytes| load_oriented(&bytes));
    let img = match decoded {
        Ok(img) => img,
        Err(NormalizeError::Io(err)) => {
            return RecordOutcome::Failed(format!("{}: {}", path.display(), err))
        }
        Err(err @ NormalizeError::UnknownFormat) => {
            update.media_group = Some(MediaGroup::Unknown.as_str().to_string());
            update.format_valid = Some(false);
            return RecordOutcome::Invalid(update, err);
        }
        Err(err) => {
            update.format_valid = Some(false);
            return RecordOutcome::Invalid(update, err);
        }
    };

    for kind in &plan.perceptual {
        let hash = match kind {
            FingerprintKind::Average => hashers.average_hash(&img),
            FingerprintKind::Difference => difference_hash_image(&img),
            FingerprintKind::Perceptual => hashers.perceptual_hash(&img),
            FingerprintKind::Sha => continue,
        };
        update.set_hash(*kind, hash);
    }
    update.format_valid = Some(true);
    RecordOutcome::Hashed(update)
}

#[derive(Debug, Clone, Default)]
pub struct HashPassSummary {
    /// Records in the snapshot taken at the start of the pass.
    pub candidates: usize,
    pub processed: usize,
    pub dropped: usize,
    /// Records newly marked as undecodable.
    pub invalid: usize,
    /// Records skipped because of a transient error.
    pub failed: usize,
    pub written: usize,
    pub elapsed: Duration,
}

/// Fill in the requested fingerprints for every record still missing one.
///
/// Records are read once up front; rows created while the pass runs are not
/// seen. Updates are staged in memory and committed in one transaction at the end.
pub fn run_hash_pass(
    db: &mut Database,
    request: &HashRequest,
    config: &AppConfig,
    reporter: &dyn ProgressReporter,
    verbose: bool,
) -> Result<HashPassSummary, Error> {
    if request.is_empty() {
        return Err(Error::Usage(
            "at least one of --sha, --average, --difference, --perceptual is required".to_string(),
        ));
    }
    let start = Instant::now();
    let kinds = request.kinds();
    let snapshot = db.find_missing_any(&kinds)?;
    let total = snapshot.len();
    info!("Hash pass: {} records missing one of {:?}", total, kinds);
    reporter.on_hash_start(total);

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.hash_workers)
        .build()
        .map_err(|e| Error::Other(format!("failed to build hash worker pool: {}", e)))?;

    let staged: DashMap<i32, FingerprintUpdate> = DashMap::new();
    let processed = AtomicUsize::new(0);
    let dropped = AtomicUsize::new(0);
    let invalid = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let settled = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let log_progress = |count: usize| {
        info!(
            "Hash pass progress: {} of {} records processed or dropped ({} processed, {} dropped)",
            count,
            total,
            processed.load(Ordering::Relaxed),
            dropped.load(Ordering::Relaxed)
        );
    };

    pool.install(|| {
        snapshot
            .par_iter()
            .for_each_init(LibraryHashers::new, |hashers, record| {
                match plan_record(record, request) {
                    Err(reason) => {
                        dropped.fetch_add(1, Ordering::Relaxed);
                        if let Some(count) = settle(&settled) {
                            log_progress(count);
                        }
                        if verbose {
                            info!("Dropped {} ({})", record.full_path().display(), reason);
                        } else {
                            debug!("Dropped {} ({})", record.full_path().display(), reason);
                        }
                    }
                    Ok(plan) => {
                        if plan.oversize {
                            info!(
                                "{} is {} bytes, skipping perceptual hashes",
                                record.full_path().display(),
                                record.file_size
                            );
                        }
                        match hash_record(record, &plan, hashers) {
                            RecordOutcome::Hashed(update) => {
                                staged.insert(record.id, update);
                                processed.fetch_add(1, Ordering::Relaxed);
                                if let Some(count) = settle(&settled) {
                                    log_progress(count);
                                }
                                if verbose {
                                    info!("Hashed {}", record.full_path().display());
                                }
                            }
                            RecordOutcome::Invalid(update, err) => {
                                warn!("{} marked invalid: {}", record.full_path().display(), err);
                                staged.insert(record.id, update);
                                invalid.fetch_add(1, Ordering::Relaxed);
                            }
                            RecordOutcome::Failed(message) => {
                                error!("Hash failed for record {}: {}", record.id, message);
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_hash_progress(done, total);
            });
    });

    let mut summary = HashPassSummary {
        candidates: total,
        processed: processed.into_inner(),
        dropped: dropped.into_inner(),
        invalid: invalid.into_inner(),
        failed: failed.into_inner(),
        ..Default::default()
    };
    reporter.on_hash_complete(
        summary.processed,
        summary.dropped,
        start.elapsed().as_secs_f64(),
    );

    let mut updates: Vec<(i32, FingerprintUpdate)> = staged.into_iter().collect();
    updates.sort_by_key(|(id, _)| *id);

    reporter.on_db_write_start();
    let write_start = Instant::now();
    summary.written = db.apply_updates(&updates)?;
    reporter.on_db_write_complete(summary.written, write_start.elapsed().as_secs_f64());

    summary.elapsed = start.elapsed();
    info!(
        "Hash pass done: processed {}, dropped {}, invalid {}, failed {}, written {} in {:.2?}",
        summary.processed,
        summary.dropped,
        summary.invalid,
        summary.failed,
        summary.written,
        summary.elapsed
    );
    Ok(summary)
}

/// Give records marked undecodable another chance on the next hash pass. The
/// media group is restored from the extension. Returns the number of records reset.
pub fn clear_invalid(db: &mut Database) -> Result<usize, Error> {
    let invalid = db.find_invalid()?;
    for record in &invalid {
        db.reset_validity(record.id, classify(&record.file_ext))?;
        debug!("Cleared invalid mark on {}", record.full_path().display());
    }
    info!("Cleared {} invalid records", invalid.len());
    Ok(invalid.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ext: &str, group: &str, size: i64) -> MediaFile {
        MediaFile {
            id: 1,
            folder: "/photos".to_string(),
            file_name: format!("img{}", ext.to_lowercase()),
            file_ext: ext.to_string(),
            media_group: group.to_string(),
            file_size: size,
            file_created: None,
            content_created: None,
            content_created_raw: None,
            sha: None,
            average_hash: None,
            difference_hash: None,
            perceptual_hash: None,
            format_valid: None,
        }
    }

    #[test]
    fn test_request_kinds() {
        let request = HashRequest {
            sha: true,
            difference: true,
            ..Default::default()
        };
        assert_eq!(
            request.kinds(),
            vec![FingerprintKind::Sha, FingerprintKind::Difference]
        );
        assert!(HashRequest::default().is_empty());
        assert_eq!(HashRequest::all().kinds().len(), 4);
    }

    #[test]
    fn test_settle_reports_every_interval() {
        let counter = AtomicUsize::new(0);
        let milestones: Vec<usize> = (0..PROGRESS_INTERVAL * 2 + 5)
            .filter_map(|_| settle(&counter))
            .collect();
        assert_eq!(milestones, vec![PROGRESS_INTERVAL, PROGRESS_INTERVAL * 2]);
        assert_eq!(counter.into_inner(), PROGRESS_INTERVAL * 2 + 5);
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let request = HashRequest::all();
        let at_limit = plan_record(&record(".JPG", "Photo", 71_000_000), &request).unwrap();
        assert!(at_limit.digest);
        assert_eq!(at_limit.perceptual.len(), 3);
        assert!(!at_limit.oversize);

        let over = plan_record(&record(".JPG", "Photo", 71_000_001), &request).unwrap();
        assert!(over.digest);
        assert!(over.perceptual.is_empty());
        assert!(over.oversize);
    }

    #[test]
    fn test_oversize_without_digest_is_dropped() {
        let request = HashRequest {
            difference: true,
            ..Default::default()
        };
        assert_eq!(
            plan_record(&record(".PNG", "Photo", 71_000_001), &request),
            Err(DropReason::TooLargeForPerceptual)
        );
    }

    #[test]
    fn test_eligibility_table() {
        let request = HashRequest::all();
        assert_eq!(
            plan_record(&record(".JPG", "Unknown", 10), &request),
            Err(DropReason::UnknownGroup)
        );
        assert_eq!(
            plan_record(&record(".PSD", "Photo", 10), &request),
            Err(DropReason::NotHashable)
        );

        let mut invalid = record(".JPG", "Photo", 10);
        invalid.format_valid = Some(false);
        assert_eq!(plan_record(&invalid, &request), Err(DropReason::MarkedInvalid));

        let video = plan_record(&record(".MP4", "Video", 10), &request).unwrap();
        assert!(video.digest);
        assert!(video.perceptual.is_empty());
    }

    #[test]
    fn test_video_without_digest_request_has_nothing_to_do() {
        let request = HashRequest {
            average: true,
            ..Default::default()
        };
        assert_eq!(
            plan_record(&record(".MOV", "Video", 10), &request),
            Err(DropReason::NothingToDo)
        );
    }

    #[test]
    fn test_existing_fingerprints_are_not_recomputed() {
        let mut done = record(".JPG", "Photo", 10);
        done.sha = Some("AB".to_string());
        done.average_hash = Some(1);
        let plan = plan_record(&done, &HashRequest::all()).unwrap();
        assert!(!plan.digest);
        assert_eq!(
            plan.perceptual,
            vec![FingerprintKind::Difference, FingerprintKind::Perceptual]
        );
    }

    #[test]
    fn test_empty_request_is_usage_error() {
        let mut db = Database::open_in_memory().unwrap();
        let result = run_hash_pass(
            &mut db,
            &HashRequest::default(),
            &AppConfig::default(),
            &crate::progress::SilentReporter,
            false,
        );
        assert!(matches!(result, Err(Error::Usage(_))));
    }
}
