/// Trait for reporting progress of long running passes.
///
/// CLI implements with indicatif. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self) {}
    fn on_scan_progress(&self, _files_found: usize) {}
    fn on_scan_complete(&self, _inserted: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _total_records: usize) {}
    fn on_hash_progress(&self, _records_done: usize, _total_records: usize) {}
    fn on_hash_complete(&self, _processed: usize, _dropped: usize, _duration_secs: f64) {}
    fn on_db_write_start(&self) {}
    fn on_db_write_complete(&self, _rows: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
