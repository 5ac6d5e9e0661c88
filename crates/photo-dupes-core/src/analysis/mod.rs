pub mod grouper;
pub mod resolver;
pub mod review;

pub use grouper::{find_duplicate_groups, record_duplicate_basis, BasisSummary, DuplicateGroup};
pub use resolver::{delete_exact_duplicates, quarantine_duplicates, MemberOutcome, ResolveSummary};
pub use review::{export_pairs, import_decisions, ReviewRow};
