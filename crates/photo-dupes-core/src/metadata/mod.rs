pub mod exif;
pub mod organize;

pub use self::exif::{
    dump_metadata, extract_creation_timestamp, fill_creation_timestamps, CreationTimestamp,
    ExifSummary, MetadataEntry,
};
pub use organize::{organize_by_date, OrganizeSummary};
