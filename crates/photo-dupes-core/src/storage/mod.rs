pub mod models;
pub mod queries;
pub mod schema;
pub mod sqlite;

pub use models::{
    FingerprintKind, FingerprintUpdate, FingerprintValue, GroupCount, MediaFile, MediaGroup,
    NewMediaFile, Upserted,
};
pub use sqlite::Database;
