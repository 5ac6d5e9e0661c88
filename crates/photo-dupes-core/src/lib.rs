pub mod analysis;
pub mod config;
pub mod error;
pub mod hasher;
pub mod metadata;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use storage::{Database, FingerprintKind, FingerprintValue, MediaFile};
