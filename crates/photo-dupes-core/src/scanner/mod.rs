pub mod media_type;
pub mod walk;

pub use walk::{load_folder, resolve_folder, LoadOptions, LoadSummary};
