pub mod dhash;
pub mod digest;
pub mod driver;
pub mod normalize;
pub mod perceptual;

pub use dhash::{difference_hash, hamming_distance};
pub use driver::{
    clear_invalid, run_hash_pass, HashPassSummary, HashRequest, PERCEPTUAL_SIZE_LIMIT,
};
pub use normalize::{LumaGrid, NormalizeError};
