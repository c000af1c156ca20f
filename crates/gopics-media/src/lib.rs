pub mod normalize;
pub mod storage;

pub use normalize::{ImageLimits, MediaError, Normalized, normalize};
pub use storage::MediaStore;
