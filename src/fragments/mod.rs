mod bins;
mod frag;
mod read;
pub mod streaming;
pub mod write;

pub use bins::{split_by_size, BinScheme, SizeSplit, DEFAULT_BREAKS, DEFAULT_LABELS};
pub use frag::Fragment;
pub use read::FragmentReader;
