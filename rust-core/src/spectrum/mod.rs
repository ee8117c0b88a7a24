//! STFT analysis and overlap-add reconstruction

pub mod stft;
pub mod overlap;

pub use stft::{StftEngine, stft};
pub use overlap::overlap_add;
