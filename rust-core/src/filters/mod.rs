//! Window functions and prototype lowpass design

pub mod windows;
pub mod design;
pub mod prototype;

pub use windows::{WindowType, generate_window, generate_periodic_window};
pub use design::{design_lowpass_fir, group_delay, mean_group_delay};
pub use prototype::PrototypeFilter;
