//! Parallel execution of band projections

pub mod dispatcher;
pub mod partition;
pub mod shared;

pub use dispatcher::{DispatchShape, WorkDispatcher};
pub use partition::partition;
