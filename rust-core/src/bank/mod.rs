//! Band definitions, indexing, projection and the filter bank itself

pub mod bands;
pub mod indexer;
pub mod projector;
pub mod filterbank;

pub use bands::{BandSet, FrequencyBand};
pub use indexer::{FrequencyIndexer, IndexArrays, SampleGrid};
pub use projector::{BandpassProjector, ProjectorInputs};
pub use filterbank::{BankOutput, FilterBank};
