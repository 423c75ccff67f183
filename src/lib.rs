//! Adapter for the poldiv pollen dataset: IFC multispectral samples with
//! per-channel masks, labelled by species and genus.

pub mod build;
pub mod config;
pub mod data;
pub mod error;
pub mod schema;
pub mod writer;

pub use build::build;
pub use config::{BuildOptions, DatasetConfig, Selection};
pub use data::generate::{assemble, generate_examples, split_generators, Split, SplitGenerator};
pub use data::model::{ChannelId, Record, TaxonomyTable};
pub use data::taxonomy::TaxonomyResolver;
pub use error::{PoldivError, Result};
