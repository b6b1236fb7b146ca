mod record;
mod registry;
mod selectors;

pub use record::{
    BenchmarkResult, CatalogRecord, CodeRef, Collection, CollectionMetadata, Model, ModelMetadata,
    Paper,
};
pub use registry::{CatalogIndex, CollectionEntry, ModelEntry, SourcedRecord};
pub use selectors::{MatchKind, ModelSelection, ModelSelector};
