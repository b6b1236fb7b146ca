pub mod error;
pub mod events;
pub mod models;
pub mod schema;
pub mod summary;

pub use error::{Location, ValidationError, ValidationErrors};
pub use models::{CatalogIndex, CatalogRecord, Collection, Model};
