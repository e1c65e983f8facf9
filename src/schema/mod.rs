mod model;
mod registry;
mod resolve;
mod store;

pub use model::{Schema, SchemaDefinition, SchemaKind, SchemaPayload};
pub use registry::SchemaRegistry;
pub use resolve::merge;
pub use store::{GetOptions, ListOptions, SchemaStore};
