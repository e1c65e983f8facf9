mod source;

pub use source::{NoSync, SyncSource};
