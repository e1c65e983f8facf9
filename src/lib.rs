//! # Loam
//!
//! A headless CMS core, usable both as a standalone binary and as a library.
//! Loam covers schema-driven content modeling with inheritance and media byte
//! deployment behind pluggable storage backends. HTTP routing, authentication,
//! and rendering are left to the embedding application.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! loam = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use loam::schema::{SchemaRegistry, SchemaStore, GetOptions};
//! use loam::store::SqliteStore;
//! use loam::sync::NoSync;
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/loam.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let registry = SchemaRegistry::build(&PathBuf::from("./data")).unwrap();
//! let schemas = SchemaStore::new(Arc::new(registry), Arc::new(store), Arc::new(NoSync));
//! // schemas.get(&ctx, "article", &GetOptions::default())...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI binary. Disable with `default-features = false`.

pub mod config;
pub mod error;
pub mod media;
pub mod schema;
pub mod store;
pub mod sync;
pub mod types;
