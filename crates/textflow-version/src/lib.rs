//! Versioning and diff engine: content-addressed snapshots of logical documents with
//! temporal validity windows, comparison, rollback and retention.

pub mod diff;
pub mod error;
pub mod policy;
pub mod store;
pub mod types;

pub use diff::{LineChange, MetadataDiff, VersionComparison, levenshtein, similarity};
pub use error::VersionError;
pub use policy::{IdStrategy, VersionPolicy};
pub use store::VersionStore;
pub use types::{ChangeMeta, Version};
