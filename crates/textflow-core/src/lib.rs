//! Text unit model, content hashing and retry primitives shared by the textflow engines.

pub mod merge;
pub mod retry;
pub mod unit;

pub use merge::merge_parallel_outputs;
pub use retry::{Backoff, RetryError, RetryPolicy};
pub use unit::{Metadata, MetadataValue, TextUnit, normalize_content};
