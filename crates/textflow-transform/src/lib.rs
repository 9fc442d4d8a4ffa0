//! Transformation chain composer: named text transforms, composed into chains and
//! executed with timeout and retry wrapping.

pub mod builtin;
pub mod composer;
pub mod error;

pub use composer::{
    ChainComposer, ComposedChain, ExecuteOptions, ParallelOutcome, TransformFn, TransformOutcome,
    TransformStats,
};
pub use error::TransformError;
