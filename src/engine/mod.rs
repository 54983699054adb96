//! Bucket-assignment engines.
//!
//! `BinomialEngine` and `MementoEngine` share a small capability trait
//! rather than a class hierarchy: [`MementoEngine`](memento::MementoEngine)
//! owns a [`BinomialEngine`](binomial::BinomialEngine) and a
//! [`MementoOverlay`](overlay::MementoOverlay) as fields and composes
//! their behavior, rather than extending either.

pub mod binomial;
pub mod memento;
pub mod overlay;

pub use binomial::BinomialEngine;
pub use memento::MementoEngine;
pub use overlay::MementoOverlay;

/// Shared capability surface of a bucket-based hashing engine.
pub trait BucketEngine {
    /// Map `key` to a bucket in `[0, size())`.
    fn get_bucket(&self, key: &[u8]) -> i64;
    /// Grow the working set by one bucket, returning its index.
    fn add_bucket(&mut self) -> i64;
    /// Shrink the working set by one bucket, returning the removed index.
    fn remove_bucket(&mut self, bucket: i64) -> i64;
    /// Current working-set size.
    fn size(&self) -> i64;
}
