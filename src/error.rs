use thiserror::Error;

/// Errors returned by `memento-hash`'s public API.
///
/// Internal invariant breaks that the algorithm guarantees cannot happen
/// (an engine returning a bucket outside `[0, N)`) are not represented
/// here; they are programmer errors and surface as panics in debug
/// builds, per the engine's totality contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MementoError {
    /// `remove_bucket` (or an update implying it) was asked to remove a
    /// bucket index that is not part of the current working set.
    #[error("bucket `{0}` is not a member of the current working set")]
    UnknownBucket(i64),

    /// A weight vector handed to `new`/`update` contained a negative or
    /// non-finite weight.
    #[error("invalid host weight: `{0}`")]
    InvalidWeight(String),

    /// `new`/`update` was called with zero hosts.
    #[error("host weight vector must not be empty")]
    EmptyHostSet,
}

pub type Result<T> = std::result::Result<T, MementoError>;
