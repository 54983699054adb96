//! BinomialHash / Memento consistent hashing.
//!
//! [`MementoTable`] assigns requests to hosts with the stability
//! properties of rendezvous hashing at the lookup cost of an array index:
//! adding or removing a single host only moves the keys that belonged to
//! it, and removal is not restricted to whichever host was added last.
//!
//! The engine stack is layered, each piece addressable on its own:
//! - [`engine::BinomialEngine`] — an append-only hash over `0..N` buckets.
//! - [`engine::MementoOverlay`] — records non-tail removals so
//!   [`engine::BinomialEngine`] only ever has to shrink from its tail.
//! - [`engine::MementoEngine`] — composes the two into a full engine that
//!   supports removing any bucket.
//! - [`table::MementoTable`] — maps those bucket indices onto caller-held
//!   host handles, in uniform or weighted mode.

pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod table;

pub use config::TableConfig;
pub use error::{MementoError, Result};
pub use hash::{HashFunction, XxHash64};
pub use table::{HostHandle, MementoTable, Mode, Stats};
