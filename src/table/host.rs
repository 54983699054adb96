//! Stable host identity for the table.

/// Anything usable as a host reference inside a [`super::MementoTable`].
///
/// The table only ever compares, clones, and hashes `H`; it never
/// inspects or mutates the host itself. A cheap-to-clone handle (`Arc<T>`,
/// an integer id, an interned string) is the expected shape: host
/// references are owned by the surrounding system, and the table only
/// holds non-owning observers of their identity.
pub trait HostHandle: Clone + Eq + std::hash::Hash {}

impl<T: Clone + Eq + std::hash::Hash> HostHandle for T {}
