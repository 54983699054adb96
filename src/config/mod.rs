/// Advisory and tuning parameters consumed by [`crate::table::MementoTable`].
///
/// `table_size_hint` is advisory only: the engine never allocates a fixed
/// lookup table of this size, unlike a Maglev-style balancer. It exists so
/// callers migrating from a fixed-size hashing policy have a knob to pass
/// through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    /// Advisory table-size hint. Unused by the engine itself; kept for
    /// interface parity with fixed-table balancers.
    pub table_size_hint: u64,
    /// Scale factor used to turn a normalized weight into an integer
    /// virtual-node count.
    pub virtual_node_scale: u32,
    /// Minimum virtual nodes assigned to any physical host in weighted mode.
    pub min_virtual_nodes_per_host: u32,
    /// Maximum virtual nodes assigned to any physical host in weighted mode.
    pub max_virtual_nodes_per_host: u32,
    /// Tolerance used to decide whether a weight vector is "uniform enough"
    /// to use the unweighted 1:1 bucket mapping.
    pub weight_uniform_tolerance: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_size_hint: 65_537,
            virtual_node_scale: 1_000,
            min_virtual_nodes_per_host: 1,
            max_virtual_nodes_per_host: 10_000,
            weight_uniform_tolerance: 1e-3,
        }
    }
}
