//! `MementoTable` — maps engine bucket indices to hosts, in uniform (1:1)
//! or weighted (virtual-node) mode, and applies delta updates when the
//! host set changes.

pub mod host;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use host::HostHandle;

use crate::config::TableConfig;
use crate::engine::MementoEngine;
use crate::error::{MementoError, Result};
use crate::hash::{HashFunction, XxHash64};

/// Which bucket→host scheme a table is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 1:1 bucket-to-host mapping, used when all weights are equal.
    Uniform,
    /// Virtual-node mapping, used when weights diverge.
    Weighted,
}

/// Introspection snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub virtual_nodes: usize,
    pub physical_hosts: usize,
    pub mode: Mode,
    /// Count of defensive out-of-range fallbacks taken by `choose_host`.
    /// Always `0` under a correctly-implemented engine; kept as a
    /// diagnostic rather than silently swallowed.
    pub out_of_range_events: u64,
}

/// Places `value` at raw engine index `idx` in a vector that must stay
/// exactly `array_size()` long: `idx` is either the current tail
/// (appended) or a hole a previous non-tail removal left behind
/// (overwritten).
#[inline]
fn place<H: Clone>(array: &mut Vec<H>, idx: i64, value: H) {
    let idx = idx as usize;
    if idx == array.len() {
        array.push(value);
    } else {
        array[idx] = value;
    }
}

fn vnodes_for(weight: f64, config: &TableConfig) -> u32 {
    let scaled = (weight * config.virtual_node_scale as f64).round();
    let scaled = if scaled.is_finite() { scaled.max(0.0) } else { 0.0 };
    (scaled as u32).clamp(
        config.min_virtual_nodes_per_host,
        config.max_virtual_nodes_per_host,
    )
}

fn is_uniform<H>(weights: &[(H, f64)], tolerance: f64) -> bool {
    match weights.split_first() {
        None => true,
        Some((first, rest)) => rest.iter().all(|(_, w)| (w - first.1).abs() <= tolerance),
    }
}

fn validate_weights<H>(weights: &[(H, f64)]) -> Result<()> {
    if weights.is_empty() {
        return Err(MementoError::EmptyHostSet);
    }
    for (_, w) in weights {
        if !w.is_finite() || *w < 0.0 {
            return Err(MementoError::InvalidWeight(w.to_string()));
        }
    }
    Ok(())
}

struct UniformState<H: HostHandle> {
    /// Index == engine raw bucket id (`MementoEngine::array_size`). May
    /// contain stale entries at indices a non-tail removal vacated; those
    /// are never read again, because the engine never hands a removed
    /// bucket back out of `get_bucket`.
    hosts: Vec<H>,
    /// Currently-live hosts and the bucket index each occupies.
    live: HashMap<H, i64>,
}

impl<H: HostHandle> UniformState<H> {
    fn choose(&self, bucket: i64, out_of_range: &AtomicU64) -> Option<H> {
        if let Some(h) = self.hosts.get(bucket as usize) {
            return Some(h.clone());
        }
        out_of_range.fetch_add(1, Ordering::Relaxed);
        if self.live.is_empty() {
            return None;
        }
        let idx = (bucket as usize) % self.live.len();
        self.live.keys().nth(idx).cloned()
    }

    fn update(&mut self, engine: &mut MementoEngine, new_hosts: &[H]) {
        let new_set: std::collections::HashSet<&H> = new_hosts.iter().collect();

        let mut departing: Vec<(H, i64)> = self
            .live
            .iter()
            .filter(|(h, _)| !new_set.contains(h))
            .map(|(h, &idx)| (h.clone(), idx))
            .collect();
        // Descending bucket order maximizes the chance a removal lands on
        // the engine's literal tail, the only case that shrinks the raw
        // array instead of just punching a hole in it.
        departing.sort_unstable_by(|a, b| b.1.cmp(&a.1));
        for (host, idx) in departing {
            engine.remove_bucket(idx);
            self.live.remove(&host);
        }
        self.hosts.truncate(engine.array_size() as usize);

        for host in new_hosts {
            if self.live.contains_key(host) {
                continue;
            }
            let idx = engine.add_bucket();
            place(&mut self.hosts, idx, host.clone());
            self.live.insert(host.clone(), idx);
        }
    }
}

struct WeightedState<H: HostHandle> {
    /// Index == engine raw bucket id.
    virtual_to_physical: Vec<H>,
    /// Bucket indices currently owned by each host (unordered).
    host_buckets: HashMap<H, Vec<i64>>,
    current_weights: HashMap<H, u32>,
}

impl<H: HostHandle> WeightedState<H> {
    fn choose(&self, bucket: i64, out_of_range: &AtomicU64) -> Option<H> {
        match self.virtual_to_physical.get(bucket as usize) {
            Some(h) => Some(h.clone()),
            None => {
                out_of_range.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn add_host(&mut self, engine: &mut MementoEngine, host: &H, weight: u32) {
        let mut indices = Vec::with_capacity(weight as usize);
        for _ in 0..weight {
            let idx = engine.add_bucket();
            place(&mut self.virtual_to_physical, idx, host.clone());
            indices.push(idx);
        }
        self.host_buckets.insert(host.clone(), indices);
        self.current_weights.insert(host.clone(), weight);
    }

    fn remove_host(&mut self, engine: &mut MementoEngine, host: &H) {
        if let Some(mut indices) = self.host_buckets.remove(host) {
            indices.sort_unstable_by(|a, b| b.cmp(a));
            for idx in indices {
                engine.remove_bucket(idx);
            }
        }
        self.current_weights.remove(host);
        self.virtual_to_physical.truncate(engine.array_size() as usize);
    }

    fn reweight_host(&mut self, engine: &mut MementoEngine, host: &H, old: u32, new: u32) {
        use std::cmp::Ordering as Ord;
        match new.cmp(&old) {
            Ord::Greater => {
                let to_add = new - old;
                let indices = self.host_buckets.entry(host.clone()).or_default();
                for _ in 0..to_add {
                    let idx = engine.add_bucket();
                    place(&mut self.virtual_to_physical, idx, host.clone());
                    indices.push(idx);
                }
            }
            Ord::Less => {
                let to_remove = old - new;
                if let Some(indices) = self.host_buckets.get_mut(host) {
                    indices.sort_unstable_by(|a, b| b.cmp(a));
                    for _ in 0..to_remove {
                        if let Some(idx) = indices.pop() {
                            engine.remove_bucket(idx);
                        }
                    }
                }
                self.virtual_to_physical.truncate(engine.array_size() as usize);
            }
            Ord::Equal => {}
        }
        self.current_weights.insert(host.clone(), new);
    }

    fn update(&mut self, engine: &mut MementoEngine, new_weights: &[(H, f64)], config: &TableConfig) {
        let desired: HashMap<H, u32> = new_weights
            .iter()
            .map(|(h, w)| (h.clone(), vnodes_for(*w, config)))
            .collect();

        for (host, &weight) in desired.iter() {
            match self.current_weights.get(host).copied() {
                None => self.add_host(engine, host, weight),
                Some(old) if old != weight => self.reweight_host(engine, host, old, weight),
                _ => {}
            }
        }

        let departing: Vec<H> = self
            .current_weights
            .keys()
            .filter(|h| !desired.contains_key(*h))
            .cloned()
            .collect();
        for host in departing {
            self.remove_host(engine, &host);
        }
    }
}

enum TableState<H: HostHandle> {
    Uniform(UniformState<H>),
    Weighted(WeightedState<H>),
}

/// Consistent-hashing host-selection table.
///
/// `H` is a caller-supplied host handle (see [`HostHandle`]): the table
/// only clones, hashes, and compares it, never inspects the host itself.
pub struct MementoTable<H: HostHandle> {
    engine: MementoEngine,
    hash_fn: Arc<dyn HashFunction>,
    config: TableConfig,
    state: TableState<H>,
    out_of_range: AtomicU64,
}

impl<H: HostHandle> MementoTable<H> {
    /// Builds a table with the default [`XxHash64`] hash function.
    pub fn new(host_weights: &[(H, f64)], config: TableConfig) -> Result<Self> {
        Self::with_hash_fn(host_weights, config, Arc::new(XxHash64))
    }

    /// Builds a table with a caller-supplied [`HashFunction`].
    pub fn with_hash_fn(
        host_weights: &[(H, f64)],
        config: TableConfig,
        hash_fn: Arc<dyn HashFunction>,
    ) -> Result<Self> {
        validate_weights(host_weights)?;
        let uniform = is_uniform(host_weights, config.weight_uniform_tolerance);
        let (engine, state) = if uniform {
            let hosts: Vec<H> = host_weights.iter().map(|(h, _)| h.clone()).collect();
            Self::build_uniform(&hosts, hash_fn.clone())
        } else {
            Self::build_weighted(host_weights, &config, hash_fn.clone())
        };
        Ok(Self {
            engine,
            hash_fn,
            config,
            state,
            out_of_range: AtomicU64::new(0),
        })
    }

    fn build_uniform(hosts: &[H], hash_fn: Arc<dyn HashFunction>) -> (MementoEngine, TableState<H>) {
        let mut engine = MementoEngine::new(1, hash_fn);
        let mut vec_hosts = Vec::with_capacity(hosts.len());
        let mut live = HashMap::with_capacity(hosts.len());
        for (i, host) in hosts.iter().enumerate() {
            let idx = if i == 0 { 0 } else { engine.add_bucket() };
            place(&mut vec_hosts, idx, host.clone());
            live.insert(host.clone(), idx);
        }
        (
            engine,
            TableState::Uniform(UniformState {
                hosts: vec_hosts,
                live,
            }),
        )
    }

    fn build_weighted(
        host_weights: &[(H, f64)],
        config: &TableConfig,
        hash_fn: Arc<dyn HashFunction>,
    ) -> (MementoEngine, TableState<H>) {
        let mut engine = MementoEngine::new(1, hash_fn);
        let mut virtual_to_physical = Vec::new();
        let mut host_buckets = HashMap::with_capacity(host_weights.len());
        let mut current_weights = HashMap::with_capacity(host_weights.len());

        let mut first = true;
        for (host, weight) in host_weights {
            let vnodes = vnodes_for(*weight, config);
            let mut indices = Vec::with_capacity(vnodes as usize);
            for _ in 0..vnodes {
                let idx = if first {
                    first = false;
                    0
                } else {
                    engine.add_bucket()
                };
                place(&mut virtual_to_physical, idx, host.clone());
                indices.push(idx);
            }
            host_buckets.insert(host.clone(), indices);
            current_weights.insert(host.clone(), vnodes);
        }

        (
            engine,
            TableState::Weighted(WeightedState {
                virtual_to_physical,
                host_buckets,
                current_weights,
            }),
        )
    }

    /// Selects a host for `request_hash` on retry `attempt`. The lookup
    /// key is the decimal concatenation of both values, so each retry
    /// probes a distinct position in the bucket space. Returns `None`
    /// only if the host set is empty.
    pub fn choose_host(&self, request_hash: u64, attempt: u32) -> Option<H> {
        let key = format!("{request_hash}{attempt}");
        let bucket = self.engine.get_bucket(key.as_bytes());
        if bucket < 0 {
            return None;
        }
        match &self.state {
            TableState::Uniform(s) => s.choose(bucket, &self.out_of_range),
            TableState::Weighted(s) => s.choose(bucket, &self.out_of_range),
        }
    }

    /// Applies a delta update to reach `new_host_weights` without
    /// rebuilding the engine from scratch, unless the uniform/weighted
    /// mode itself changes.
    pub fn update(&mut self, new_host_weights: &[(H, f64)]) -> Result<()> {
        validate_weights(new_host_weights)?;
        let new_uniform = is_uniform(new_host_weights, self.config.weight_uniform_tolerance);
        let currently_uniform = matches!(self.state, TableState::Uniform(_));

        if new_uniform != currently_uniform {
            let (engine, state) = if new_uniform {
                let hosts: Vec<H> = new_host_weights.iter().map(|(h, _)| h.clone()).collect();
                Self::build_uniform(&hosts, self.hash_fn.clone())
            } else {
                Self::build_weighted(new_host_weights, &self.config, self.hash_fn.clone())
            };
            self.engine = engine;
            self.state = state;
            return Ok(());
        }

        match &mut self.state {
            TableState::Uniform(s) => {
                let hosts: Vec<H> = new_host_weights.iter().map(|(h, _)| h.clone()).collect();
                s.update(&mut self.engine, &hosts);
            }
            TableState::Weighted(s) => s.update(&mut self.engine, new_host_weights, &self.config),
        }
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        match &self.state {
            TableState::Uniform(s) => Stats {
                virtual_nodes: s.live.len(),
                physical_hosts: s.live.len(),
                mode: Mode::Uniform,
                out_of_range_events: self.out_of_range.load(Ordering::Relaxed),
            },
            TableState::Weighted(s) => Stats {
                virtual_nodes: s.current_weights.values().map(|&w| w as usize).sum(),
                physical_hosts: s.current_weights.len(),
                mode: Mode::Weighted,
                out_of_range_events: self.out_of_range.load(Ordering::Relaxed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(n: usize) -> Vec<(String, f64)> {
        (0..n).map(|i| (format!("H{i}"), 1.0 / n as f64)).collect()
    }

    #[test]
    fn basic_uniform_hits_every_host() {
        let table = MementoTable::new(&hosts(6), TableConfig::default()).unwrap();
        assert_eq!(table.stats().mode, Mode::Uniform);
        let mut seen = std::collections::HashSet::new();
        for i in 0..2000u64 {
            let h = table.choose_host(i, 0).unwrap();
            seen.insert(h);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn empty_host_set_rejected() {
        let empty: Vec<(String, f64)> = Vec::new();
        assert!(matches!(
            MementoTable::new(&empty, TableConfig::default()),
            Err(MementoError::EmptyHostSet)
        ));
    }

    #[test]
    fn weighted_mode_selected_for_diverging_weights() {
        let weights = vec![
            ("A".to_string(), 0.5),
            ("B".to_string(), 0.3),
            ("C".to_string(), 0.2),
        ];
        let table = MementoTable::new(&weights, TableConfig::default()).unwrap();
        assert_eq!(table.stats().mode, Mode::Weighted);
        assert_eq!(table.stats().physical_hosts, 3);
    }

    #[test]
    fn non_tail_removal_leaves_other_hosts_stable() {
        let mut table = MementoTable::new(&hosts(8), TableConfig::default()).unwrap();
        let keys: Vec<u64> = (0..3000).collect();
        let before: HashMap<u64, String> = keys
            .iter()
            .map(|&k| (k, table.choose_host(k, 0).unwrap()))
            .collect();

        let remaining: Vec<(String, f64)> = hosts(8).into_iter().filter(|(h, _)| h != "H3").collect();
        table.update(&remaining).unwrap();

        for &k in &keys {
            let after = table.choose_host(k, 0).unwrap();
            if before[&k] != "H3" {
                assert_eq!(after, before[&k], "key {k} moved despite unrelated removal");
            } else {
                assert_ne!(after, "H3");
            }
        }
    }
}
