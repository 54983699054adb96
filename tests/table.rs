use std::collections::HashMap;

use memento_hash::{MementoTable, TableConfig};

fn uniform(n: usize) -> Vec<(String, f64)> {
    (0..n).map(|i| (format!("h{i}"), 1.0)).collect()
}

#[test]
fn adding_a_host_only_moves_roughly_one_in_n_keys() {
    let mut table = MementoTable::new(&uniform(8), TableConfig::default()).unwrap();
    let keys: Vec<u64> = (0..20_000).collect();
    let before: HashMap<u64, String> = keys
        .iter()
        .map(|&k| (k, table.choose_host(k, 0).unwrap()))
        .collect();

    table.update(&uniform(9)).unwrap();

    let moved = keys
        .iter()
        .filter(|&&k| table.choose_host(k, 0).unwrap() != before[&k])
        .count();
    let fraction = moved as f64 / keys.len() as f64;

    // Expected disruption for a size-8 -> size-9 grow is close to 1/9;
    // allow generous slack since this is a statistical property, not an
    // exact guarantee.
    assert!(fraction < 0.25, "moved fraction {fraction} too high for a single add");
}

#[test]
fn removing_an_arbitrary_host_leaves_the_rest_untouched() {
    let mut table = MementoTable::new(&uniform(10), TableConfig::default()).unwrap();
    let keys: Vec<u64> = (0..20_000).collect();
    let before: HashMap<u64, String> = keys
        .iter()
        .map(|&k| (k, table.choose_host(k, 0).unwrap()))
        .collect();

    let remaining: Vec<(String, f64)> = uniform(10).into_iter().filter(|(h, _)| h != "h4").collect();
    table.update(&remaining).unwrap();

    for &k in &keys {
        let after = table.choose_host(k, 0).unwrap();
        if before[&k] == "h4" {
            assert_ne!(after, "h4");
        } else {
            assert_eq!(after, before[&k], "key {k} moved despite unrelated removal");
        }
    }
}

#[test]
fn weighted_assignment_is_roughly_proportional() {
    let weights = vec![
        ("big".to_string(), 0.6),
        ("small-a".to_string(), 0.2),
        ("small-b".to_string(), 0.2),
    ];
    let table = MementoTable::new(&weights, TableConfig::default()).unwrap();
    assert_eq!(table.stats().mode, memento_hash::Mode::Weighted);

    let mut counts: HashMap<String, u64> = HashMap::new();
    let total = 50_000u64;
    for k in 0..total {
        let host = table.choose_host(k, 0).unwrap();
        *counts.entry(host).or_insert(0) += 1;
    }

    let big_fraction = counts["big"] as f64 / total as f64;
    assert!(
        (0.5..0.7).contains(&big_fraction),
        "big host got {big_fraction} of traffic, expected roughly 0.6"
    );
}

#[test]
fn mode_switches_between_uniform_and_weighted_on_update() {
    let mut table = MementoTable::new(&uniform(4), TableConfig::default()).unwrap();
    assert_eq!(table.stats().mode, memento_hash::Mode::Uniform);

    let skewed = vec![
        ("h0".to_string(), 0.7),
        ("h1".to_string(), 0.1),
        ("h2".to_string(), 0.1),
        ("h3".to_string(), 0.1),
    ];
    table.update(&skewed).unwrap();
    assert_eq!(table.stats().mode, memento_hash::Mode::Weighted);

    table.update(&uniform(4)).unwrap();
    assert_eq!(table.stats().mode, memento_hash::Mode::Uniform);
}

#[test]
fn retry_attempts_can_land_on_a_different_host() {
    let table = MementoTable::new(&uniform(8), TableConfig::default()).unwrap();
    let mut distinct_hosts_seen = std::collections::HashSet::new();
    for attempt in 0..8 {
        distinct_hosts_seen.insert(table.choose_host(42, attempt).unwrap());
    }
    assert!(distinct_hosts_seen.len() > 1, "retries never left the initial host");
}

#[test]
fn empty_weight_vector_is_rejected() {
    let empty: Vec<(String, f64)> = Vec::new();
    assert!(MementoTable::new(&empty, TableConfig::default()).is_err());
}

#[test]
fn negative_weight_is_rejected() {
    let weights = vec![("a".to_string(), 1.0), ("b".to_string(), -0.5)];
    assert!(MementoTable::new(&weights, TableConfig::default()).is_err());
}
