//! `BinomialEngine` — a monotone, append-only hashing engine over buckets
//! `0..N`.
//!
//! Buckets live on binary-tree levels sized to consecutive powers of two.
//! `enclosing_filter` masks the smallest power-of-two-minus-one `>= N-1`
//! (the level a fresh hash initially lands on); `minor_filter` masks the
//! level below it, used as a fallback when the enclosing level's rehash
//! attempts keep landing outside `N`.

use std::sync::Arc;

use super::BucketEngine;
use crate::hash::HashFunction;

/// Linear-congruential mixer constant used by the rehash step.
const REHASH_MULTIPLIER: u64 = 2_862_933_555_777_941_757;

/// Number of bounded rehash attempts before falling back to the minor
/// level.
const MAX_REHASH_ATTEMPTS: u32 = 4;

/// The highest power of two `<= n`, or `0` for `n == 0`.
fn highest_one_bit(n: u64) -> u64 {
    if n == 0 {
        0
    } else {
        1u64 << (63 - n.leading_zeros())
    }
}

/// Computes the `(enclosing_filter, minor_filter)` pair describing the two
/// adjacent power-of-two levels that cover `[0, n)`.
fn filters_for(n: u64) -> (u64, u64) {
    if n <= 1 {
        return (0, 0);
    }
    let mut hob = highest_one_bit(n);
    if n > hob {
        hob <<= 1;
    }
    let enclosing = hob - 1;
    (enclosing, enclosing >> 1)
}

/// A stateful, index-based consistent hash over `0..N` buckets.
///
/// `get_bucket` is total: for any `N >= 1` and any 64-bit hash, it returns
/// a value in `[0, N)` with probability 1. The bounded rehash loop plus
/// minor-level fallback guarantee termination within a fixed number of
/// steps.
pub struct BinomialEngine {
    hash_fn: Arc<dyn HashFunction>,
    n: u64,
    enclosing_filter: u64,
    minor_filter: u64,
}

impl BinomialEngine {
    pub fn new(n: u64, hash_fn: Arc<dyn HashFunction>) -> Self {
        let (enclosing_filter, minor_filter) = filters_for(n);
        Self {
            hash_fn,
            n,
            enclosing_filter,
            minor_filter,
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.n
    }

    #[inline]
    pub fn enclosing_filter(&self) -> u64 {
        self.enclosing_filter
    }

    #[inline]
    pub fn minor_filter(&self) -> u64 {
        self.minor_filter
    }

    /// The linear-congruential rehash used both to escape the "missing
    /// tail" region and to relocate within a level.
    #[inline]
    fn rehash(value: u64, seed: u64) -> u64 {
        let h = REHASH_MULTIPLIER.wrapping_mul(value).wrapping_add(1);
        h.wrapping_mul(h).wrapping_mul(seed) >> 32
    }

    /// Given `bucket >= 2`, relocates it to a uniform position within its
    /// own binary-tree level. Buckets `< 2` are level-less and returned
    /// unchanged.
    fn relocate_within_level(bucket: u64, hash: u64) -> u64 {
        if bucket < 2 {
            return bucket;
        }
        let level_base = highest_one_bit(bucket);
        let level_filter = level_base - 1;
        let level_hash = Self::rehash(hash, level_filter);
        level_base + (level_hash & level_filter)
    }

    pub fn get_bucket_u64(&self, key: &[u8]) -> u64 {
        if self.n < 2 {
            return 0;
        }

        let raw_hash = self.hash_fn.hash(key, 0) as u64;
        let mut bucket = raw_hash & self.enclosing_filter;
        bucket = Self::relocate_within_level(bucket, raw_hash);
        if bucket < self.n {
            return bucket;
        }

        let mut h = raw_hash;
        for _ in 0..MAX_REHASH_ATTEMPTS {
            h = Self::rehash(h, self.enclosing_filter);
            bucket = h & self.enclosing_filter;
            if bucket <= self.minor_filter {
                break;
            }
            if bucket < self.n {
                return bucket;
            }
        }

        bucket = raw_hash & self.minor_filter;
        Self::relocate_within_level(bucket, raw_hash)
    }

    pub fn add_bucket_u64(&mut self) -> u64 {
        let new_bucket = self.n;
        self.n += 1;
        if self.n > self.enclosing_filter + 1 {
            self.enclosing_filter = (self.enclosing_filter << 1) | 1;
            self.minor_filter = (self.minor_filter << 1) | 1;
        }
        new_bucket
    }

    /// Shrinks the tail by one bucket. `BinomialEngine` only ever removes
    /// its current tail; non-tail removal is the overlay's job
    /// ([`crate::engine::memento::MementoEngine`]).
    pub fn remove_bucket_u64(&mut self) -> u64 {
        debug_assert!(self.n > 0, "remove_bucket on an empty BinomialEngine");
        self.n -= 1;
        if self.n <= self.minor_filter + 1 {
            self.minor_filter >>= 1;
            self.enclosing_filter >>= 1;
        }
        self.n
    }
}

impl BucketEngine for BinomialEngine {
    #[inline]
    fn get_bucket(&self, key: &[u8]) -> i64 {
        self.get_bucket_u64(key) as i64
    }

    #[inline]
    fn add_bucket(&mut self) -> i64 {
        self.add_bucket_u64() as i64
    }

    #[inline]
    fn remove_bucket(&mut self, _bucket: i64) -> i64 {
        self.remove_bucket_u64() as i64
    }

    #[inline]
    fn size(&self) -> i64 {
        self.n as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::XxHash64;

    fn engine(n: u64) -> BinomialEngine {
        BinomialEngine::new(n, Arc::new(XxHash64))
    }

    #[test]
    fn filters_satisfy_envelope_invariant() {
        for n in 1..200u64 {
            let (enclosing, minor) = filters_for(n);
            assert!(minor + 1 <= n, "n={n} minor={minor}");
            assert!(n <= enclosing + 1, "n={n} enclosing={enclosing}");
        }
    }

    #[test]
    fn get_bucket_is_total() {
        for n in 1..64u64 {
            let e = engine(n);
            for i in 0..2000u64 {
                let key = format!("key-{i}");
                let b = e.get_bucket_u64(key.as_bytes());
                assert!(b < n, "n={n} key={key} bucket={b}");
            }
        }
    }

    #[test]
    fn add_bucket_grows_tail() {
        let mut e = engine(1);
        for expected in 1..50u64 {
            let returned = e.add_bucket_u64();
            assert_eq!(returned, expected);
            assert_eq!(e.size(), expected + 1);
        }
    }

    #[test]
    fn remove_bucket_shrinks_tail() {
        let mut e = engine(50);
        for expected in (1..50u64).rev() {
            let n = e.remove_bucket_u64();
            assert_eq!(n, expected);
        }
    }
}
