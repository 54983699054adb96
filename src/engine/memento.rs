//! `MementoEngine` — composes [`BinomialEngine`] and [`MementoOverlay`] to
//! support shrinking arbitrary, non-tail buckets.

use std::sync::Arc;

use super::{BinomialEngine, BucketEngine, MementoOverlay};
use crate::hash::HashFunction;

pub struct MementoEngine {
    binomial: BinomialEngine,
    overlay: MementoOverlay,
    hash_fn: Arc<dyn HashFunction>,
    /// Head of the chain of logically-removed, non-tail buckets.
    last_removed: i64,
}

impl MementoEngine {
    /// Creates a new engine with an initial working set of `n0` buckets
    /// (`n0 >= 1`).
    pub fn new(n0: u64, hash_fn: Arc<dyn HashFunction>) -> Self {
        Self {
            binomial: BinomialEngine::new(n0, hash_fn.clone()),
            overlay: MementoOverlay::new(),
            hash_fn,
            last_removed: n0 as i64,
        }
    }

    pub fn get_bucket(&self, key: &[u8]) -> i64 {
        let mut b = self.binomial.get_bucket(key) as i64;

        let mut replacer = self.overlay.replacer(b);
        while let Some(r) = replacer {
            // `r` was the working-set size at the moment `b` was removed;
            // keys that still land on `b` are re-hashed into `[0, r)`,
            // keyed by the bucket that sent them here.
            let h = (self.hash_fn.hash(key, b as u64)).unsigned_abs();
            b = (h % (r as u64)) as i64;

            // Chase successor removals: if the new bucket was itself
            // removed *after* `b` (i.e. its replacer covers a still-later
            // region), keep following until we land somewhere that was
            // live at a size `<= r`.
            let mut r2 = self.overlay.replacer(b);
            while let Some(next) = r2 {
                if next < r {
                    break;
                }
                b = next;
                r2 = self.overlay.replacer(b);
            }
            replacer = r2;
        }
        b
    }

    /// Restores the next logically-removed bucket (or grows the tail if
    /// none has ever been removed), returning its index.
    pub fn add_bucket(&mut self) -> i64 {
        let bucket = self.last_removed;
        self.last_removed = self.overlay.restore(bucket);

        if bucket >= self.binomial.size() as i64 {
            self.binomial.add_bucket_u64();
        }
        bucket
    }

    /// Removes `bucket` from the working set. Tail removals (when the
    /// overlay is empty and `bucket` is the current last index) shrink the
    /// underlying `BinomialEngine`; everything else is recorded in the
    /// overlay only.
    pub fn remove_bucket(&mut self, bucket: i64) -> i64 {
        if self.overlay.is_empty() && bucket == self.binomial.size() as i64 - 1 {
            self.binomial.remove_bucket_u64();
            self.last_removed = bucket;
            return bucket;
        }

        let working_set_size = self.size();
        self.last_removed = self
            .overlay
            .remember(bucket, working_set_size - 1, self.last_removed);
        bucket
    }

    /// Working-set size: `binomial.size() - overlay.size()`.
    pub fn size(&self) -> i64 {
        self.binomial.size() as i64 - self.overlay.size() as i64
    }

    /// Size of the raw `BinomialEngine` array, including any bucket indices
    /// currently punched out by the overlay. Bucket indices returned by
    /// [`Self::add_bucket`]/[`Self::remove_bucket`] are always `< array_size()`,
    /// which callers that index parallel per-bucket storage (like
    /// [`crate::table::MementoTable`]) rely on to size that storage.
    pub fn array_size(&self) -> i64 {
        self.binomial.size() as i64
    }
}

impl BucketEngine for MementoEngine {
    #[inline]
    fn get_bucket(&self, key: &[u8]) -> i64 {
        MementoEngine::get_bucket(self, key)
    }

    #[inline]
    fn add_bucket(&mut self) -> i64 {
        MementoEngine::add_bucket(self)
    }

    #[inline]
    fn remove_bucket(&mut self, bucket: i64) -> i64 {
        MementoEngine::remove_bucket(self, bucket)
    }

    #[inline]
    fn size(&self) -> i64 {
        MementoEngine::size(self)
    }
}
