//! Pair deduplication across cells.
//!
//! A pair of features replicated into several common cells is proposed once
//! per shared cell. Two mechanisms make sure it is counted once:
//!
//! - [`PairDeduplicator`]: a key set scoped to one query, consulted before a
//!   pair is evaluated (local path).
//! - [`distinct_records`]: a reduction over all partial results after every
//!   cell has been evaluated (batch path).

use gridjoin_types::record::IntersectionRecord;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Resolved `(id_a, id_b)` keys for the lifetime of one query.
#[derive(Debug, Default)]
pub struct PairDeduplicator {
    seen: FxHashSet<(Arc<str>, Arc<str>)>,
    duplicates: u64,
}

impl PairDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the key and report whether this is its first sighting.
    ///
    /// ```
    /// use gridjoin::compute::dedup::PairDeduplicator;
    /// use std::sync::Arc;
    ///
    /// let mut dedup = PairDeduplicator::new();
    /// let (a, b): (Arc<str>, Arc<str>) = (Arc::from("a"), Arc::from("b"));
    /// assert!(dedup.first_sighting(&a, &b));
    /// assert!(!dedup.first_sighting(&a, &b));
    /// assert_eq!(dedup.duplicates(), 1);
    /// ```
    pub fn first_sighting(&mut self, id_a: &Arc<str>, id_b: &Arc<str>) -> bool {
        let inserted = self.seen.insert((Arc::clone(id_a), Arc::clone(id_b)));
        if !inserted {
            self.duplicates += 1;
        }
        inserted
    }

    /// Number of distinct keys seen.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Sightings rejected as repeats.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }
}

/// Global distinct over partial records, keyed by `(id_a, id_b)`.
///
/// Returns the surviving records sorted by key and the number removed. The
/// geometry behind a key is fixed, so every copy carries the same areas and
/// keeping any one of them is exact.
pub fn distinct_records(mut records: Vec<IntersectionRecord>) -> (Vec<IntersectionRecord>, usize) {
    let before = records.len();
    records.sort_by(|x, y| x.key().cmp(&y.key()));
    records.dedup_by(|x, y| x.key() == y.key());
    let removed = before - records.len();
    (records, removed)
}
