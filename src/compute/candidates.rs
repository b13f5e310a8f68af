//! Candidate pair generation within one cell.
//!
//! Two interchangeable strategies share one contract: given the A-side and
//! B-side features of a cell, return every `(a, b)` whose bounding boxes
//! intersect (closed test, touching boxes included) and whose identifiers are
//! admitted by the [`SelfPairPolicy`]. Pairs come back ordered by
//! `(a index, b index)`, so both strategies return the same list for the
//! same input.
//!
//! - [`CandidateStrategy::Exhaustive`] walks the full cross product.
//! - [`CandidateStrategy::Indexed`] bulk-loads an R-tree over the B side and
//!   probes it with each A envelope: `O(|A| log |B| + matches)`.

use crate::compute::feature::Feature;
use crate::config::SelfPairPolicy;
use gridjoin_types::bbox::BoundingBox2D;
use rstar::{AABB, RTree, RTreeObject};
use std::sync::Arc;

/// A candidate `(A-feature, B-feature)` pair proposed by a shared cell.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub a: &'a Feature,
    pub b: &'a Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    Exhaustive,
    Indexed,
}

impl CandidateStrategy {
    /// Pick a strategy for a cell of the given populations.
    ///
    /// The index pays for itself once the cross product reaches `threshold`
    /// comparisons.
    pub fn select(a_len: usize, b_len: usize, threshold: usize) -> Self {
        if b_len > 1 && a_len.saturating_mul(b_len) >= threshold {
            CandidateStrategy::Indexed
        } else {
            CandidateStrategy::Exhaustive
        }
    }

    pub fn generate<'a>(
        &self,
        a_side: &'a [Arc<Feature>],
        b_side: &'a [Arc<Feature>],
        policy: SelfPairPolicy,
    ) -> Vec<CandidatePair<'a>> {
        match self {
            CandidateStrategy::Exhaustive => exhaustive(a_side, b_side, policy),
            CandidateStrategy::Indexed => indexed(a_side, b_side, policy),
        }
    }
}

fn exhaustive<'a>(
    a_side: &'a [Arc<Feature>],
    b_side: &'a [Arc<Feature>],
    policy: SelfPairPolicy,
) -> Vec<CandidatePair<'a>> {
    let mut pairs = Vec::new();
    for a in a_side {
        for b in b_side {
            if a.bbox().intersects(b.bbox()) && policy.admits(a.id(), b.id()) {
                pairs.push(CandidatePair { a, b });
            }
        }
    }
    pairs
}

fn indexed<'a>(
    a_side: &'a [Arc<Feature>],
    b_side: &'a [Arc<Feature>],
    policy: SelfPairPolicy,
) -> Vec<CandidatePair<'a>> {
    let index = EnvelopeIndex::build(b_side);

    let mut pairs = Vec::new();
    let mut hits = Vec::new();
    for a in a_side {
        hits.clear();
        hits.extend(index.query(a.bbox()));
        // R-tree traversal order is not input order
        hits.sort_unstable();

        for &j in &hits {
            let b = &b_side[j];
            if policy.admits(a.id(), b.id()) {
                pairs.push(CandidatePair { a, b });
            }
        }
    }
    pairs
}

/// Bounding box of one indexed feature, pointing back at its slot.
#[derive(Debug, Clone)]
struct IndexedEnvelope {
    idx: usize,
    bbox: BoundingBox2D,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_aabb(&self.bbox)
    }
}

/// Bounding-box R-tree over a slice of features.
pub struct EnvelopeIndex {
    tree: RTree<IndexedEnvelope>,
}

impl EnvelopeIndex {
    pub fn build(features: &[Arc<Feature>]) -> Self {
        let envelopes = features
            .iter()
            .enumerate()
            .map(|(idx, feature)| IndexedEnvelope {
                idx,
                bbox: *feature.bbox(),
            })
            .collect();

        Self {
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// Slots whose bounding box intersects `bbox`, in no particular order.
    pub fn query<'s>(&'s self, bbox: &BoundingBox2D) -> impl Iterator<Item = usize> + 's {
        self.tree
            .locate_in_envelope_intersecting(&to_aabb(bbox))
            .map(|entry| entry.idx)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn to_aabb(bbox: &BoundingBox2D) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}
