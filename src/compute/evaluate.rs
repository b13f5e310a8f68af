//! Exact intersection of candidate pairs.

use crate::compute::candidates::CandidatePair;
use crate::compute::feature::Feature;
use crate::compute::geometry;
use geo::MultiPolygon;
use gridjoin_types::record::IntersectionRecord;

/// Intersection-area primitive; `None` means the overlay faulted.
type Overlay = fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> Option<f64>;

/// Turns candidate pairs into intersection records.
///
/// Stateless: the same pair always yields the same result. Features are
/// already valid (repaired at partition time), so only the overlay itself can
/// fail, and a failure is reported as "no intersection".
#[derive(Debug, Clone, Copy)]
pub struct IntersectionEvaluator {
    negligible_area: f64,
    overlay: Overlay,
}

impl IntersectionEvaluator {
    pub fn new(negligible_area: f64) -> Self {
        Self {
            negligible_area,
            overlay: geometry::intersection_area,
        }
    }

    pub fn negligible_area(&self) -> f64 {
        self.negligible_area
    }

    /// Intersection area of `a` and `b`, or `None` when they do not
    /// intersect, the overlap is negligible, or the overlay faults.
    pub fn intersection_area(&self, a: &Feature, b: &Feature) -> Option<f64> {
        if !a.bbox().intersects(b.bbox()) {
            return None;
        }

        let Some(area) = (self.overlay)(a.geometry(), b.geometry()) else {
            log::warn!(
                "Intersection of '{}' and '{}' failed; counting it as empty",
                a.id(),
                b.id()
            );
            return None;
        };

        (area.is_finite() && area > self.negligible_area).then_some(area)
    }

    /// Full record for a pair with a non-negligible intersection.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridjoin::compute::evaluate::IntersectionEvaluator;
    /// use gridjoin::compute::feature::Feature;
    /// use gridjoin::Role;
    ///
    /// let a = Feature::from_text("a", "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))", Role::A)
    ///     .into_feature()
    ///     .unwrap();
    /// let b = Feature::from_text("b", "POLYGON((0.5 0.5, 1.5 0.5, 1.5 1.5, 0.5 1.5, 0.5 0.5))", Role::B)
    ///     .into_feature()
    ///     .unwrap();
    ///
    /// let record = IntersectionEvaluator::new(1e-9).evaluate(&a, &b).unwrap();
    /// assert!((record.intersection_area - 0.25).abs() < 1e-9);
    /// ```
    pub fn evaluate(&self, a: &Feature, b: &Feature) -> Option<IntersectionRecord> {
        let area = self.intersection_area(a, b)?;
        Some(IntersectionRecord::new(a.id(), b.id(), a.area(), b.area(), area))
    }

    pub fn evaluate_pair(&self, pair: &CandidatePair<'_>) -> Option<IntersectionRecord> {
        self.evaluate(pair.a, pair.b)
    }
}

impl Default for IntersectionEvaluator {
    fn default() -> Self {
        Self::new(1e-9)
    }
}
