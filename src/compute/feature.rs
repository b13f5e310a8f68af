//! Identified polygons with cached area and envelope.

use crate::compute::geometry::{self, Prepared, SkipReason};
use geo::MultiPolygon;
use gridjoin_types::bbox::BoundingBox2D;
use gridjoin_types::cell::Role;
use std::sync::Arc;

/// An identified polygon belonging to one of the two compared collections.
///
/// Immutable once built. Area and bounding box are computed a single time from
/// the (possibly repaired) geometry. Cells hold `Arc<Feature>` references, so
/// replication never copies the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    id: Arc<str>,
    role: Role,
    geometry: MultiPolygon<f64>,
    area: f64,
    bbox: BoundingBox2D,
}

/// Result of turning one raw entry into a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOutcome {
    Ready(Feature),
    Repaired(Feature),
    Skipped(SkipReason),
}

impl FeatureOutcome {
    pub fn into_feature(self) -> Option<Feature> {
        match self {
            FeatureOutcome::Ready(feature) | FeatureOutcome::Repaired(feature) => Some(feature),
            FeatureOutcome::Skipped(_) => None,
        }
    }
}

impl Feature {
    /// Parse, repair if needed, and measure raw geometry text.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridjoin::compute::feature::{Feature, FeatureOutcome};
    /// use gridjoin::Role;
    ///
    /// let outcome = Feature::from_text("parcel-1", "POLYGON((0 0, 2 0, 2 1, 0 1, 0 0))", Role::A);
    /// let feature = outcome.into_feature().unwrap();
    /// assert_eq!(feature.area(), 2.0);
    /// ```
    pub fn from_text(id: &str, text: &str, role: Role) -> FeatureOutcome {
        match geometry::prepare(text) {
            Prepared::Valid(geometry) => match Self::from_geometry(id, role, geometry) {
                Some(feature) => FeatureOutcome::Ready(feature),
                None => FeatureOutcome::Skipped(SkipReason::Empty),
            },
            Prepared::Repaired(geometry) => match Self::from_geometry(id, role, geometry) {
                Some(feature) => FeatureOutcome::Repaired(feature),
                None => FeatureOutcome::Skipped(SkipReason::Empty),
            },
            Prepared::Unusable(reason) => FeatureOutcome::Skipped(reason),
        }
    }

    /// Build a feature from an already valid geometry. Returns `None` when
    /// the geometry has no bounding box or a non-finite one.
    pub fn from_geometry(id: &str, role: Role, geometry: MultiPolygon<f64>) -> Option<Self> {
        let bbox = geometry::bounding_box(&geometry).filter(BoundingBox2D::is_finite)?;
        let area = geometry::area(&geometry);

        Some(Self {
            id: Arc::from(id),
            role,
            geometry,
            area,
            bbox,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Shared handle to the identifier, cheap to clone into key sets.
    pub fn shared_id(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn bbox(&self) -> &BoundingBox2D {
        &self.bbox
    }
}
