//! Boundary to the polygon geometry primitives.
//!
//! Parsing goes through `geozero` (WKT), everything else through `geo`'s
//! algorithms. Outcomes are values rather than errors: a geometry is either
//! usable as parsed, usable after one repair, or unusable with a reason.

use geo::{Area, BooleanOps, BoundingRect, Geometry, Intersects, MultiPolygon, Validation};
use geozero::ToGeo;
use geozero::wkt::Wkt;
use gridjoin_types::bbox::BoundingBox2D;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Geometry text shorter than this is treated as degenerate without parsing.
pub const MIN_GEOMETRY_TEXT_LEN: usize = 10;

/// Why an entry could not become a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Empty or too short to be a polygon
    Degenerate,
    Unparsable,
    /// Parsed, but not a polygon or multipolygon
    NotPolygonal,
    Empty,
    /// Still invalid after repair
    Invalid,
    /// Coordinates are NaN or infinite
    NonFinite,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Degenerate => "degenerate geometry text",
            SkipReason::Unparsable => "unparsable geometry text",
            SkipReason::NotPolygonal => "geometry is not polygonal",
            SkipReason::Empty => "geometry is empty",
            SkipReason::Invalid => "geometry is invalid after repair",
            SkipReason::NonFinite => "geometry has non-finite coordinates",
        };
        f.write_str(text)
    }
}

/// Three-way result of preparing raw geometry text.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    Valid(MultiPolygon<f64>),
    Repaired(MultiPolygon<f64>),
    Unusable(SkipReason),
}

/// Parse WKT into a multipolygon. Polygons are wrapped; rectangles and
/// triangles are converted; other geometry types are rejected.
pub fn parse_polygonal(text: &str) -> Result<MultiPolygon<f64>, SkipReason> {
    let text = text.trim();
    if text.len() < MIN_GEOMETRY_TEXT_LEN {
        return Err(SkipReason::Degenerate);
    }

    let geometry = Wkt(text).to_geo().map_err(|_| SkipReason::Unparsable)?;

    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        Geometry::MultiPolygon(multi) => Ok(multi),
        Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
        Geometry::Triangle(triangle) => Ok(MultiPolygon::new(vec![triangle.to_polygon()])),
        _ => Err(SkipReason::NotPolygonal),
    }
}

/// Best-effort validity repair.
///
/// Runs the geometry through a union with the empty set, which re-nodes
/// self-intersections and normalizes ring orientation (the overlay
/// equivalent of a zero-width buffer). Returns `None` if the overlay faults.
pub fn repair(geometry: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    guarded(|| geometry.union(&MultiPolygon::<f64>::new(Vec::new())))
}

/// Run an overlay operation, turning a panic inside it into `None`.
///
/// The overlay primitive can fault on pathological input; one bad pair must
/// not end a whole run.
pub fn guarded<T>(op: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(op)).ok()
}

/// Parse, validate and (at most once) repair raw geometry text.
///
/// # Examples
///
/// ```
/// use gridjoin::compute::geometry::{prepare, Prepared, SkipReason};
///
/// assert!(matches!(
///     prepare("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))"),
///     Prepared::Valid(_)
/// ));
/// assert_eq!(prepare("POLY"), Prepared::Unusable(SkipReason::Degenerate));
/// assert_eq!(prepare("POINT(1 2)"), Prepared::Unusable(SkipReason::NotPolygonal));
/// ```
pub fn prepare(text: &str) -> Prepared {
    let geometry = match parse_polygonal(text) {
        Ok(geometry) => geometry,
        Err(reason) => return Prepared::Unusable(reason),
    };

    if is_empty(&geometry) {
        return Prepared::Unusable(SkipReason::Empty);
    }

    if !has_finite_coords(&geometry) {
        return Prepared::Unusable(SkipReason::NonFinite);
    }

    if geometry.is_valid() {
        return Prepared::Valid(geometry);
    }

    match repair(&geometry) {
        Some(fixed) if is_empty(&fixed) => Prepared::Unusable(SkipReason::Empty),
        Some(fixed) if fixed.is_valid() => Prepared::Repaired(fixed),
        _ => Prepared::Unusable(SkipReason::Invalid),
    }
}

pub fn bounding_box(geometry: &MultiPolygon<f64>) -> Option<BoundingBox2D> {
    geometry.bounding_rect().map(BoundingBox2D::from_rect)
}

pub fn area(geometry: &MultiPolygon<f64>) -> f64 {
    geometry.unsigned_area()
}

/// Area of the intersection of two geometries.
///
/// Returns `Some(0.0)` for disjoint inputs and `None` when the overlay
/// primitive faults; callers treat a fault as "no intersection".
pub fn intersection_area(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Option<f64> {
    guarded(|| {
        if !a.intersects(b) {
            return 0.0;
        }
        a.intersection(b).unsigned_area()
    })
}

fn is_empty(geometry: &MultiPolygon<f64>) -> bool {
    geometry.iter().all(|polygon| polygon.exterior().0.is_empty())
}

fn has_finite_coords(geometry: &MultiPolygon<f64>) -> bool {
    geometry.iter().all(|polygon| {
        polygon
            .exterior()
            .coords()
            .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
            .all(|coord| coord.x.is_finite() && coord.y.is_finite())
    })
}
