use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box.
///
/// Represents a rectangular area defined by minimum and maximum coordinates.
/// Used both for the cached envelope of a feature and for the global grid
/// extent and query rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox2D {
    /// Minimum x coordinate
    pub min_x: f64,
    /// Minimum y coordinate
    pub min_y: f64,
    /// Maximum x coordinate
    pub max_x: f64,
    /// Maximum y coordinate
    pub max_y: f64,
}

impl BoundingBox2D {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// # Arguments
    ///
    /// * `min_x` - Minimum longitude/x coordinate
    /// * `min_y` - Minimum latitude/y coordinate
    /// * `max_x` - Maximum longitude/x coordinate
    /// * `max_y` - Maximum latitude/y coordinate
    ///
    /// # Examples
    ///
    /// ```
    /// use gridjoin_types::bbox::BoundingBox2D;
    ///
    /// let bbox = BoundingBox2D::new(-74.0, 40.7, -73.9, 40.8);
    /// assert!((bbox.width() - 0.1).abs() < 1e-9);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Convert into a `geo::Rect`.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            geo::coord! { x: self.min_x, y: self.min_y },
            geo::coord! { x: self.max_x, y: self.max_y },
        )
    }

    /// Get the width of the bounding box.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Get the height of the bounding box.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// True when all four bounds are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Check if this bounding box intersects with another.
    ///
    /// Boxes that only share an edge or a corner intersect.
    pub fn intersects(&self, other: &BoundingBox2D) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// Check if `other` lies entirely inside this bounding box.
    pub fn contains(&self, other: &BoundingBox2D) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Smallest bounding box containing both boxes.
    pub fn union(&self, other: &BoundingBox2D) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}

impl From<Rect> for BoundingBox2D {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}
