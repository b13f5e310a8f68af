use serde::{Deserialize, Serialize};

/// One distinct intersecting `(id_a, id_b)` pair.
///
/// This is both the unit of deduplication and the unit of output: a finished
/// join holds at most one record per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionRecord {
    pub id_a: String,
    pub id_b: String,
    /// Full area of the A-side feature
    pub area_a: f64,
    /// Full area of the B-side feature
    pub area_b: f64,
    pub intersection_area: f64,
}

impl IntersectionRecord {
    pub fn new(
        id_a: impl Into<String>,
        id_b: impl Into<String>,
        area_a: f64,
        area_b: f64,
        intersection_area: f64,
    ) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            area_a,
            area_b,
            intersection_area,
        }
    }

    /// Deduplication key.
    pub fn key(&self) -> (&str, &str) {
        (&self.id_a, &self.id_b)
    }
}
