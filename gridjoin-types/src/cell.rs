use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of one grid cell.
///
/// Cells are always addressed by an explicit `(row, col)` pair, never by a
/// formatted string. `row` indexes the y axis and `col` the x axis, both in
/// `[0, N-1]`. Ordering is row-major.
///
/// # Examples
///
/// ```
/// use gridjoin_types::cell::CellId;
///
/// let a = CellId::new(0, 3);
/// let b = CellId::new(1, 0);
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub row: u32,
    pub col: u32,
}

impl CellId {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row {}, col {})", self.row, self.col)
    }
}

/// Error returned when a `row:col` cell literal is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCellIdError(String);

impl fmt::Display for ParseCellIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cell '{}', expected row:col", self.0)
    }
}

impl std::error::Error for ParseCellIdError {}

/// Parse a plain decimal index: digits only, no sign, no padding.
pub fn parse_index(text: &str) -> Option<u32> {
    let canonical = text == "0" || (!text.starts_with('0') && !text.is_empty());
    if !canonical || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parses `row:col`, e.g. `"3:12"`.
impl FromStr for CellId {
    type Err = ParseCellIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseCellIdError(s.to_string());
        let (row, col) = s.trim().split_once(':').ok_or_else(error)?;
        let row = parse_index(row).ok_or_else(error)?;
        let col = parse_index(col).ok_or_else(error)?;
        Ok(CellId::new(row, col))
    }
}

/// Inclusive rectangular block of cells covered by one bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl CellRange {
    /// Number of cells in the block. An inverted range holds none.
    pub fn len(&self) -> usize {
        let rows = (self.end_row as usize + 1).saturating_sub(self.start_row as usize);
        let cols = (self.end_col as usize + 1).saturating_sub(self.start_col as usize);
        rows * cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, cell: CellId) -> bool {
        (self.start_row..=self.end_row).contains(&cell.row)
            && (self.start_col..=self.end_col).contains(&cell.col)
    }

    /// Iterate the cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = CellId> + use<> {
        let range = *self;
        (range.start_row..=range.end_row).flat_map(move |row| {
            (range.start_col..=range.end_col).map(move |col| CellId::new(row, col))
        })
    }
}

/// Which of the two compared collections a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    A,
    B,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => f.write_str("A"),
            Role::B => f.write_str("B"),
        }
    }
}
