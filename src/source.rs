//! Feature sources: lazy, restartable sequences of `(id, geometry-text)`.
//!
//! Sources never judge geometry; malformed entries are passed through and
//! skipped by the partitioner. Only failing to open a source is an error.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One raw entry of a feature collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: String,
    pub geometry: String,
}

impl RawEntry {
    pub fn new(id: impl Into<String>, geometry: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
        }
    }
}

/// A restartable producer of raw entries for one collection.
///
/// Every call to [`entries`](FeatureSource::entries) starts from the
/// beginning of the collection.
pub trait FeatureSource: Send + Sync {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    fn entries(&self) -> Result<Box<dyn Iterator<Item = RawEntry> + Send + '_>>;
}

/// In-memory feature source.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    name: String,
    entries: Vec<RawEntry>,
}

impl VecSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Build from `(id, wkt)` pairs.
    ///
    /// ```
    /// use gridjoin::source::{FeatureSource, VecSource};
    ///
    /// let source = VecSource::from_pairs("a", [("1", "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))")]);
    /// assert_eq!(source.entries().unwrap().count(), 1);
    /// ```
    pub fn from_pairs<I, K, V>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            entries: pairs
                .into_iter()
                .map(|(id, geometry)| RawEntry::new(id, geometry))
                .collect(),
        }
    }

    pub fn push(&mut self, id: impl Into<String>, geometry: impl Into<String>) {
        self.entries.push(RawEntry::new(id, geometry));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FeatureSource for VecSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> Result<Box<dyn Iterator<Item = RawEntry> + Send + '_>> {
        Ok(Box::new(self.entries.iter().cloned()))
    }
}

/// Line-oriented `id,geometry` file.
///
/// The first comma separates the id from the geometry text, so WKT keeps its
/// own commas. A header line starting with `id,geometry` and blank lines are
/// ignored; one pair of surrounding double quotes is stripped from the
/// geometry.
#[derive(Debug, Clone)]
pub struct DelimitedFileSource {
    name: String,
    path: PathBuf,
}

impl DelimitedFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for DelimitedFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn entries(&self) -> Result<Box<dyn Iterator<Item = RawEntry> + Send + '_>> {
        let file = File::open(&self.path)?;
        let name = self.name.clone();
        let lines = BufReader::new(file).lines().map_while(move |line| match line {
            Ok(line) => Some(line),
            Err(e) => {
                log::warn!("Stopped reading {} after I/O error: {}", name, e);
                None
            }
        });
        Ok(Box::new(lines.filter_map(|line| parse_line(&line))))
    }
}

/// Split one `id,geometry` line. Returns `None` for headers, blank lines and
/// lines without a separator.
pub fn parse_line(line: &str) -> Option<RawEntry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("id,geometry") {
        return None;
    }

    let (id, geometry) = line.split_once(',')?;
    let id = id.trim().trim_matches('"');
    let mut geometry = geometry.trim();
    if geometry.len() >= 2 && geometry.starts_with('"') && geometry.ends_with('"') {
        geometry = &geometry[1..geometry.len() - 1];
    }

    Some(RawEntry::new(id, geometry))
}
