//! Directory-backed partition store.
//!
//! Layout:
//!
//! ```text
//! <root>/<collection>/grid.json              grid the collection was built with
//! <root>/<collection>/row-<r>_col-<c>.cell   one append-only file per cell
//! ```
//!
//! A cell file starts with a magic header and a version byte, followed by
//! frames of `u64 id length, id bytes, u64 text length, text bytes`, all
//! little-endian.

use super::{PartitionStore, StoredFeature};
use crate::config::GridConfig;
use crate::error::{GridJoinError, Result};
use gridjoin_types::cell::{CellId, parse_index};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

const CELL_MAGIC: &[u8] = b"GRIDJOIN_CELL";
const CELL_VERSION: u8 = 1;
const MANIFEST: &str = "grid.json";
const CELL_EXTENSION: &str = "cell";

/// Upper bound on a single id or geometry frame.
const MAX_FRAME_LEN: u64 = 1 << 30;

pub struct FsPartitionStore {
    root: PathBuf,
}

impl FsPartitionStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        validate_collection_name(collection)?;
        Ok(self.root.join(collection))
    }

    fn existing_collection_dir(&self, collection: &str) -> Result<PathBuf> {
        let dir = self.collection_dir(collection)?;
        if !dir.join(MANIFEST).is_file() {
            return Err(GridJoinError::CollectionNotFound(collection.to_string()));
        }
        Ok(dir)
    }
}

impl PartitionStore for FsPartitionStore {
    fn init(&self, collection: &str, grid: &GridConfig) -> Result<()> {
        let dir = self.collection_dir(collection)?;
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let manifest = serde_json::to_string_pretty(grid)?;
        fs::write(dir.join(MANIFEST), manifest)?;
        log::debug!("Initialised collection '{}' in {}", collection, dir.display());
        Ok(())
    }

    fn append(&self, collection: &str, cell: CellId, features: &[StoredFeature]) -> Result<()> {
        let dir = self.existing_collection_dir(collection)?;
        let path = dir.join(cell_file_name(cell));

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut writer = BufWriter::new(file);

        if fresh {
            writer.write_all(CELL_MAGIC)?;
            writer.write_all(&[CELL_VERSION])?;
        }

        for feature in features {
            write_frame(&mut writer, feature.id.as_bytes())?;
            write_frame(&mut writer, feature.geometry.as_bytes())?;
        }

        writer.flush()?;
        Ok(())
    }

    fn cells(&self, collection: &str) -> Result<BTreeSet<CellId>> {
        let dir = self.existing_collection_dir(collection)?;
        let mut cells = BTreeSet::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(cell) = name.to_str().and_then(parse_cell_file_name) else {
                continue;
            };
            if entry.metadata()?.len() > (CELL_MAGIC.len() + 1) as u64 {
                cells.insert(cell);
            }
        }

        Ok(cells)
    }

    fn load(&self, collection: &str, cell: CellId) -> Result<Vec<StoredFeature>> {
        let dir = self.existing_collection_dir(collection)?;
        let path = dir.join(cell_file_name(cell));

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);

        let mut magic = vec![0u8; CELL_MAGIC.len()];
        read_exact_or_corrupt(&mut reader, &mut magic, &path)?;
        if magic != CELL_MAGIC {
            return Err(GridJoinError::InvalidFormat(format!(
                "{} is not a cell file",
                path.display()
            )));
        }

        let mut version = [0u8; 1];
        read_exact_or_corrupt(&mut reader, &mut version, &path)?;
        if version[0] != CELL_VERSION {
            return Err(GridJoinError::InvalidFormat(format!(
                "{} has unsupported version {}",
                path.display(),
                version[0]
            )));
        }

        let mut features = Vec::new();
        while !reader.fill_buf()?.is_empty() {
            let id = read_frame(&mut reader, &path)?;
            let geometry = read_frame(&mut reader, &path)?;
            features.push(StoredFeature { id, geometry });
        }

        Ok(features)
    }

    fn grid_config(&self, collection: &str) -> Result<GridConfig> {
        let dir = self.existing_collection_dir(collection)?;
        let text = fs::read_to_string(dir.join(MANIFEST))?;
        let grid: GridConfig = serde_json::from_str(&text)?;
        Ok(grid)
    }

    fn contains(&self, collection: &str) -> Result<bool> {
        Ok(self.collection_dir(collection)?.join(MANIFEST).is_file())
    }

    fn collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().join(MANIFEST).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// File name of a cell group, with both axes named explicitly.
pub fn cell_file_name(cell: CellId) -> String {
    format!("row-{}_col-{}.{}", cell.row, cell.col, CELL_EXTENSION)
}

/// Strict inverse of [`cell_file_name`]. Anything else is not a cell file.
pub fn parse_cell_file_name(name: &str) -> Option<CellId> {
    let stem = name.strip_suffix(CELL_EXTENSION)?.strip_suffix('.')?;
    let (row, col) = stem.split_once('_')?;
    let row = parse_index(row.strip_prefix("row-")?)?;
    let col = parse_index(col.strip_prefix("col-")?)?;
    Some(CellId::new(row, col))
}

fn validate_collection_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(GridJoinError::InvalidInput(format!(
            "Collection name '{}' must be non-empty and use only letters, digits, '-', '_' or '.'",
            name
        )))
    }
}

fn write_frame<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_frame<R: Read>(reader: &mut R, path: &Path) -> Result<String> {
    let mut len = [0u8; 8];
    read_exact_or_corrupt(reader, &mut len, path)?;
    let len = u64::from_le_bytes(len);
    if len > MAX_FRAME_LEN {
        return Err(GridJoinError::InvalidFormat(format!(
            "{} has an oversized frame of {} bytes",
            path.display(),
            len
        )));
    }

    let mut buf = vec![0u8; len as usize];
    read_exact_or_corrupt(reader, &mut buf, path)?;
    String::from_utf8(buf).map_err(|_| {
        GridJoinError::InvalidFormat(format!("{} holds a non UTF-8 frame", path.display()))
    })
}

fn read_exact_or_corrupt<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(GridJoinError::InvalidFormat(
            format!("{} is truncated", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}
