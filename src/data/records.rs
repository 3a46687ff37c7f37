//! Crystal records and the sources they are read from
//!
//! Two layouts are supported:
//! - a directory with `id_prop.csv` (`id,target` rows) and one `<id>.cif`
//!   file per record
//! - an in-memory `RecordTable` with `id`, `target` and `cif` columns, the
//!   last holding CIF text

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{DataError, Result};
use crate::structure::Crystal;

/// Where a record's structure comes from
#[derive(Debug, Clone, PartialEq)]
pub enum StructureSource {
    /// Path to a CIF file
    File(PathBuf),
    /// CIF text
    Inline(String),
}

impl StructureSource {
    pub fn load(&self) -> Result<Crystal> {
        match self {
            Self::File(path) => Crystal::from_cif_file(path),
            Self::Inline(text) => Crystal::from_cif_str(text),
        }
    }
}

/// One training example
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalRecord {
    pub id: String,
    pub target: f64,
    pub source: StructureSource,
}

impl CrystalRecord {
    pub fn new(id: impl Into<String>, target: f64, source: StructureSource) -> Self {
        Self {
            id: id.into(),
            target,
            source,
        }
    }
}

/// Read `id,target` rows and pair each id with `<structure_dir>/<id>.<extension>`
pub fn read_id_prop<P: AsRef<Path>, D: AsRef<Path>>(
    path: P,
    structure_dir: D,
    extension: &str,
) -> Result<Vec<CrystalRecord>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| DataError::Config(format!("Cannot open {}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_fields(line);
        let [id, target] = fields.as_slice() else {
            return Err(DataError::Config(format!(
                "{}:{}: expected 'id,target', got {} fields in '{}'",
                path.display(),
                line_no + 1,
                fields.len(),
                line
            )));
        };
        if id.is_empty() {
            return Err(DataError::Config(format!(
                "{}:{}: empty id",
                path.display(),
                line_no + 1
            )));
        }
        let target = parse_target(target).map_err(|msg| {
            DataError::Config(format!("{}:{}: {}", path.display(), line_no + 1, msg))
        })?;

        let structure = structure_dir
            .as_ref()
            .join(format!("{}.{}", id, extension));
        records.push(CrystalRecord::new(id.as_str(), target, StructureSource::File(structure)));
    }

    Ok(records)
}

/// Split one delimited line into trimmed fields
///
/// Fields may be wrapped in double quotes, in which case commas inside them
/// are literal and `""` is an escaped quote.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn parse_target(raw: &str) -> std::result::Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| format!("target '{}' is not a number", raw))
}

/// In-memory table of named string columns
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    columns: Vec<(String, Vec<String>)>,
}

impl RecordTable {
    pub const ID_COLUMN: &'static str = "id";
    pub const TARGET_COLUMN: &'static str = "target";
    pub const CIF_COLUMN: &'static str = "cif";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column
    pub fn with_column<S: Into<String>>(mut self, name: impl Into<String>, values: Vec<S>) -> Self {
        let name = name.into();
        let values = values.into_iter().map(Into::into).collect();
        self.columns.retain(|(existing, _)| *existing != name);
        self.columns.push((name, values));
        self
    }

    /// Build a table from `(id, target, cif)` rows
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, f64, S)>,
        S: Into<String>,
    {
        let mut ids = Vec::new();
        let mut targets = Vec::new();
        let mut cifs = Vec::new();
        for (id, target, cif) in rows {
            ids.push(id.into());
            targets.push(target.to_string());
            cifs.push(cif.into());
        }
        Self::new()
            .with_column(Self::ID_COLUMN, ids)
            .with_column(Self::TARGET_COLUMN, targets)
            .with_column(Self::CIF_COLUMN, cifs)
    }

    /// Build a table from parallel `id`, `target` and `cif` columns
    pub fn from_columns(ids: Vec<String>, targets: Vec<f64>, cifs: Vec<String>) -> Result<Self> {
        if ids.len() != targets.len() || ids.len() != cifs.len() {
            return Err(DataError::Config(format!(
                "Record columns differ in length: id={}, target={}, cif={}",
                ids.len(),
                targets.len(),
                cifs.len()
            )));
        }
        Ok(Self::from_rows(
            ids.into_iter()
                .zip(targets)
                .zip(cifs)
                .map(|((id, target), cif)| (id, target, cif)),
        ))
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    /// Convert the `id`, `target` and `cif` columns into records
    pub fn records(&self) -> Result<Vec<CrystalRecord>> {
        let column = |name: &str| {
            self.column(name)
                .ok_or_else(|| DataError::Config(format!("Record table lacks column '{}'", name)))
        };
        let ids = column(Self::ID_COLUMN)?;
        let targets = column(Self::TARGET_COLUMN)?;
        let cifs = column(Self::CIF_COLUMN)?;

        if ids.len() != targets.len() || ids.len() != cifs.len() {
            return Err(DataError::Config(format!(
                "Record table columns differ in length: id={}, target={}, cif={}",
                ids.len(),
                targets.len(),
                cifs.len()
            )));
        }

        ids.iter()
            .zip(targets)
            .zip(cifs)
            .enumerate()
            .map(|(row, ((id, target), cif))| {
                let target = parse_target(target)
                    .map_err(|msg| DataError::Config(format!("row {}: {}", row, msg)))?;
                Ok(CrystalRecord::new(
                    id.clone(),
                    target,
                    StructureSource::Inline(cif.clone()),
                ))
            })
            .collect()
    }
}
