//! Spreadsheet-backed store for registration rows.
//!
//! A workbook holds named sheets of ordered rows. Each cell carries its value
//! and a number format, so columns like phone numbers can be pinned to text
//! and never reinterpreted as numbers or formulas.
use crate::record::RegistrationRecord;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Header labels, in column order.
pub const HEADER_ROW: [&str; 7] = [
    "Full Name",
    "Phone Number",
    "Email",
    "User Type",
    "Reason for Learning AI",
    "Preferred Date",
    "Signup Timestamp",
];

/// Number format of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum CellFormat {
    #[default]
    #[serde(rename = "General")]
    General,
    /// Plain text (`@`).
    #[serde(rename = "@")]
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cell {
    pub value: String,
    #[serde(default)]
    pub format: CellFormat,
}

impl Cell {
    pub fn general(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: CellFormat::General,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: CellFormat::Text,
        }
    }
}

/// Header row cells.
pub fn header_cells() -> Vec<Cell> {
    HEADER_ROW.iter().map(|label| Cell::general(*label)).collect()
}

/// Cells for one record in fixed column order; the phone cell is text.
pub fn record_cells(record: &RegistrationRecord) -> Vec<Cell> {
    vec![
        Cell::general(&record.full_name),
        Cell::text(&record.phone_number),
        Cell::general(&record.email),
        Cell::general(record.user_type.as_str()),
        Cell::general(&record.reason),
        Cell::general(&record.preferred_date),
        Cell::general(&record.signup_timestamp),
    ]
}

/// Target store for delivered rows.
pub trait SheetStore: Send + Sync {
    /// Open the store, failing when it is unreachable.
    fn open(&self) -> Result<()>;
    /// Number of rows in `sheet`, creating an empty sheet when missing.
    fn last_row(&self, sheet: &str) -> Result<usize>;
    /// Append one row after the current last row.
    fn append_row(&self, sheet: &str, cells: &[Cell]) -> Result<()>;
    /// Read back all rows of `sheet`.
    fn rows(&self, sheet: &str) -> Result<Vec<Vec<Cell>>>;
}

/// One JSON-lines file per sheet under a workbook directory.
#[derive(Debug)]
pub struct FileWorkbook {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileWorkbook {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sheet_path(&self, sheet: &str) -> Result<PathBuf> {
        let valid = !sheet.trim().is_empty()
            && sheet
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '-' | '_'));
        if !valid {
            return Err(anyhow!("invalid sheet name {sheet:?}"));
        }
        Ok(self.root.join(format!("{sheet}.jsonl")))
    }
}

impl SheetStore for FileWorkbook {
    fn open(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("open workbook {}", self.root.display()))?;
        if !self.root.is_dir() {
            return Err(anyhow!("workbook {} is not a directory", self.root.display()));
        }
        Ok(())
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        let path = self.sheet_path(sheet)?;
        if !path.exists() {
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("insert sheet {}", path.display()))?;
            return Ok(0);
        }
        Ok(self.rows(sheet)?.len())
    }

    fn append_row(&self, sheet: &str, cells: &[Cell]) -> Result<()> {
        let path = self.sheet_path(sheet)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("workbook write lock poisoned"))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let line = serde_json::to_string(cells).context("serialize sheet row")?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        file.write_all(b"\n")
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    fn rows(&self, sheet: &str) -> Result<Vec<Vec<Cell>>> {
        let path = self.sheet_path(sheet)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let mut rows = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: Vec<Cell> = serde_json::from_str(&line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?;
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Workbook held in memory; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Mutex<BTreeMap<String, Vec<Vec<Cell>>>>,
}

impl MemoryWorkbook {
    fn with_sheets<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Vec<Vec<Cell>>>) -> T,
    ) -> Result<T> {
        let mut sheets = self
            .sheets
            .lock()
            .map_err(|_| anyhow!("workbook lock poisoned"))?;
        Ok(f(&mut sheets))
    }
}

impl SheetStore for MemoryWorkbook {
    fn open(&self) -> Result<()> {
        Ok(())
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        self.with_sheets(|sheets| sheets.entry(sheet.to_string()).or_default().len())
    }

    fn append_row(&self, sheet: &str, cells: &[Cell]) -> Result<()> {
        self.with_sheets(|sheets| {
            sheets
                .entry(sheet.to_string())
                .or_default()
                .push(cells.to_vec())
        })
    }

    fn rows(&self, sheet: &str) -> Result<Vec<Vec<Cell>>> {
        self.with_sheets(|sheets| sheets.get(sheet).cloned().unwrap_or_default())
    }
}
