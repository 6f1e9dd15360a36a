//! Test data sheets
//!
//! Each sheet is a CSV file whose first column holds the test case id and
//! whose remaining columns hold named values for that case. Sheets are
//! searched in a configured order; the first sheet with a non-empty row for
//! the requested id wins.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// One test case's data: column key -> value.
pub type TestDataRow = HashMap<String, String>;

struct Sheet {
    name: String,
    rows: HashMap<String, TestDataRow>,
}

/// Ordered collection of test data sheets.
pub struct DataStore {
    sheets: Vec<Sheet>,
}

impl DataStore {
    /// Empty store; lookups find nothing. Useful for scenarios that only use
    /// literal values.
    pub fn empty() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Load sheets from `dir` in the order given by `sheet_order` (names
    /// without the `.csv` extension). Names missing on disk are skipped with
    /// a warning rather than failing the whole load: a suite may legitimately
    /// configure sheets it does not ship for every environment.
    pub fn load(dir: &Path, sheet_order: &[String]) -> Result<Self> {
        let mut sheets = Vec::new();
        for name in sheet_order {
            let path = dir.join(format!("{}.csv", name));
            if !path.exists() {
                log::warn!("Data sheet {} not found at {}", name, path.display());
                continue;
            }
            let sheet = load_sheet(name, &path)
                .with_context(|| format!("Failed to load data sheet: {}", path.display()))?;
            log::info!("Loaded data sheet '{}' with {} rows", name, sheet.rows.len());
            sheets.push(sheet);
        }

        let store = Self { sheets };
        store.warn_duplicate_ids();
        Ok(store)
    }

    /// First sheet containing a non-empty row for `test_case_id` wins.
    /// Returns the sheet name alongside the row for diagnostics. Absence
    /// across all sheets is "no data", not an error.
    pub fn row_for(&self, test_case_id: &str) -> Option<(&str, &TestDataRow)> {
        for sheet in &self.sheets {
            if let Some(row) = sheet.rows.get(test_case_id) {
                if row.values().any(|v| !v.trim().is_empty()) {
                    return Some((&sheet.name, row));
                }
            }
        }
        None
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Precedence when the same id appears in several sheets is first-wins;
    /// the later occurrences are ambiguous enough to be worth flagging.
    fn warn_duplicate_ids(&self) {
        for (i, sheet) in self.sheets.iter().enumerate() {
            for id in sheet.rows.keys() {
                for later in &self.sheets[i + 1..] {
                    if later.rows.contains_key(id) {
                        log::warn!(
                            "Test case id '{}' appears in sheet '{}' and again in '{}'; \
                             the row from '{}' takes precedence",
                            id,
                            sheet.name,
                            later.name,
                            sheet.name
                        );
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(sheets: Vec<(&str, Vec<(&str, Vec<(&str, &str)>)>)>) -> Self {
        let sheets = sheets
            .into_iter()
            .map(|(name, rows)| Sheet {
                name: name.to_string(),
                rows: rows
                    .into_iter()
                    .map(|(id, cols)| {
                        (
                            id.to_string(),
                            cols.into_iter()
                                .map(|(k, v)| (k.to_string(), v.to_string()))
                                .collect(),
                        )
                    })
                    .collect(),
            })
            .collect();
        Self { sheets }
    }
}

fn load_sheet(name: &str, path: &Path) -> Result<Sheet> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()
        .context("Sheet has no header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(0).map(str::trim).filter(|id| !id.is_empty()) else {
            continue;
        };
        let mut row = TestDataRow::new();
        for (header, value) in headers.iter().skip(1).zip(record.iter().skip(1)) {
            row.insert(header.clone(), value.trim().to_string());
        }
        rows.insert(id.to_string(), row);
    }

    Ok(Sheet {
        name: name.to_string(),
        rows,
    })
}
