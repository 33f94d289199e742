//! Extraction boundary: pages and tables as handed over by the table-extraction
//! service. Read-only and format-agnostic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One extracted table: ordered rows of string cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTable {
    pub rows: Vec<Vec<String>>,
}

impl ExtractedTable {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build from string slices (handy for fixtures).
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Read a table delivered as CSV. Rows may have differing widths.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("csv record {}", i + 1))?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { rows })
    }

    pub fn from_csv_str(s: &str) -> Result<Self> {
        Self::from_csv_reader(s.as_bytes())
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_csv_reader(file).with_context(|| format!("reading {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub number: usize,
    /// Raw page text (titles, account details)
    pub text: String,
    pub tables: Vec<ExtractedTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

/// One table row with its position in the document.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    pub cells: &'a [String],
    pub page: usize,
    /// Index of the table on its page
    pub table: usize,
    /// Index of the row within its table
    pub position: usize,
}

impl RawRow<'_> {
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Single-page document wrapping one table.
    pub fn single_table(text: impl Into<String>, table: ExtractedTable) -> Self {
        Self {
            pages: vec![Page {
                number: 1,
                text: text.into(),
                tables: vec![table],
            }],
        }
    }

    pub fn first_page_text(&self) -> &str {
        self.pages.first().map_or("", |p| p.text.as_str())
    }

    /// First table anywhere in the document.
    pub fn first_table(&self) -> Option<&ExtractedTable> {
        self.pages.iter().flat_map(|p| p.tables.iter()).next()
    }

    pub fn raw_rows(&self) -> impl Iterator<Item = RawRow<'_>> {
        self.pages.iter().flat_map(|page| {
            page.tables.iter().enumerate().flat_map(move |(t, table)| {
                table.rows.iter().enumerate().map(move |(position, cells)| RawRow {
                    cells,
                    page: page.number,
                    table: t,
                    position,
                })
            })
        })
    }
}
