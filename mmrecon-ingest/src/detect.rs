//! Format detection: title strings first, then header tokens in the first table.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::document::Document;
use crate::layouts::{ColumnMap, Layout, LayoutSpec};

/// Rows at the top of the first table searched for a header.
const HEADER_SCAN_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectedBy {
    Title,
    Header,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub layout: Layout,
    pub via: DetectedBy,
}

/// Lower-case, punctuation to spaces, whitespace collapsed.
/// `"Receipt No."` -> `"receipt no"`, `"Credit/Debit"` -> `"credit debit"`.
pub fn normalize_header(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a header row onto a layout's columns.
///
/// Every declared column must be found, each in a distinct cell.
pub fn match_header(cells: &[String], spec: &LayoutSpec) -> Option<ColumnMap> {
    let normalized: Vec<String> = cells.iter().map(|c| normalize_header(c)).collect();
    let mut used = HashSet::new();
    let mut map = HashMap::new();

    for column in spec.columns {
        let idx = normalized
            .iter()
            .enumerate()
            .position(|(i, cell)| !used.contains(&i) && column.aliases.contains(&cell.as_str()))?;
        used.insert(idx);
        map.insert(column.field, idx);
    }
    Some(ColumnMap(map))
}

fn title_matches(text: &str, spec: &LayoutSpec) -> bool {
    let upper = text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    spec.titles.iter().any(|t| upper.contains(t))
}

/// Detect the layout of a document, or `None` when nothing matches.
pub fn detect_layout(doc: &Document) -> Option<Detection> {
    let text = doc.first_page_text();
    if let Some(layout) = Layout::ALL.into_iter().find(|l| title_matches(text, l.spec())) {
        debug!(layout = layout.name(), "layout detected from title");
        return Some(Detection {
            layout,
            via: DetectedBy::Title,
        });
    }

    let table = doc.first_table()?;
    for row in table.rows.iter().take(HEADER_SCAN_ROWS) {
        for layout in Layout::ALL {
            if match_header(row, layout.spec()).is_some() {
                debug!(layout = layout.name(), "layout detected from header row");
                return Some(Detection {
                    layout,
                    via: DetectedBy::Header,
                });
            }
        }
    }
    None
}
