//! On-disk table format.
//!
//! ```json
//! {
//!   "header": ["destination_id", "destination_label", "frequency", "source_id"],
//!   "rows": [["-1001234", "Deals", "daily", "7"]]
//! }
//! ```
//!
//! Rows are string arrays in header order. Tables written before labels were
//! tracked carry a three-column header without `destination_label`; they are
//! read with empty labels and rewritten with the full header.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    types::Subscription,
};

pub const DESTINATION_ID: &str = "destination_id";
pub const DESTINATION_LABEL: &str = "destination_label";
pub const FREQUENCY: &str = "frequency";
pub const SOURCE_ID: &str = "source_id";

/// Header written on every save.
pub const HEADER: [&str; 4] = [DESTINATION_ID, DESTINATION_LABEL, FREQUENCY, SOURCE_ID];

#[derive(Debug, Serialize, Deserialize)]
struct TableDocument {
    header: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

/// Column positions resolved from a header.
struct Columns {
    destination_id: usize,
    destination_label: Option<usize>,
    frequency: usize,
    source_id: usize,
    width: usize,
}

impl Columns {
    fn resolve(header: &[String]) -> Result<Self> {
        let position = |name: &str| header.iter().position(|h| h == name);
        if let Some(unknown) = header.iter().find(|h| !HEADER.contains(&h.as_str())) {
            return Err(Error::corrupt(format!("unexpected column '{unknown}'")));
        }
        let required = |name: &str| {
            position(name).ok_or_else(|| Error::corrupt(format!("missing column '{name}'")))
        };
        Ok(Self {
            destination_id: required(DESTINATION_ID)?,
            destination_label: position(DESTINATION_LABEL),
            frequency: required(FREQUENCY)?,
            source_id: required(SOURCE_ID)?,
            width: header.len(),
        })
    }

    fn row(&self, index: usize, cells: &[String]) -> Result<Subscription> {
        if cells.len() != self.width {
            return Err(Error::corrupt(format!(
                "row {index} has {} cells, header has {}",
                cells.len(),
                self.width
            )));
        }
        Ok(Subscription {
            destination_id: cells[self.destination_id].clone(),
            destination_label: self
                .destination_label
                .map(|i| cells[i].clone())
                .unwrap_or_default(),
            frequency: cells[self.frequency].parse()?,
            source_id: cells[self.source_id].clone(),
        })
    }
}

/// Serialize rows into the table document. The header is always present.
pub fn encode(rows: &[Subscription]) -> Result<String> {
    let doc = TableDocument {
        header: HEADER.iter().map(|h| (*h).to_string()).collect(),
        rows: rows
            .iter()
            .map(|s| {
                vec![
                    s.destination_id.clone(),
                    s.destination_label.clone(),
                    s.frequency.as_str().to_string(),
                    s.source_id.clone(),
                ]
            })
            .collect(),
    };
    let mut json = serde_json::to_string_pretty(&doc)?;
    json.push('\n');
    Ok(json)
}

/// Parse a table document, validating its header and every row.
pub fn decode(raw: &str) -> Result<Vec<Subscription>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc: TableDocument = serde_json::from_str(raw)?;
    let columns = Columns::resolve(&doc.header)?;
    doc.rows
        .iter()
        .enumerate()
        .map(|(i, cells)| columns.row(i, cells))
        .collect()
}
