//! Interchange formats for participants, winners and whole sessions.

pub mod delimited;
pub mod document;
pub mod spreadsheet;

pub use delimited::{export_delimited, parse_participant_records};
pub use document::{export_document, export_participant_list, export_session, import_session};
pub use spreadsheet::parse_spreadsheet;

use crate::error::{RaffleError, Result};
use crate::types::ParticipantRecord;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;

const BOM: char = '\u{feff}';

const ID_KEYWORDS: &[&str] = &["id", "employee", "รหัส"];
const NAME_KEYWORDS: &[&str] = &["name", "ชื่อ"];
const DEPARTMENT_KEYWORDS: &[&str] = &["department", "org_department", "แผนก"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// `.csv` and `.txt`
    Text,
    /// `.xlsx` and `.xls`
    Spreadsheet,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "csv" | "txt" => Ok(Self::Text),
            "xlsx" | "xls" => Ok(Self::Spreadsheet),
            _ => Err(RaffleError::UnsupportedFormat { extension }),
        }
    }
}

/// Column positions of the participant fields within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnMap {
    id: usize,
    name: usize,
    department: Option<usize>,
    /// Read the cell after `department` when it is blank.
    department_fallback: bool,
}

impl ColumnMap {
    pub(crate) const POSITIONAL: ColumnMap = ColumnMap {
        id: 0,
        name: 1,
        department: Some(2),
        department_fallback: true,
    };

    /// Map from a header row, each column falling back to its position
    /// when no keyword matches.
    pub(crate) fn from_header_or_positional(header: &[String]) -> Self {
        Self {
            id: find_column(header, ID_KEYWORDS).unwrap_or(0),
            name: find_column(header, NAME_KEYWORDS).unwrap_or(1),
            department: Some(find_column(header, DEPARTMENT_KEYWORDS).unwrap_or(2)),
            department_fallback: false,
        }
    }

    /// Whether any cell of `line` names a participant column.
    pub(crate) fn is_header(line: &[String]) -> bool {
        [ID_KEYWORDS, NAME_KEYWORDS, DEPARTMENT_KEYWORDS]
            .iter()
            .any(|keywords| find_column(line, keywords).is_some())
    }

    /// Build a record from one row, `None` when id or name is blank.
    pub(crate) fn record<S: AsRef<str>>(&self, cells: &[S]) -> Option<ParticipantRecord> {
        let cell = |i: usize| cells.get(i).map(|c| c.as_ref().trim()).unwrap_or_default();

        let id = cell(self.id);
        let name = cell(self.name);
        if id.is_empty() || name.is_empty() {
            return None;
        }

        let mut department = self.department.map(cell).unwrap_or_default();
        if department.is_empty() && self.department_fallback {
            department = self.department.map(|d| cell(d + 1)).unwrap_or_default();
        }

        Some(ParticipantRecord::new(id, name, department))
    }
}

fn find_column(header: &[String], keywords: &[&str]) -> Option<usize> {
    header.iter().position(|cell| {
        let cell = cell.trim().to_lowercase();
        keywords.iter().any(|k| names_keyword(&cell, k))
    })
}

/// ASCII keywords must be the whole cell or one of its words, so "David"
/// does not name an id column. Thai is written without spaces and is
/// matched anywhere in the cell.
fn names_keyword(cell: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return cell.contains(keyword);
    }

    cell == keyword
        || cell
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == keyword)
}

/// Drop repeated ids, keeping the first occurrence.
pub(crate) fn dedupe(records: Vec<ParticipantRecord>) -> Vec<ParticipantRecord> {
    let before = records.len();
    let mut seen = HashSet::new();
    let records: Vec<_> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if records.len() != before {
        tracing::warn!(
            "Dropped {} records with repeated ids",
            before - records.len()
        );
    }

    records
}

/// Read and parse a participant file, choosing the parser by extension.
pub async fn import_participants_file(path: &Path) -> Result<Vec<ParticipantRecord>> {
    let format = ImportFormat::from_path(path)?;

    let records = match format {
        ImportFormat::Text => {
            let bytes = tokio::fs::read(path).await?;
            parse_participant_records(&String::from_utf8_lossy(&bytes))
        }
        ImportFormat::Spreadsheet => {
            let bytes = tokio::fs::read(path).await?;
            parse_spreadsheet(bytes).await?
        }
    };

    if records.is_empty() {
        return Err(RaffleError::NoRecords);
    }

    tracing::info!(
        "Imported {} participants from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

pub fn winners_csv_file_name(date: NaiveDate) -> String {
    format!("raffle-winners-{}.csv", date.format("%Y-%m-%d"))
}

pub fn winners_json_file_name(date: NaiveDate) -> String {
    format!("raffle-winners-{}.json", date.format("%Y-%m-%d"))
}

pub fn session_file_name(date: NaiveDate) -> String {
    format!("raffle-data-{}.json", date.format("%Y-%m-%d"))
}

pub fn participant_list_file_name(date: NaiveDate) -> String {
    format!("employee-list-{}.json", date.format("%Y-%m-%d"))
}
