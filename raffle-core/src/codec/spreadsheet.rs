use super::{dedupe, ColumnMap};
use crate::error::{RaffleError, Result};
use crate::types::ParticipantRecord;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

const YIELD_EVERY: usize = 1000;

/// Participants from the first sheet of an `.xlsx`/`.xls` workbook.
///
/// Row 0 is always the header. Columns are found by header keyword, each
/// falling back to position 0/1/2.
pub async fn parse_spreadsheet(bytes: Vec<u8>) -> Result<Vec<ParticipantRecord>> {
    let rows = tokio::task::spawn_blocking(move || read_first_sheet(bytes))
        .await
        .map_err(|e| RaffleError::internal(format!("spreadsheet task failed: {}", e)))??;

    Ok(parse_rows(rows).await)
}

fn read_first_sheet(bytes: Vec<u8>) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| RaffleError::spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RaffleError::spreadsheet("workbook has no sheets"))?
        .map_err(|e| RaffleError::spreadsheet(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

pub(crate) async fn parse_rows(rows: Vec<Vec<String>>) -> Vec<ParticipantRecord> {
    let mut rows = rows.into_iter();

    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let map = ColumnMap::from_header_or_positional(&header);

    let mut records = Vec::new();
    for (i, row) in rows.enumerate() {
        if let Some(record) = map.record(&row) {
            records.push(record);
        }

        if (i + 1) % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }

    dedupe(records)
}
