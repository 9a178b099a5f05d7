use super::{dedupe, ColumnMap, BOM};
use crate::types::{ParticipantRecord, Winner};

const EXPORT_HEADER: [&str; 5] = ["Rank", "ID", "Name", "Department", "Drawn At"];

/// Winners as comma separated text in rank order, prefixed with a BOM so
/// spreadsheet tools pick up non-ASCII names.
pub fn export_delimited(winners: &[Winner]) -> String {
    let mut sorted: Vec<&Winner> = winners.iter().collect();
    sorted.sort_by_key(|w| w.prize_rank);

    let mut out = String::new();
    out.push(BOM);
    out.push_str(&EXPORT_HEADER.join(","));

    for winner in sorted {
        let rank = winner.prize_rank.to_string();
        let row = [
            rank.as_str(),
            winner.id(),
            winner.name(),
            winner.department(),
            winner.display_timestamp.as_str(),
        ];

        out.push('\n');
        out.push_str(&row.map(quote).join(","));
    }

    out
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parse hand-edited participant lists.
///
/// Each line is split on commas if it has any, else on tabs, else on runs
/// of whitespace. A first line naming any participant column is treated as
/// a header: named columns are used and the rest fall back to position.
/// Otherwise every line is data and columns are positional.
/// Lines without both an id and a name are skipped.
pub fn parse_participant_records(text: &str) -> Vec<ParticipantRecord> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    let header = lines
        .peek()
        .map(|first| split_line(first))
        .filter(|cells| ColumnMap::is_header(cells));

    let map = match header {
        Some(cells) => {
            lines.next();
            ColumnMap::from_header_or_positional(&cells)
        }
        None => ColumnMap::POSITIONAL,
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for line in lines {
        match map.record(&split_line(line)) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} lines without id or name", skipped);
    }

    dedupe(records)
}

fn split_line(line: &str) -> Vec<String> {
    if line.contains(',') {
        split_quoted(line, ',')
    } else if line.contains('\t') {
        line.split('\t').map(|p| p.trim().to_string()).collect()
    } else {
        line.split_whitespace().map(String::from).collect()
    }
}

fn split_quoted(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            c => field.push(c),
        }
    }
    fields.push(field.trim().to_string());

    fields
}
