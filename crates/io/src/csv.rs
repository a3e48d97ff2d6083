// CSV import/export

use std::io::Read;
use std::path::Path;

use fingrid_engine::workbook::{ApplyResult, Workbook};

use crate::IoError;

/// Parse CSV text into the rectangular-row shape the engine imports.
/// The delimiter is sniffed from the first lines.
pub fn import_str(content: &str) -> Result<Vec<Vec<String>>, IoError> {
    import_str_with_delimiter(content, sniff_delimiter(content))
}

pub fn import_str_with_delimiter(
    content: &str,
    delimiter: u8,
) -> Result<Vec<Vec<String>>, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| IoError::Parse(e.to_string()))?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

/// Read a CSV file into a row matrix, sniffing the delimiter.
pub fn import(path: &Path) -> Result<Vec<Vec<String>>, IoError> {
    let content = read_file_as_utf8(path)?;
    import_str(&content)
}

/// Serialize a row matrix as comma-delimited CSV text.
///
/// Trailing empty fields are trimmed per row; empty rows keep a single
/// empty field so row positions survive a round trip.
pub fn export_str(rows: &[Vec<String>]) -> Result<String, IoError> {
    export_str_with_delimiter(rows, b',')
}

pub fn export_str_with_delimiter(rows: &[Vec<String>], delimiter: u8) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());

    for row in rows {
        if row.is_empty() {
            writer
                .write_record([""])
                .map_err(|e| IoError::Parse(e.to_string()))?;
            continue;
        }
        let end = row
            .iter()
            .rposition(|field| !field.is_empty())
            .map(|i| i + 1)
            .unwrap_or(1);
        writer
            .write_record(&row[..end])
            .map_err(|e| IoError::Parse(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Parse(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Parse(e.to_string()))
}

/// Write a row matrix to a CSV file.
pub fn export(rows: &[Vec<String>], path: &Path) -> Result<(), IoError> {
    let content = export_str(rows)?;
    std::fs::write(path, content).map_err(|e| IoError::Io(e.to_string()))
}

/// Import a CSV file into a workbook sheet, replacing its content region.
pub fn import_into(
    workbook: &mut Workbook,
    sheet_idx: usize,
    path: &Path,
) -> Result<ApplyResult, IoError> {
    let rows = import(path)?;
    Ok(workbook.import_rows(sheet_idx, &rows)?)
}

/// Export a workbook sheet's raw content to a CSV file.
pub fn export_sheet(workbook: &Workbook, sheet_idx: usize, path: &Path) -> Result<(), IoError> {
    let rows = workbook.export_rows(sheet_idx)?;
    export(&rows, path)
}

/// Detect the most likely field delimiter by checking consistency across
/// the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line.
/// The delimiter that produces the most consistent field count (>1 field)
/// wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (number of lines with same field count as line 1) * field_count
        // Higher field count breaks ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::Io(e.to_string()))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| IoError::Io(e.to_string()))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}
