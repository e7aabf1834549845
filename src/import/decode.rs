//! Decode an uploaded table into headers and string rows.

use super::{ImportError, ImportResult};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde::Serialize;
use std::{collections::HashMap, io::Cursor, path::Path};

/// Largest accepted import file (5 MiB).
pub const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
}

impl SourceFormat {
    /// Pick the decoder from the file extension (case-insensitive).
    pub fn detect(file_name: &str) -> ImportResult<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(SourceFormat::Spreadsheet),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// One source row: header -> trimmed cell text, plus its line in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// 1-based line (CSV) or sheet row number the record starts on.
    pub line: usize,
    pub cells: HashMap<String, String>,
}

impl ImportRow {
    /// Cell under `header`, or `""` when the row has no such cell.
    pub fn get(&self, header: &str) -> &str {
        self.cells.get(header).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct DecodedTable {
    pub format: SourceFormat,
    /// Non-empty headers in file order.
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
}

impl DecodedTable {
    pub fn has_header(&self, header: &str) -> bool {
        self.headers.iter().any(|h| h == header)
    }
}

/// Decode `bytes` according to the extension of `file_name`.
pub fn decode(file_name: &str, bytes: &[u8]) -> ImportResult<DecodedTable> {
    if bytes.len() > MAX_IMPORT_BYTES {
        return Err(ImportError::FileTooLarge {
            size: bytes.len(),
            max: MAX_IMPORT_BYTES,
        });
    }

    let format = SourceFormat::detect(file_name)?;
    let (headers, records) = match format {
        SourceFormat::Csv => read_csv(bytes)?,
        SourceFormat::Spreadsheet => read_spreadsheet(bytes)?,
    };

    let table = build_table(format, headers, records);
    if table.rows.iter().all(ImportRow::is_blank) {
        return Err(ImportError::EmptyFile);
    }

    tracing::debug!(
        "decoded {} with {} headers and {} rows",
        file_name,
        table.headers.len(),
        table.rows.len()
    );
    Ok(table)
}

type RawRecords = Vec<(usize, Vec<String>)>;

fn read_csv(bytes: &[u8]) -> ImportResult<(Vec<String>, RawRecords)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|err| ImportError::Malformed(err.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ImportError::Malformed(err.to_string()))?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(records.len() + 2);
        records.push((line, record.iter().map(str::to_string).collect()));
    }

    Ok((headers, records))
}

fn read_spreadsheet(bytes: &[u8]) -> ImportResult<(Vec<String>, RawRecords)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| ImportError::Malformed(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::EmptyFile)?
        .map_err(|err| ImportError::Malformed(err.to_string()))?;

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(cells) => cells.iter().map(cell_text).collect(),
        None => return Err(ImportError::EmptyFile),
    };

    let records = rows
        .enumerate()
        .map(|(i, cells)| {
            // header sits on `first_row`, 0-based; lines are 1-based
            (first_row + i + 2, cells.iter().map(cell_text).collect())
        })
        .collect();

    Ok((headers, records))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn build_table(format: SourceFormat, raw_headers: Vec<String>, records: RawRecords) -> DecodedTable {
    let headers: Vec<String> = raw_headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { &h };
            h.trim().to_string()
        })
        .collect();

    let rows = records
        .into_iter()
        .map(|(line, values)| {
            let mut cells = HashMap::new();
            for (i, header) in headers.iter().enumerate() {
                if header.is_empty() {
                    continue;
                }
                let value = values.get(i).map(|v| v.trim()).unwrap_or("");
                // first column wins when a header repeats
                cells
                    .entry(header.clone())
                    .or_insert_with(|| value.to_string());
            }
            ImportRow { line, cells }
        })
        .collect();

    let mut candidates = Vec::new();
    for header in headers {
        if !header.is_empty() && !candidates.contains(&header) {
            candidates.push(header);
        }
    }

    DecodedTable {
        format,
        headers: candidates,
        rows,
    }
}
