use crate::catalog::find_column;
use crate::config::CSV_BUFFER_SIZE;
use crate::error::MatchError;
use crate::models::SourceRecord;
use anyhow::{bail, Context, Result};
use csv::{Position, ReaderBuilder, StringRecordsIntoIter};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header names accepted for the record identifier.
pub const ID_COLUMNS: &[&str] = &["id", "record_id", "product_id"];

/// Text columns joined, in this order, into the text that gets matched.
pub const TEXT_COLUMNS: &[&str] = &["text", "title", "description", "characteristics"];

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Joins text components with single spaces, collapsing whitespace runs and skipping
/// blank components.
pub fn compose_text<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .map(|p| WHITESPACE_RUN.replace_all(p.trim(), " "))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds a record from an id and its text components. `location` names the record
/// in errors when the id itself is missing.
pub fn build_record<'a, I>(id: Option<&str>, parts: I, location: &str) -> Result<SourceRecord, MatchError>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let id = id.map(str::trim).unwrap_or("");
    if id.is_empty() {
        return Err(MatchError::malformed(location, "missing id"));
    }
    let text = compose_text(parts.into_iter().flatten());
    if text.is_empty() {
        return Err(MatchError::malformed(id, "no text field"));
    }
    Ok(SourceRecord {
        id: id.to_string(),
        text,
    })
}

/// Streams source records from a CSV file with an id column and one or more text
/// columns. Bad rows come out as `MalformedRecord` errors so the caller can skip them.
pub struct CsvRecords<R: Read> {
    records: StringRecordsIntoIter<R>,
    id_col: usize,
    text_cols: Vec<usize>,
}

impl<R: Read> CsvRecords<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .flexible(true)
            .buffer_capacity(CSV_BUFFER_SIZE)
            .from_reader(reader);

        let headers = csv_reader.headers().context("Failed to read source header")?.clone();
        let Some(id_col) = find_column(&headers, ID_COLUMNS) else {
            bail!("Source has no id column (expected one of {:?})", ID_COLUMNS);
        };
        let text_cols: Vec<usize> = TEXT_COLUMNS
            .iter()
            .filter_map(|name| find_column(&headers, &[name]))
            .collect();
        if text_cols.is_empty() {
            bail!("Source has no text column (expected any of {:?})", TEXT_COLUMNS);
        }

        Ok(Self {
            records: csv_reader.into_records(),
            id_col,
            text_cols,
        })
    }
}

impl CsvRecords<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open source: {:?}", path))?;
        Self::from_reader(file).with_context(|| format!("Invalid source file: {:?}", path))
    }
}

/// Physical line a record starts on; quoted fields may span several lines.
fn line_of(position: Option<&Position>) -> String {
    match position {
        Some(p) => format!("line {}", p.line()),
        None => "unknown line".to_string(),
    }
}

impl<R: Read> Iterator for CsvRecords<R> {
    type Item = Result<SourceRecord, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.records.next()? {
            Ok(row) => row,
            Err(e) => {
                let location = line_of(e.position());
                return Some(Err(MatchError::malformed(location, e.to_string())));
            }
        };
        let location = line_of(row.position());
        let parts = self.text_cols.iter().map(|&col| row.get(col));
        Some(build_record(row.get(self.id_col), parts, &location))
    }
}
