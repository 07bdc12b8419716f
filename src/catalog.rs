use crate::config::CSV_BUFFER_SIZE;
use crate::models::CatalogEntry;
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use indicatif::ProgressBar;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Header names accepted for the article column, compared case-insensitively.
pub const ARTICLE_COLUMNS: &[&str] = &["article", "sku", "part_number", "article_number", "part"];

/// Header names accepted for the brand column, compared case-insensitively.
pub const BRAND_COLUMNS: &[&str] = &["brand", "manufacturer", "make"];

/// Index of the first header matching any of `names`.
pub fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}

/// Reads catalog rows from any CSV source; `source` is recorded as provenance.
pub fn read_catalog<R: Read>(reader: R, source: &str) -> Result<Vec<CatalogEntry>> {
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .buffer_capacity(CSV_BUFFER_SIZE)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header of catalog {}", source))?
        .clone();
    let Some(article_col) = find_column(&headers, ARTICLE_COLUMNS) else {
        bail!("Catalog {} has no article column (expected one of {:?})", source, ARTICLE_COLUMNS);
    };
    let Some(brand_col) = find_column(&headers, BRAND_COLUMNS) else {
        bail!("Catalog {} has no brand column (expected one of {:?})", source, BRAND_COLUMNS);
    };

    let mut entries = Vec::new();
    let mut incomplete = 0u64;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Bad CSV row {} in {}", row + 2, source))?;
        let article = record.get(article_col).unwrap_or("");
        let brand = record.get(brand_col).unwrap_or("");
        if article.is_empty() || brand.is_empty() {
            incomplete += 1;
            continue;
        }
        entries.push(CatalogEntry::new(article, brand).with_source(source));
    }

    if incomplete > 0 {
        warn!(source, rows = incomplete, "Skipped catalog rows with empty article or brand");
    }

    Ok(entries)
}

pub fn load_catalog_file(path: &Path) -> Result<Vec<CatalogEntry>> {
    let file = File::open(path).with_context(|| format!("Failed to open catalog: {:?}", path))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    read_catalog(file, &source)
}

/// Loads every existing catalog file; missing files are logged and skipped.
pub fn load_catalogs(paths: &[PathBuf]) -> Result<Vec<CatalogEntry>> {
    let pb = ProgressBar::new_spinner();
    let mut entries = Vec::new();

    for path in paths {
        if !path.exists() {
            warn!(path = ?path, "Catalog file not found");
            continue;
        }
        info!(path = ?path, "Loading catalog");
        let rows = load_catalog_file(path)?;
        info!(path = ?path, rows = rows.len(), "Catalog loaded");
        entries.extend(rows);
        pb.set_message(format!("{} catalog rows", entries.len()));
        pb.tick();
    }

    pb.finish_and_clear();
    Ok(entries)
}
