use crate::config::CSV_BUFFER_SIZE;
use crate::error::MatchError;
use crate::models::{MatchResult, SourceRecord};
use crate::source::build_record;
use anyhow::{Context, Result};
use csv::Writer;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS source_texts (
        id TEXT PRIMARY KEY,
        title TEXT,
        description TEXT,
        characteristics TEXT
    );

    CREATE TABLE IF NOT EXISTS article_matches (
        id TEXT PRIMARY KEY,
        first_article TEXT,
        first_brand TEXT,
        all_articles TEXT NOT NULL,
        all_brands TEXT NOT NULL,
        processed INTEGER NOT NULL,
        normalized_text TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
";

const UPSERT_MATCH: &str = "
    INSERT INTO article_matches (
        id, first_article, first_brand, all_articles, all_brands,
        processed, normalized_text, updated_at
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, CURRENT_TIMESTAMP)
    ON CONFLICT(id) DO UPDATE SET
        first_article = excluded.first_article,
        first_brand = excluded.first_brand,
        all_articles = excluded.all_articles,
        all_brands = excluded.all_brands,
        processed = excluded.processed,
        normalized_text = excluded.normalized_text,
        updated_at = excluded.updated_at";

const SELECT_MATCH_COLUMNS: &str = "
    SELECT id, first_article, first_brand, all_articles, all_brands, processed, normalized_text
    FROM article_matches";

/// Row of `article_matches` before the JSON list columns are decoded.
struct StoredRow {
    id: String,
    first_article: Option<String>,
    first_brand: Option<String>,
    all_articles: String,
    all_brands: String,
    processed: bool,
    normalized_text: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_article: row.get(1)?,
            first_brand: row.get(2)?,
            all_articles: row.get(3)?,
            all_brands: row.get(4)?,
            processed: row.get(5)?,
            normalized_text: row.get(6)?,
        })
    }

    fn decode(self) -> Result<MatchResult> {
        let all_articles = serde_json::from_str(&self.all_articles)
            .with_context(|| format!("Bad all_articles for {}", self.id))?;
        let all_brands = serde_json::from_str(&self.all_brands)
            .with_context(|| format!("Bad all_brands for {}", self.id))?;
        Ok(MatchResult {
            id: self.id,
            first_article: self.first_article,
            first_brand: self.first_brand,
            all_articles,
            all_brands,
            processed: self.processed,
            normalized_text: self.normalized_text,
        })
    }
}

/// SQLite database holding the source texts and the per-record match results.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create database schema")?;
        Ok(Self { conn })
    }

    /// Inserts or replaces results by id, all in one transaction.
    pub fn upsert_matches(&mut self, results: &[MatchResult]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_MATCH)?;
            for result in results {
                stmt.execute(params![
                    result.id,
                    result.first_article,
                    result.first_brand,
                    serde_json::to_string(&result.all_articles)?,
                    serde_json::to_string(&result.all_brands)?,
                    result.processed,
                    result.normalized_text,
                ])
                .with_context(|| format!("Failed to upsert match for {}", result.id))?;
            }
        }
        tx.commit().context("Failed to commit match batch")?;
        debug!(rows = results.len(), "Match batch upserted");
        Ok(results.len())
    }

    pub fn get_match(&self, id: &str) -> Result<Option<MatchResult>> {
        let sql = format!("{SELECT_MATCH_COLUMNS} WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], StoredRow::from_row)
            .optional()?;
        row.map(StoredRow::decode).transpose()
    }

    pub fn all_matches(&self) -> Result<Vec<MatchResult>> {
        let sql = format!("{SELECT_MATCH_COLUMNS} ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], StoredRow::from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?.decode()?);
        }
        Ok(results)
    }

    pub fn count_matches(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM article_matches", [], |row| row.get(0))?)
    }

    pub fn insert_source_text(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<&str>,
        characteristics: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO source_texts (id, title, description, characteristics)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, title, description, characteristics],
        )?;
        Ok(())
    }

    /// Up to `limit` source rows with a rowid above `after_rowid`, in rowid order.
    /// Rows without an id or any text come back as `MalformedRecord` errors.
    pub fn source_page(
        &self,
        after_rowid: i64,
        limit: usize,
    ) -> Result<Vec<(i64, Result<SourceRecord, MatchError>)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT rowid, id, title, description, characteristics
             FROM source_texts WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after_rowid, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut page = Vec::with_capacity(limit);
        for row in rows {
            let (rowid, id, title, description, characteristics) = row?;
            let parts = [title.as_deref(), description.as_deref(), characteristics.as_deref()];
            let record = build_record(id.as_deref(), parts, &format!("rowid {}", rowid));
            page.push((rowid, record));
        }
        Ok(page)
    }

    /// Writes every stored result to a CSV file. List columns hold the same JSON arrays
    /// as the table.
    pub fn export_csv(&self, path: &Path) -> Result<usize> {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = Writer::from_writer(BufWriter::with_capacity(CSV_BUFFER_SIZE, file));
        writer.write_record([
            "id",
            "first_article",
            "first_brand",
            "all_articles",
            "all_brands",
            "processed",
            "normalized_text",
        ])?;

        let results = self.all_matches()?;
        for r in &results {
            let articles = serde_json::to_string(&r.all_articles)?;
            let brands = serde_json::to_string(&r.all_brands)?;
            writer.write_record([
                r.id.as_str(),
                r.first_article.as_deref().unwrap_or(""),
                r.first_brand.as_deref().unwrap_or(""),
                articles.as_str(),
                brands.as_str(),
                if r.processed { "true" } else { "false" },
                r.normalized_text.as_str(),
            ])?;
        }

        writer.flush()?;
        Ok(results.len())
    }
}

/// Streams `source_texts` in keyset pages of `page_size` rows.
///
/// Owns its own store handle, so a run can read from one connection while upserting
/// through another. A failed page read is yielded once as `SourceRead` and ends the
/// stream.
pub struct SourcePages {
    store: SqliteStore,
    page_size: usize,
    remaining: usize,
    last_rowid: i64,
    buffered: std::vec::IntoIter<Result<SourceRecord, MatchError>>,
    exhausted: bool,
}

impl SourcePages {
    pub fn new(store: SqliteStore, page_size: usize, limit: Option<usize>) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            remaining: limit.unwrap_or(usize::MAX),
            last_rowid: 0,
            buffered: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    pub fn open(path: &Path, page_size: usize, limit: Option<usize>) -> Result<Self> {
        Ok(Self::new(SqliteStore::open(path)?, page_size, limit))
    }

    fn fetch(&mut self) -> Result<(), MatchError> {
        let want = self.page_size.min(self.remaining);
        if want == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let page = self
            .store
            .source_page(self.last_rowid, want)
            .map_err(|e| MatchError::SourceRead(format!("{e:#}")))?;

        if page.len() < want {
            self.exhausted = true;
        }
        self.remaining -= page.len();
        if let Some((rowid, _)) = page.last() {
            self.last_rowid = *rowid;
        }
        debug!(rows = page.len(), after = self.last_rowid, "Source page read");

        let records: Vec<_> = page.into_iter().map(|(_, record)| record).collect();
        self.buffered = records.into_iter();
        Ok(())
    }
}

impl Iterator for SourcePages {
    type Item = Result<SourceRecord, MatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffered.next() {
                return Some(record);
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
