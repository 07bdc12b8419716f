//! Partscan: brand and part-article extraction from free-form product text
//!
//! Given reference catalogs of known (article, brand) pairs, partscan finds which of
//! those pairs are mentioned in product titles, descriptions and characteristics, and
//! records for every source record the first and all detected pairs.
//!
//! 1. **Catalog Pass** -- Load reference CSV rows, normalize and validate them, and
//!    build an immutable brand → articles index (optionally cached on disk)
//! 2. **Matching Pass** -- Normalize each record's text, find whitelisted brands, then
//!    the catalog articles registered under them; order matches by text offset
//! 3. **Write Pass** -- Upsert one result per record into SQLite, keyed by record id
//!
//! # Normalization
//!
//! Text and catalog values are compared in a canonical form: upper-case, Cyrillic
//! letters that look like Latin ones transliterated (`АВС` → `ABC`), hyphens removed.
//! `YB-1234`, `yb1234` and `УВ1234` all compare equal.
//!
//! # Key Modules
//!
//! - [`normalize`] -- Canonical form for brands, articles and text
//! - [`validate`] -- Article length rules and the brand whitelist
//! - [`index`] -- Brand → articles multimap built from catalog rows
//! - [`matcher`] -- Substring scan, ordering and per-record results
//! - [`dedup`] -- Order-preserving deduplication of match pairs
//! - [`pipeline`] -- Batched parallel matching feeding a result sink
//! - [`catalog`] -- Reference CSV loading
//! - [`source`] -- Source record reading and text composition
//! - [`store`] -- SQLite source texts and match results
//! - [`cache`] -- Index persistence keyed by catalog files and config
//! - [`config`] -- Constants and the validated run configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Match every text in the database against the default catalogs
//! VALID_BRANDS=YAMAHA,KAWASAKI,SUZUKI partscan run --db matches.db
//!
//! # Match a CSV of records instead of the source_texts table
//! partscan run --input products.csv --catalog data/boats_net_data.csv
//!
//! # Try a single text
//! partscan match "Деталь YAMAHA YB-1234 в наличии"
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod error;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod stats;
pub mod store;
pub mod validate;
