//! Integration tests for the partscan matching pipeline.
//!
//! These tests drive the whole flow from catalog CSV files and source records through
//! to the SQLite result table. Tests are organized into logical sections:
//!
//! - **Catalog Tests** -- CSV loading, header aliases, validation, missing files
//! - **Matching Tests** -- Normalization, brand scoping, ordering, deduplication
//! - **Pipeline Tests** -- Batched runs into SQLite, reprocessing, malformed records
//! - **Cache Tests** -- Index reuse and invalidation across runs
//!
//! # Sample Data
//!
//! `write_catalogs()` creates two catalogs in a TempDir:
//! - `boats_net_data.csv`: YAMAHA and KAWASAKI articles, plus rows that fail validation
//! - `partzilla_net_data.csv`: SUZUKI articles and an article shared with YAMAHA
//!
//! Each test uses its own TempDir.

use partscan::cache;
use partscan::catalog::load_catalogs;
use partscan::config::MatcherConfig;
use partscan::error::MatchError;
use partscan::index::ReferenceIndex;
use partscan::matcher::Matcher;
use partscan::normalize::normalize;
use partscan::pipeline::{run_pipeline, PipelineOptions};
use partscan::source::CsvRecords;
use partscan::store::{SourcePages, SqliteStore};
use partscan::validate::Validator;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper: write both sample catalogs and return their paths.
fn write_catalogs(dir: &TempDir) -> Vec<PathBuf> {
    let boats = dir.path().join("boats_net_data.csv");
    fs::write(
        &boats,
        "article,brand,price\n\
         YB-1234,Yamaha,10.5\n\
         KW9876,KAWASAKI,3\n\
         12,YAMAHA,1\n\
         HD123456,HONDA,4\n\
         ,YAMAHA,1\n\
         SH77777,yamaha,2\n",
    )
    .unwrap();

    let partzilla = dir.path().join("partzilla_net_data.csv");
    fs::write(
        &partzilla,
        "Part_Number,Manufacturer\n\
         SZ5555X,Suzuki\n\
         SH77777,SUZUKI\n\
         yb1234,YAMAHA\n",
    )
    .unwrap();

    vec![boats, partzilla]
}

fn build_matcher(catalogs: &[PathBuf], config: &MatcherConfig) -> Matcher {
    let entries = load_catalogs(catalogs).unwrap();
    let index = ReferenceIndex::build(entries, &Validator::new(config)).unwrap();
    Matcher::new(index, config).unwrap()
}

fn write_source(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("products.csv");
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Catalog Tests
// ============================================================================

#[test]
fn catalogs_build_validated_index() {
    let dir = TempDir::new().unwrap();
    let catalogs = write_catalogs(&dir);
    let config = MatcherConfig::default();

    let entries = load_catalogs(&catalogs).unwrap();
    assert_eq!(entries.len(), 8);

    let (index, report) =
        ReferenceIndex::build_with_report(entries, &Validator::new(&config)).unwrap();
    assert_eq!(report.invalid_article, 1);
    assert_eq!(report.invalid_brand, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.rows_kept, 5);
    assert_eq!(report.kept_by_source.get("boats_net_data.csv"), Some(&3));
    assert_eq!(report.kept_by_source.get("partzilla_net_data.csv"), Some(&2));

    assert_eq!(index.brands(), ["KAWASAKI", "SUZUKI", "YAMAHA"]);
    assert!(index.contains("YB-1234", "yamaha"));
    assert!(!index.contains("HD123456", "HONDA"));
    assert_eq!(index.brands_for_article("SH77777"), ["SUZUKI", "YAMAHA"]);
}

#[test]
fn missing_catalogs_abort_index_build() {
    let dir = TempDir::new().unwrap();
    let catalogs = vec![dir.path().join("absent.csv")];
    let entries = load_catalogs(&catalogs).unwrap();
    assert!(entries.is_empty());

    let err = ReferenceIndex::build(entries, &Validator::new(&MatcherConfig::default()))
        .unwrap_err();
    assert!(matches!(err, MatchError::IndexBuild(_)));
}

#[test]
fn catalog_without_brand_column_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "article,price\nYB1234,1\n").unwrap();
    assert!(load_catalogs(&[path]).is_err());
}

// ============================================================================
// Matching Tests
// ============================================================================

#[test]
fn cyrillic_and_hyphen_variants_match() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());

    assert_eq!(
        m.match_text("Деталь Yamaha УВ-1234 в наличии"),
        vec![("YB1234".to_string(), "YAMAHA".to_string())]
    );
    assert_eq!(
        m.match_text("yamaha yb\u{2011}1234"),
        vec![("YB1234".to_string(), "YAMAHA".to_string())]
    );
}

#[test]
fn shared_article_follows_mentioned_brands() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());

    assert_eq!(
        m.match_text("Suzuki SH77777"),
        vec![("SH77777".to_string(), "SUZUKI".to_string())]
    );
    assert_eq!(
        m.match_text("Yamaha or Suzuki: SH77777"),
        vec![
            ("SH77777".to_string(), "SUZUKI".to_string()),
            ("SH77777".to_string(), "YAMAHA".to_string()),
        ]
    );
}

#[test]
fn matches_ordered_by_position_in_text() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());

    let pairs = m.match_text("Kawasaki KW9876 fits Yamaha YB1234 and KW9876 again");
    assert_eq!(
        pairs,
        vec![
            ("KW9876".to_string(), "KAWASAKI".to_string()),
            ("YB1234".to_string(), "YAMAHA".to_string()),
        ]
    );
}

#[test]
fn matching_is_stable_under_renormalization() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());

    let texts = [
        "Деталь YAMAHA YB-1234 в наличии",
        "suzuki sz5555x, sh-77777",
        "KAWASAKI kw9876 / yamaha",
        "ничего",
        "",
    ];
    for text in texts {
        let once = normalize(text);
        assert_eq!(normalize(&once), once);
        assert_eq!(m.match_text(text), m.match_text(&once));
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[test]
fn csv_source_into_sqlite() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());
    let source = write_source(
        &dir,
        "id,title,description\n\
         1,Деталь YAMAHA,YB-1234 в наличии\n\
         2,Cover,no brand here\n\
         ,orphan,YAMAHA YB1234\n\
         3,Kawasaki KW9876,Yamaha YB1234\n",
    );

    let mut store = SqliteStore::open(&dir.path().join("matches.db")).unwrap();
    let stats = run_pipeline(
        CsvRecords::open(&source).unwrap(),
        &m,
        &mut store,
        &PipelineOptions::default(),
    )
    .unwrap();

    assert_eq!(stats.processed(), 3);
    assert_eq!(stats.matched(), 2);
    assert_eq!(stats.skipped(), 1);
    assert_eq!(store.count_matches().unwrap(), 3);

    let first = store.get_match("1").unwrap().unwrap();
    assert_eq!(first.first_article.as_deref(), Some("YB1234"));
    assert_eq!(first.first_brand.as_deref(), Some("YAMAHA"));

    let empty = store.get_match("2").unwrap().unwrap();
    assert!(empty.processed);
    assert!(empty.all_articles.is_empty());

    let both = store.get_match("3").unwrap().unwrap();
    assert_eq!(both.all_articles, vec!["KW9876", "YB1234"]);
    assert_eq!(both.all_brands, vec!["KAWASAKI", "YAMAHA"]);
}

#[test]
fn database_source_with_text_limit() {
    let dir = TempDir::new().unwrap();
    let config = MatcherConfig {
        text_limit: Some(2),
        ..MatcherConfig::default()
    };
    let m = build_matcher(&write_catalogs(&dir), &config);

    let mut store = SqliteStore::open(&dir.path().join("matches.db")).unwrap();
    store
        .insert_source_text("a", Some("Suzuki"), Some("SZ5555X"), None)
        .unwrap();
    store.insert_source_text("b", Some("Yamaha"), None, None).unwrap();
    store
        .insert_source_text("c", Some("Yamaha YB1234"), None, None)
        .unwrap();

    let options = PipelineOptions {
        limit: config.text_limit,
        ..PipelineOptions::default()
    };
    let records =
        SourcePages::open(&dir.path().join("matches.db"), options.batch_size, config.text_limit)
            .unwrap();
    let stats = run_pipeline(records, &m, &mut store, &options).unwrap();

    assert_eq!(stats.processed(), 2);
    assert_eq!(store.count_matches().unwrap(), 2);
    assert!(store.get_match("c").unwrap().is_none());
    let a = store.get_match("a").unwrap().unwrap();
    assert_eq!(a.all_articles, vec!["SZ5555X"]);
}

#[test]
fn database_source_read_in_several_batches() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());
    let db = dir.path().join("matches.db");

    let mut store = SqliteStore::open(&db).unwrap();
    for i in 0..11 {
        let text = if i % 2 == 0 { "Yamaha YB-1234" } else { "Suzuki cover" };
        store
            .insert_source_text(&format!("p{:02}", i), Some(text), None, None)
            .unwrap();
    }
    store.insert_source_text("blank", None, Some("  "), None).unwrap();

    let options = PipelineOptions {
        batch_size: 4,
        ..PipelineOptions::default()
    };
    let records = SourcePages::open(&db, options.batch_size, None).unwrap();
    let stats = run_pipeline(records, &m, &mut store, &options).unwrap();

    assert_eq!(stats.processed(), 11);
    assert_eq!(stats.matched(), 6);
    assert_eq!(stats.skipped(), 1);
    assert_eq!(stats.written(), 11);
    assert_eq!(store.count_matches().unwrap(), 11);
    assert!(store.get_match("p10").unwrap().unwrap().is_match());
    assert!(!store.get_match("p09").unwrap().unwrap().is_match());
}

#[test]
fn rerun_replaces_stored_results() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());
    let db = dir.path().join("matches.db");

    let source = write_source(&dir, "id,text\n1,Yamaha YB1234\n2,Suzuki SZ5555X\n");
    let mut store = SqliteStore::open(&db).unwrap();
    run_pipeline(CsvRecords::open(&source).unwrap(), &m, &mut store, &PipelineOptions::default())
        .unwrap();
    drop(store);

    let source = write_source(&dir, "id,text\n1,plain text now\n");
    let mut store = SqliteStore::open(&db).unwrap();
    run_pipeline(CsvRecords::open(&source).unwrap(), &m, &mut store, &PipelineOptions::default())
        .unwrap();

    assert_eq!(store.count_matches().unwrap(), 2);
    assert!(!store.get_match("1").unwrap().unwrap().is_match());
    assert!(store.get_match("2").unwrap().unwrap().is_match());
}

#[test]
fn export_after_run() {
    let dir = TempDir::new().unwrap();
    let m = build_matcher(&write_catalogs(&dir), &MatcherConfig::default());
    let source = write_source(&dir, "id,text\n1,Yamaha YB1234\n");
    let mut store = SqliteStore::open(&dir.path().join("matches.db")).unwrap();
    run_pipeline(CsvRecords::open(&source).unwrap(), &m, &mut store, &PipelineOptions::default())
        .unwrap();

    let out = dir.path().join("export.csv");
    assert_eq!(store.export_csv(&out).unwrap(), 1);
    let mut reader = csv::Reader::from_path(&out).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(
        row.iter().collect::<Vec<_>>(),
        vec!["1", "YB1234", "YAMAHA", r#"["YB1234"]"#, r#"["YAMAHA"]"#, "true", "YAMAHA YB1234"]
    );
}

// ============================================================================
// Cache Tests
// ============================================================================

#[test]
fn cached_index_matches_fresh_index() {
    let dir = TempDir::new().unwrap();
    let catalogs = write_catalogs(&dir);
    let config = MatcherConfig::default();
    let path = cache::cache_path(dir.path());

    let entries = load_catalogs(&catalogs).unwrap();
    let fresh = ReferenceIndex::build(entries, &Validator::new(&config)).unwrap();
    cache::save_index(&fresh, &path, &catalogs, &config).unwrap();

    let cached = cache::try_load_index(&path, &catalogs, &config)
        .unwrap()
        .unwrap();
    assert_eq!(cached.stats(), fresh.stats());
    assert_eq!(cached.brands(), fresh.brands());

    let text = "Yamaha or Suzuki: SH77777, YB-1234";
    assert_eq!(
        Matcher::new(cached, &config).unwrap().match_text(text),
        Matcher::new(fresh, &config).unwrap().match_text(text)
    );
}

#[test]
fn cache_ignored_after_whitelist_change() {
    let dir = TempDir::new().unwrap();
    let catalogs = write_catalogs(&dir);
    let config = MatcherConfig::default();
    let path = cache::cache_path(dir.path());
    let index = ReferenceIndex::build(load_catalogs(&catalogs).unwrap(), &Validator::new(&config))
        .unwrap();
    cache::save_index(&index, &path, &catalogs, &config).unwrap();

    let with_honda = MatcherConfig {
        valid_brands: vec!["YAMAHA".into(), "HONDA".into()],
        ..MatcherConfig::default()
    };
    assert!(cache::try_load_index(&path, &catalogs, &with_honda)
        .unwrap()
        .is_none());
}
