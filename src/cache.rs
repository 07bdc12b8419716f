use crate::config::{MatcherConfig, CACHE_VERSION};
use crate::index::ReferenceIndex;
use anyhow::{Context, Result};
use bincode::Options;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

/// Identity of one catalog file at the time the cache was written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CatalogStamp {
    pub path: String,
    pub present: bool,
    pub mtime: u64,
    pub size: u64,
}

#[derive(Serialize, Deserialize)]
pub struct CacheMetadata {
    pub version: u32,
    pub catalogs: Vec<CatalogStamp>,
    pub config_fingerprint: String,
    pub brand_count: usize,
    pub pair_count: usize,
}

#[derive(Deserialize)]
struct IndexCacheDe {
    metadata: CacheMetadata,
    brand_articles: FxHashMap<String, Vec<String>>,
}

/// Borrows the index data to avoid cloning every article string during serialization.
#[derive(Serialize)]
struct IndexCacheSer<'a> {
    metadata: CacheMetadata,
    brand_articles: &'a FxHashMap<String, Vec<String>>,
}

pub fn cache_path(dir: &Path) -> PathBuf {
    dir.join("index.cache")
}

fn stamp(path: &Path) -> Result<CatalogStamp> {
    let display = path.display().to_string();
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => {
            return Ok(CatalogStamp {
                path: display,
                present: false,
                mtime: 0,
                size: 0,
            })
        }
    };
    let mtime = metadata
        .modified()
        .context("Failed to get modification time")?
        .duration_since(SystemTime::UNIX_EPOCH)
        .context("Invalid modification time")?
        .as_secs();
    Ok(CatalogStamp {
        path: display,
        present: true,
        mtime,
        size: metadata.len(),
    })
}

fn stamps(catalogs: &[PathBuf]) -> Result<Vec<CatalogStamp>> {
    catalogs.iter().map(|p| stamp(p)).collect()
}

/// Returns `Ok(Some(index))` if the cache matches the catalogs and config, `Ok(None)`
/// if it is missing, stale or unreadable.
pub fn try_load_index(
    cache_path: &Path,
    catalogs: &[PathBuf],
    config: &MatcherConfig,
) -> Result<Option<ReferenceIndex>> {
    if !cache_path.exists() {
        return Ok(None);
    }

    let file_size = fs::metadata(cache_path).map(|m| m.len()).unwrap_or(0);

    let file = File::open(cache_path).context("Failed to open cache file")?;
    let reader = BufReader::with_capacity(256 * 1024, file);

    let options = bincode::options().with_limit(file_size.saturating_add(1024));

    let cache: IndexCacheDe = match options.deserialize_from(reader) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Cache file is corrupt or unreadable");
            return Ok(None);
        }
    };

    if cache.metadata.version != CACHE_VERSION {
        info!(
            cached = cache.metadata.version,
            current = CACHE_VERSION,
            "Cache version mismatch"
        );
        return Ok(None);
    }

    let fingerprint = config.index_fingerprint();
    if cache.metadata.config_fingerprint != fingerprint {
        info!(
            cached = cache.metadata.config_fingerprint,
            current = fingerprint,
            "Matcher configuration changed since cache was created"
        );
        return Ok(None);
    }

    let current = stamps(catalogs)?;
    if cache.metadata.catalogs != current {
        info!("Catalog files have changed since cache was created");
        return Ok(None);
    }

    info!(
        brands = cache.metadata.brand_count,
        pairs = cache.metadata.pair_count,
        "Index loaded from cache"
    );

    Ok(Some(ReferenceIndex::from_brand_map(cache.brand_articles)))
}

/// Serializes the index by reference and writes atomically via rename.
pub fn save_index(
    index: &ReferenceIndex,
    cache_path: &Path,
    catalogs: &[PathBuf],
    config: &MatcherConfig,
) -> Result<()> {
    if let Some(parent) = cache_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let (brand_count, _, pair_count) = index.stats();
    let cache = IndexCacheSer {
        metadata: CacheMetadata {
            version: CACHE_VERSION,
            catalogs: stamps(catalogs)?,
            config_fingerprint: config.index_fingerprint(),
            brand_count,
            pair_count,
        },
        brand_articles: index.brand_map(),
    };

    let tmp_path = cache_path.with_extension("cache.tmp");
    let file = File::create(&tmp_path)
        .with_context(|| format!("Failed to create temp cache file: {:?}", tmp_path))?;
    let writer = BufWriter::new(file);

    bincode::DefaultOptions::new()
        .serialize_into(writer, &cache)
        .context("Failed to serialize index cache")?;

    fs::rename(&tmp_path, cache_path)
        .with_context(|| format!("Failed to rename temp cache file to: {:?}", cache_path))?;

    info!(
        brands = brand_count,
        pairs = pair_count,
        path = ?cache_path,
        "Index cache saved"
    );

    Ok(())
}
