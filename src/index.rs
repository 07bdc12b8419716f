use crate::error::MatchError;
use crate::models::{ArticleCandidate, CatalogEntry};
use crate::normalize::normalize;
use crate::validate::Validator;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Brand → articles multimap built once from the reference catalogs.
///
/// Keys and values are normalized. Article lists are sorted and unique so scans over
/// them are deterministic. The index is never mutated after construction.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    brand_articles: FxHashMap<String, Vec<String>>,
    article_brands: FxHashMap<String, Vec<String>>,
    brands: Vec<String>,
    articles: Vec<String>,
}

/// Counters from one index build.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub rows_seen: usize,
    pub rows_kept: usize,
    pub invalid_article: usize,
    pub invalid_brand: usize,
    pub duplicates: usize,
    /// Rows kept per catalog source
    pub kept_by_source: BTreeMap<String, usize>,
}

impl ReferenceIndex {
    pub fn build<I>(entries: I, validator: &Validator) -> Result<Self, MatchError>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let (index, report) = Self::build_with_report(entries, validator)?;
        info!(
            rows = report.rows_seen,
            kept = report.rows_kept,
            invalid_article = report.invalid_article,
            invalid_brand = report.invalid_brand,
            duplicates = report.duplicates,
            "Reference index built"
        );
        Ok(index)
    }

    pub fn build_with_report<I>(
        entries: I,
        validator: &Validator,
    ) -> Result<(Self, IndexReport), MatchError>
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let mut report = IndexReport::default();
        let mut grouped: FxHashMap<String, FxHashSet<String>> = FxHashMap::default();

        for entry in entries {
            report.rows_seen += 1;

            let article = ArticleCandidate::new(&entry.article);
            if !validator.is_valid_article(&article.normalized) {
                debug!(article = entry.article, brand = entry.brand, "Dropping catalog row: article");
                report.invalid_article += 1;
                continue;
            }
            let Some(brand) = validator.canonical_brand(&entry.brand) else {
                debug!(article = entry.article, brand = entry.brand, "Dropping catalog row: brand");
                report.invalid_brand += 1;
                continue;
            };

            if !grouped
                .entry(brand.normalized.clone())
                .or_default()
                .insert(article.normalized)
            {
                report.duplicates += 1;
                continue;
            }

            report.rows_kept += 1;
            let source = entry.source.unwrap_or_else(|| "-".to_string());
            *report.kept_by_source.entry(source).or_default() += 1;
        }

        if report.rows_kept == 0 {
            return Err(MatchError::IndexBuild(format!(
                "no usable catalog rows ({} seen, {} bad article, {} bad brand)",
                report.rows_seen, report.invalid_article, report.invalid_brand
            )));
        }

        let brand_articles = grouped
            .into_iter()
            .map(|(brand, articles)| (brand, articles.into_iter().collect()))
            .collect();

        Ok((Self::from_brand_map(brand_articles), report))
    }

    /// Rebuilds the derived lookups from a brand → articles map (e.g. a cache).
    pub fn from_brand_map(mut brand_articles: FxHashMap<String, Vec<String>>) -> Self {
        let mut article_brands: FxHashMap<String, Vec<String>> = FxHashMap::default();

        for (brand, articles) in brand_articles.iter_mut() {
            articles.sort_unstable();
            articles.dedup();
            for article in articles.iter() {
                article_brands
                    .entry(article.clone())
                    .or_default()
                    .push(brand.clone());
            }
        }
        for brands in article_brands.values_mut() {
            brands.sort_unstable();
        }

        let mut brands: Vec<String> = brand_articles.keys().cloned().collect();
        brands.sort_unstable();
        let mut articles: Vec<String> = article_brands.keys().cloned().collect();
        articles.sort_unstable();

        Self {
            brand_articles,
            article_brands,
            brands,
            articles,
        }
    }

    /// Normalized brands in lexicographic order.
    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    /// Sorted articles registered under a normalized brand.
    pub fn articles_for_brand(&self, brand: &str) -> &[String] {
        self.brand_articles
            .get(brand)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sorted brands a normalized article is registered under.
    pub fn brands_for_article(&self, article: &str) -> &[String] {
        self.article_brands
            .get(article)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every distinct article, sorted.
    pub fn articles(&self) -> &[String] {
        &self.articles
    }

    /// Accepts raw strings; both are normalized before lookup.
    pub fn contains(&self, article: &str, brand: &str) -> bool {
        self.articles_for_brand(&normalize(brand))
            .binary_search(&normalize(article))
            .is_ok()
    }

    pub fn brand_map(&self) -> &FxHashMap<String, Vec<String>> {
        &self.brand_articles
    }

    /// (brands, distinct articles, brand/article pairs)
    pub fn stats(&self) -> (usize, usize, usize) {
        let pairs = self.brand_articles.values().map(Vec::len).sum();
        (self.brands.len(), self.articles.len(), pairs)
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;

    fn validator() -> Validator {
        Validator::new(&MatcherConfig::default())
    }

    fn entries(rows: &[(&str, &str)]) -> Vec<CatalogEntry> {
        rows.iter().map(|(a, b)| CatalogEntry::new(a, b)).collect()
    }

    #[test]
    fn drops_short_articles_keeps_valid() {
        let (index, report) = ReferenceIndex::build_with_report(
            entries(&[("12", "YAMAHA"), ("123456", "YAMAHA")]),
            &validator(),
        )
        .unwrap();

        assert_eq!(index.articles_for_brand("YAMAHA"), ["123456".to_string()]);
        assert_eq!(report.rows_seen, 2);
        assert_eq!(report.rows_kept, 1);
        assert_eq!(report.invalid_article, 1);
    }

    #[test]
    fn drops_unlisted_brands() {
        let (index, report) = ReferenceIndex::build_with_report(
            entries(&[("YB1234", "YAMAHA"), ("HN1234", "HONDA")]),
            &validator(),
        )
        .unwrap();

        assert_eq!(index.brands(), ["YAMAHA".to_string()]);
        assert_eq!(report.invalid_brand, 1);
    }

    #[test]
    fn normalizes_rows() {
        let index = ReferenceIndex::build(entries(&[("yb-1234", "yamaha")]), &validator()).unwrap();
        assert_eq!(index.articles_for_brand("YAMAHA"), ["YB1234".to_string()]);
        assert!(index.contains("YB-1234", "Yamaha"));
    }

    #[test]
    fn same_article_under_two_brands_kept() {
        let index = ReferenceIndex::build(
            entries(&[("123456", "YAMAHA"), ("123456", "SUZUKI")]),
            &validator(),
        )
        .unwrap();

        assert_eq!(
            index.brands_for_article("123456"),
            ["SUZUKI".to_string(), "YAMAHA".to_string()]
        );
        assert!(index.contains("123456", "YAMAHA"));
        assert!(index.contains("123456", "SUZUKI"));
    }

    #[test]
    fn duplicate_rows_counted_once() {
        let (index, report) = ReferenceIndex::build_with_report(
            entries(&[("YB1234", "YAMAHA"), ("YB-1234", "yamaha")]),
            &validator(),
        )
        .unwrap();

        assert_eq!(index.stats(), (1, 1, 1));
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.rows_kept, 1);
    }

    #[test]
    fn brands_and_articles_sorted() {
        let index = ReferenceIndex::build(
            entries(&[
                ("ZZ9999", "YAMAHA"),
                ("AA1111", "YAMAHA"),
                ("KK5555", "KAWASAKI"),
            ]),
            &validator(),
        )
        .unwrap();

        assert_eq!(index.brands(), ["KAWASAKI".to_string(), "YAMAHA".to_string()]);
        assert_eq!(
            index.articles_for_brand("YAMAHA"),
            ["AA1111".to_string(), "ZZ9999".to_string()]
        );
        assert_eq!(
            index.articles(),
            ["AA1111".to_string(), "KK5555".to_string(), "ZZ9999".to_string()]
        );
    }

    #[test]
    fn counts_rows_per_source() {
        let rows = vec![
            CatalogEntry::new("YB1234", "YAMAHA").with_source("boats.csv"),
            CatalogEntry::new("YB5678", "YAMAHA").with_source("boats.csv"),
            CatalogEntry::new("KW1234", "KAWASAKI").with_source("partzilla.csv"),
        ];
        let (_, report) = ReferenceIndex::build_with_report(rows, &validator()).unwrap();
        assert_eq!(report.kept_by_source.get("boats.csv"), Some(&2));
        assert_eq!(report.kept_by_source.get("partzilla.csv"), Some(&1));
    }

    #[test]
    fn unusable_catalog_is_error() {
        let result = ReferenceIndex::build(entries(&[("12", "YAMAHA"), ("AB", "HONDA")]), &validator());
        assert!(matches!(result, Err(MatchError::IndexBuild(_))));

        let result = ReferenceIndex::build(Vec::new(), &validator());
        assert!(matches!(result, Err(MatchError::IndexBuild(_))));
    }

    #[test]
    fn unknown_lookups_are_empty() {
        let index = ReferenceIndex::build(entries(&[("YB1234", "YAMAHA")]), &validator()).unwrap();
        assert!(index.articles_for_brand("SUZUKI").is_empty());
        assert!(index.brands_for_article("XX0000").is_empty());
        assert!(!index.contains("YB1234", "SUZUKI"));
    }

    #[test]
    fn from_brand_map_restores_lookups() {
        let mut map = FxHashMap::default();
        map.insert(
            "YAMAHA".to_string(),
            vec!["ZZ9999".to_string(), "AA1111".to_string(), "AA1111".to_string()],
        );
        let index = ReferenceIndex::from_brand_map(map);
        assert_eq!(
            index.articles_for_brand("YAMAHA"),
            ["AA1111".to_string(), "ZZ9999".to_string()]
        );
        assert_eq!(index.brands_for_article("ZZ9999"), ["YAMAHA".to_string()]);
    }

    #[test]
    fn index_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<ReferenceIndex>();
    }
}
