use crate::config::MatcherConfig;
use crate::models::{ArticleCandidate, ArticleClass, Brand};
use crate::normalize::normalize;
use rustc_hash::FxHashSet;

/// Length rules for article codes plus the normalized brand whitelist.
#[derive(Debug, Clone)]
pub struct Validator {
    min_len_digits: usize,
    min_len_alphanum: usize,
    brands: Vec<Brand>,
    normalized_brands: FxHashSet<String>,
}

impl Validator {
    pub fn new(config: &MatcherConfig) -> Self {
        let brands: Vec<Brand> = config
            .valid_brands
            .iter()
            .map(|b| Brand::new(b))
            .filter(|b| !b.normalized.is_empty())
            .collect();
        let normalized_brands = brands.iter().map(|b| b.normalized.clone()).collect();
        Self {
            min_len_digits: config.min_article_len_digits,
            min_len_alphanum: config.min_article_len_alphanum,
            brands,
            normalized_brands,
        }
    }

    pub fn is_valid_article(&self, candidate: &str) -> bool {
        self.check_candidate(&ArticleCandidate::new(candidate))
    }

    pub fn check_candidate(&self, candidate: &ArticleCandidate) -> bool {
        if candidate.is_empty() {
            return false;
        }
        let min_len = match candidate.class {
            ArticleClass::Digits => self.min_len_digits,
            ArticleClass::Alphanumeric => self.min_len_alphanum,
        };
        candidate.len() >= min_len
    }

    pub fn is_valid_brand(&self, candidate: &str) -> bool {
        self.canonical_brand(candidate).is_some()
    }

    /// Whitelist entry that `candidate` normalizes to, if any.
    pub fn canonical_brand(&self, candidate: &str) -> Option<&Brand> {
        let normalized = normalize(candidate);
        if normalized.is_empty() || !self.normalized_brands.contains(&normalized) {
            return None;
        }
        self.brands.iter().find(|b| b.normalized == normalized)
    }

    pub fn brands(&self) -> &[Brand] {
        &self.brands
    }
}

/// Whitelist check without a prepared [`Validator`]; both sides are normalized.
pub fn is_valid_brand<S: AsRef<str>>(candidate: &str, whitelist: &[S]) -> bool {
    let normalized = normalize(candidate);
    !normalized.is_empty() && whitelist.iter().any(|b| normalize(b.as_ref()) == normalized)
}
