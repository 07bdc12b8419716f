use crate::normalize::normalize;
use serde::{Deserialize, Serialize};

/// A manufacturer name from the whitelist. Equality is on the normalized form.
#[derive(Debug, Clone, Eq)]
pub struct Brand {
    pub raw: String,
    pub normalized: String,
}

impl Brand {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize(raw),
        }
    }
}

impl PartialEq for Brand {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl std::hash::Hash for Brand {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleClass {
    Digits,
    Alphanumeric,
}

impl ArticleClass {
    pub fn of(candidate: &str) -> Self {
        if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
            Self::Digits
        } else {
            Self::Alphanumeric
        }
    }
}

/// A token believed to denote a part code, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCandidate {
    pub raw: String,
    pub normalized: String,
    pub class: ArticleClass,
}

impl ArticleCandidate {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize(raw),
            class: ArticleClass::of(raw),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// One known (article, brand) pair from a reference catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub article: String,
    pub brand: String,
    pub source: Option<String>,
}

impl CatalogEntry {
    pub fn new(article: &str, brand: &str) -> Self {
        Self {
            article: article.to_string(),
            brand: brand.to_string(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }
}

/// A product text to scan, with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub text: String,
}

/// An article of `brand` found at byte `offset` of the normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundArticle {
    pub article: String,
    pub brand: String,
    pub offset: usize,
}

/// Result for one source record, as handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    pub first_article: Option<String>,
    pub first_brand: Option<String>,
    pub all_articles: Vec<String>,
    pub all_brands: Vec<String>,
    pub processed: bool,
    pub normalized_text: String,
}

impl MatchResult {
    /// A processed record with nothing found.
    pub fn empty(id: &str, normalized_text: String) -> Self {
        Self {
            id: id.to_string(),
            first_article: None,
            first_brand: None,
            all_articles: Vec::new(),
            all_brands: Vec::new(),
            processed: true,
            normalized_text,
        }
    }

    pub fn is_match(&self) -> bool {
        !self.all_articles.is_empty()
    }
}
