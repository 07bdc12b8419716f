use crate::config::{MatchPolicy, MatcherConfig, OversizePolicy};
use crate::dedup::{dedupe, dedupe_by_string};
use crate::error::MatchError;
use crate::index::ReferenceIndex;
use crate::models::{FoundArticle, MatchResult, SourceRecord};
use crate::normalize::normalize;
use crate::validate::Validator;
use aho_corasick::{AhoCorasick, MatchKind};
use memchr::memmem;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// A brand found in normalized text, with the byte offset of its first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandHit {
    pub brand: String,
    pub offset: usize,
}

/// Result of matching one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub result: MatchResult,
    /// Distinct (article, brand) pairs behind the result
    pub pairs: usize,
    /// The raw text was cut to `max_text_chars` before scanning
    pub truncated: bool,
}

/// Overlapping multi-pattern search over a fixed list of articles.
struct ArticleScanner {
    automaton: AhoCorasick,
    articles: Vec<String>,
}

impl ArticleScanner {
    /// `None` when no article passes validation.
    fn build<'a, I>(articles: I, validator: &Validator) -> Result<Option<Self>, MatchError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let articles: Vec<String> = articles
            .into_iter()
            .filter(|a| validator.is_valid_article(a))
            .cloned()
            .collect();
        if articles.is_empty() {
            return Ok(None);
        }
        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&articles)
            .map_err(|e| MatchError::IndexBuild(format!("article automaton: {e}")))?;
        Ok(Some(Self {
            automaton,
            articles,
        }))
    }

    /// Calls `f(offset, article)` for every occurrence, overlapping ones included.
    fn scan<F>(&self, haystack: &str, mut f: F)
    where
        F: FnMut(usize, &str),
    {
        for m in self.automaton.find_overlapping_iter(haystack) {
            f(m.start(), &self.articles[m.pattern().as_usize()]);
        }
    }
}

/// Finds catalog (article, brand) pairs in free text.
///
/// Holds the index and its automata read-only, so one matcher can be shared by any
/// number of worker threads. Each text is scanned once per mentioned brand, or once in
/// total under the global policy.
pub struct Matcher {
    index: ReferenceIndex,
    brand_scanners: FxHashMap<String, ArticleScanner>,
    global_scanner: Option<ArticleScanner>,
    policy: MatchPolicy,
    max_text_chars: Option<usize>,
    oversize: OversizePolicy,
}

impl Matcher {
    /// Compiles the automata the configured policy needs.
    pub fn new(index: ReferenceIndex, config: &MatcherConfig) -> Result<Self, MatchError> {
        let validator = Validator::new(config);
        let mut brand_scanners = FxHashMap::default();
        let mut global_scanner = None;

        match config.match_policy {
            MatchPolicy::BrandScoped => {
                for brand in index.brands() {
                    let articles = index.articles_for_brand(brand);
                    if let Some(scanner) = ArticleScanner::build(articles, &validator)? {
                        brand_scanners.insert(brand.clone(), scanner);
                    }
                }
            }
            MatchPolicy::Global => {
                global_scanner = ArticleScanner::build(index.articles(), &validator)?;
            }
        }

        debug!(
            policy = ?config.match_policy,
            automata = brand_scanners.len() + usize::from(global_scanner.is_some()),
            "Matcher ready"
        );

        Ok(Self {
            index,
            brand_scanners,
            global_scanner,
            policy: config.match_policy,
            max_text_chars: config.max_text_chars,
            oversize: config.oversize_policy,
        })
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Brands of the index present in `normalized`, in index (lexicographic) order.
    pub fn find_brands(&self, normalized: &str) -> Vec<BrandHit> {
        let haystack = normalized.as_bytes();
        self.index
            .brands()
            .iter()
            .filter_map(|brand| {
                memmem::find(haystack, brand.as_bytes()).map(|offset| BrandHit {
                    brand: brand.clone(),
                    offset,
                })
            })
            .collect()
    }

    /// Every catalog article occurrence in `normalized`, ordered by offset, then
    /// article, then brand. Overlapping and repeated occurrences are all reported.
    pub fn find_articles(&self, normalized: &str) -> Vec<FoundArticle> {
        let mut found = Vec::new();

        match self.policy {
            MatchPolicy::BrandScoped => {
                for hit in self.find_brands(normalized) {
                    let Some(scanner) = self.brand_scanners.get(&hit.brand) else {
                        continue;
                    };
                    scanner.scan(normalized, |offset, article| {
                        found.push(FoundArticle {
                            article: article.to_string(),
                            brand: hit.brand.clone(),
                            offset,
                        });
                    });
                }
            }
            MatchPolicy::Global => {
                if let Some(scanner) = &self.global_scanner {
                    scanner.scan(normalized, |offset, article| {
                        for brand in self.index.brands_for_article(article) {
                            found.push(FoundArticle {
                                article: article.to_string(),
                                brand: brand.clone(),
                                offset,
                            });
                        }
                    });
                }
            }
        }

        found.sort_by(|a, b| {
            a.offset
                .cmp(&b.offset)
                .then_with(|| a.article.cmp(&b.article))
                .then_with(|| a.brand.cmp(&b.brand))
        });
        found
    }

    /// Normalizes `text` and returns the deduplicated (article, brand) pairs in order.
    pub fn match_text(&self, text: &str) -> Vec<(String, String)> {
        let normalized = normalize(text);
        dedupe(self.find_articles(&normalized))
            .into_iter()
            .map(|f| (f.article, f.brand))
            .collect()
    }

    pub fn match_record(&self, record: &SourceRecord) -> Result<MatchOutcome, MatchError> {
        let (text, truncated) = self.bounded_text(record)?;
        let normalized = normalize(text);
        let pairs = dedupe(self.find_articles(&normalized));
        let pair_count = pairs.len();
        let result = build_result(&record.id, normalized, &pairs);

        trace!(
            record_id = record.id,
            pairs = pair_count,
            "Record matched"
        );

        Ok(MatchOutcome {
            result,
            pairs: pair_count,
            truncated,
        })
    }

    /// Applies the text length cap: either a prefix of the text or a rejection.
    fn bounded_text<'a>(&self, record: &'a SourceRecord) -> Result<(&'a str, bool), MatchError> {
        let Some(limit) = self.max_text_chars else {
            return Ok((&record.text, false));
        };
        let Some((cut, _)) = record.text.char_indices().nth(limit) else {
            return Ok((&record.text, false));
        };
        match self.oversize {
            OversizePolicy::Truncate => Ok((&record.text[..cut], true)),
            OversizePolicy::Reject => Err(MatchError::malformed(
                record.id.clone(),
                format!("text longer than {limit} characters"),
            )),
        }
    }
}

/// Derives the per-record result from offset-ordered, deduplicated pairs.
fn build_result(id: &str, normalized_text: String, pairs: &[FoundArticle]) -> MatchResult {
    let Some(first) = pairs.first() else {
        return MatchResult::empty(id, normalized_text);
    };

    MatchResult {
        id: id.to_string(),
        first_article: Some(first.article.clone()),
        first_brand: Some(first.brand.clone()),
        all_articles: dedupe_by_string(pairs.iter().map(|p| p.article.clone())),
        all_brands: dedupe_by_string(pairs.iter().map(|p| p.brand.clone())),
        processed: true,
        normalized_text,
    }
}
