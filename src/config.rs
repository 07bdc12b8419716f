use crate::error::MatchError;
use crate::normalize::normalize;
use std::env;
use std::str::FromStr;

/// Brand whitelist used when `VALID_BRANDS` is not set
pub const DEFAULT_VALID_BRANDS: &[&str] = &["YAMAHA", "KAWASAKI", "SUZUKI"];

/// Minimum length of an all-digit article code
pub const DEFAULT_MIN_ARTICLE_LEN_DIGITS: usize = 5;

/// Minimum length of an article code containing any non-digit
pub const DEFAULT_MIN_ARTICLE_LEN_ALPHANUM: usize = 6;

/// Reference catalogs read when no `--catalog` is given
pub const DEFAULT_CATALOG_FILES: &[&str] = &["data/boats_net_data.csv", "data/partzilla_net_data.csv"];

/// Default SQLite database holding source texts and match results
pub const DEFAULT_DB_PATH: &str = "matches.db";

/// Records matched in parallel and upserted per transaction
pub const BATCH_SIZE: usize = 1000;

/// Bump when the serialized index layout changes
pub const CACHE_VERSION: u32 = 1;

/// Buffer size for CSV readers and writers
pub const CSV_BUFFER_SIZE: usize = 128 * 1024;

/// What to do with a record whose text exceeds `max_text_chars`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversizePolicy {
    #[default]
    Truncate,
    Reject,
}

impl FromStr for OversizePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "truncate" => Ok(Self::Truncate),
            "reject" => Ok(Self::Reject),
            other => Err(format!("expected `truncate` or `reject`, got `{other}`")),
        }
    }
}

/// Which catalog articles are searched for in a text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Only articles registered under a brand mentioned in the text
    #[default]
    BrandScoped,
    /// Every catalog article, whether or not its brand is mentioned
    Global,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brand" | "brand_scoped" | "scoped" => Ok(Self::BrandScoped),
            "global" => Ok(Self::Global),
            other => Err(format!("expected `brand` or `global`, got `{other}`")),
        }
    }
}

/// Immutable settings for one run, validated once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherConfig {
    pub valid_brands: Vec<String>,
    pub min_article_len_digits: usize,
    pub min_article_len_alphanum: usize,
    /// Maximum number of source records per run
    pub text_limit: Option<usize>,
    /// Maximum characters of a single record's text
    pub max_text_chars: Option<usize>,
    pub oversize_policy: OversizePolicy,
    pub match_policy: MatchPolicy,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            valid_brands: DEFAULT_VALID_BRANDS.iter().map(|b| b.to_string()).collect(),
            min_article_len_digits: DEFAULT_MIN_ARTICLE_LEN_DIGITS,
            min_article_len_alphanum: DEFAULT_MIN_ARTICLE_LEN_ALPHANUM,
            text_limit: None,
            max_text_chars: None,
            oversize_policy: OversizePolicy::default(),
            match_policy: MatchPolicy::default(),
        }
    }
}

impl MatcherConfig {
    pub fn from_env() -> Result<Self, MatchError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("VALID_BRANDS") {
            config.valid_brands = raw
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
        }
        if let Some(raw) = lookup("MIN_ARTICLE_LEN_DIGITS") {
            config.min_article_len_digits = parse_field("MIN_ARTICLE_LEN_DIGITS", &raw)?;
        }
        if let Some(raw) = lookup("MIN_ARTICLE_LEN_ALPHANUM") {
            config.min_article_len_alphanum = parse_field("MIN_ARTICLE_LEN_ALPHANUM", &raw)?;
        }
        if let Some(raw) = lookup("TEXT_LIMIT") {
            config.text_limit = optional_limit(parse_field("TEXT_LIMIT", &raw)?);
        }
        if let Some(raw) = lookup("MAX_TEXT_CHARS") {
            config.max_text_chars = optional_limit(parse_field("MAX_TEXT_CHARS", &raw)?);
        }
        if let Some(raw) = lookup("OVERSIZE_POLICY") {
            config.oversize_policy = parse_field("OVERSIZE_POLICY", &raw)?;
        }
        if let Some(raw) = lookup("MATCH_POLICY") {
            config.match_policy = parse_field("MATCH_POLICY", &raw)?;
        }

        config.validate()
    }

    pub fn validate(self) -> Result<Self, MatchError> {
        if self.valid_brands.iter().all(|b| normalize(b).is_empty()) {
            return Err(MatchError::configuration(
                "VALID_BRANDS",
                "whitelist is empty",
            ));
        }
        if self.min_article_len_digits == 0 {
            return Err(MatchError::configuration(
                "MIN_ARTICLE_LEN_DIGITS",
                "must be a positive integer",
            ));
        }
        if self.min_article_len_alphanum == 0 {
            return Err(MatchError::configuration(
                "MIN_ARTICLE_LEN_ALPHANUM",
                "must be a positive integer",
            ));
        }
        Ok(self)
    }

    /// Stable description of every setting that affects which catalog rows survive.
    pub fn index_fingerprint(&self) -> String {
        let mut brands: Vec<String> = self.valid_brands.iter().map(|b| normalize(b)).collect();
        brands.sort();
        brands.dedup();
        format!(
            "{}|{}|{}",
            brands.join(","),
            self.min_article_len_digits,
            self.min_article_len_alphanum
        )
    }
}

fn parse_field<T>(field: &'static str, raw: &str) -> Result<T, MatchError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| MatchError::configuration(field, format!("`{}`: {}", raw.trim(), e)))
}

/// Zero means unlimited.
fn optional_limit(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}
