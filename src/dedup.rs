//! Order-preserving deduplication of match pairs.

use crate::models::FoundArticle;
use crate::normalize::normalize;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Key under which two items count as the same for [`dedupe`].
pub trait DedupKey {
    type Key: Eq + Hash;

    fn dedup_key(&self) -> Self::Key;
}

/// An (article, brand) pair; keyed on the normalized forms of both.
impl<A: AsRef<str>, B: AsRef<str>> DedupKey for (A, B) {
    type Key = (String, String);

    fn dedup_key(&self) -> Self::Key {
        (normalize(self.0.as_ref()), normalize(self.1.as_ref()))
    }
}

impl DedupKey for FoundArticle {
    type Key = (String, String);

    fn dedup_key(&self) -> Self::Key {
        (normalize(&self.article), normalize(&self.brand))
    }
}

/// Keeps the first occurrence of every key, in input order.
pub fn dedupe<T, I>(items: I) -> Vec<T>
where
    T: DedupKey,
    I: IntoIterator<Item = T>,
{
    let mut seen = FxHashSet::default();
    items
        .into_iter()
        .filter(|item| seen.insert(item.dedup_key()))
        .collect()
}

/// Fallback for items without an article/brand pair: keyed on their string form.
pub fn dedupe_by_string<T, I>(items: I) -> Vec<T>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    let mut seen = FxHashSet::default();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_string()))
        .collect()
}
