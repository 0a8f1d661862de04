//! Documents: a set of terms plus numeric value slots.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Document id, assigned sequentially by the index starting at 1.
pub type DocId = u64;

/// Numeric value slot number.
pub type ValueSlot = u32;

/// Identity of a term set, used for exact-match lookup.
pub type TermSetKey = u128;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    terms: BTreeSet<String>,
    values: BTreeMap<ValueSlot, i64>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            values: BTreeMap::new(),
        }
    }

    pub fn add_term(&mut self, term: impl Into<String>) {
        self.terms.insert(term.into());
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    /// Terms in lexicographic order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn set_value(&mut self, slot: ValueSlot, value: i64) {
        self.values.insert(slot, value);
    }

    pub fn value(&self, slot: ValueSlot) -> Option<i64> {
        self.values.get(&slot).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueSlot, i64)> + '_ {
        self.values.iter().map(|(slot, value)| (*slot, *value))
    }

    pub fn key(&self) -> TermSetKey {
        term_set_key(self.terms.iter().map(String::as_str))
    }
}

/// BLAKE3 over the sorted, NUL-separated terms, truncated to 128 bits.
///
/// `terms` must be in sorted order without duplicates.
pub fn term_set_key<'a>(terms: impl IntoIterator<Item = &'a str>) -> TermSetKey {
    let mut hasher = blake3::Hasher::new();
    for term in terms {
        hasher.update(term.as_bytes());
        hasher.update(&[0]);
    }
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_bytes()[0..16]);
    u128::from_le_bytes(bytes)
}
