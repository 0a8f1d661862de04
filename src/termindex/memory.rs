//! In-memory inverted index.
//!
//! Postings are kept per term as ordered doc id sets, so boolean queries
//! are set unions and intersections. Each value slot keeps running
//! bounds and a sum over the documents that set it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::termindex::document::{term_set_key, DocId, Document, TermSetKey, ValueSlot};
use crate::termindex::error::{IndexError, IndexResult};
use crate::termindex::query::IndexQuery;

/// Aggregates of one value slot.
///
/// Bounds only ever widen while documents carrying the slot exist; they
/// reset once the last such document is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueStats {
    pub lower: i64,
    pub upper: i64,
    pub sum: i64,
    docs: usize,
}

impl ValueStats {
    fn first(value: i64) -> Self {
        Self {
            lower: value,
            upper: value,
            sum: value,
            docs: 1,
        }
    }

    fn include(&mut self, value: i64) {
        self.lower = self.lower.min(value);
        self.upper = self.upper.max(value);
        self.sum = self.sum.saturating_add(value);
        self.docs += 1;
    }
}

#[derive(Debug, Clone)]
pub struct MemoryIndex {
    docs: BTreeMap<DocId, Document>,
    postings: BTreeMap<String, BTreeSet<DocId>>,
    by_key: HashMap<TermSetKey, DocId>,
    value_stats: BTreeMap<ValueSlot, ValueStats>,
    next_doc_id: DocId,
}

impl MemoryIndex {
    // -- Constructors -------------------------------------------------

    pub fn new() -> Self {
        Self {
            docs: BTreeMap::new(),
            postings: BTreeMap::new(),
            by_key: HashMap::new(),
            value_stats: BTreeMap::new(),
            next_doc_id: 1,
        }
    }

    /// Rebuild an index from stored documents.
    pub fn from_documents(
        next_doc_id: DocId,
        docs: impl IntoIterator<Item = (DocId, Document)>,
    ) -> IndexResult<Self> {
        let mut index = Self::new();
        index.next_doc_id = next_doc_id;
        for (id, doc) in docs {
            if id == 0 || id >= next_doc_id {
                return Err(IndexError::InvalidFormat(format!(
                    "document id {} outside of 1..{}",
                    id, next_doc_id
                )));
            }
            if index.docs.contains_key(&id) {
                return Err(IndexError::InvalidFormat(format!(
                    "duplicate document id {}",
                    id
                )));
            }
            index.index_document(id, &doc);
            index.docs.insert(id, doc);
        }
        Ok(index)
    }

    // -- Writes -------------------------------------------------------

    pub fn add_document(&mut self, doc: Document) -> DocId {
        let id = self.next_doc_id;
        self.next_doc_id += 1;
        self.index_document(id, &doc);
        self.docs.insert(id, doc);
        id
    }

    pub fn replace_document(&mut self, id: DocId, doc: Document) -> IndexResult<()> {
        let old = self
            .docs
            .remove(&id)
            .ok_or(IndexError::DocumentNotFound(id))?;
        self.unindex_document(id, &old);
        self.index_document(id, &doc);
        self.docs.insert(id, doc);
        Ok(())
    }

    pub fn delete_document(&mut self, id: DocId) -> IndexResult<Document> {
        let old = self
            .docs
            .remove(&id)
            .ok_or(IndexError::DocumentNotFound(id))?;
        self.unindex_document(id, &old);
        Ok(old)
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn index_document(&mut self, id: DocId, doc: &Document) {
        for term in doc.terms() {
            self.postings.entry(term.to_string()).or_default().insert(id);
        }
        self.by_key.insert(doc.key(), id);
        for (slot, value) in doc.values() {
            self.value_stats
                .entry(slot)
                .and_modify(|stats| stats.include(value))
                .or_insert_with(|| ValueStats::first(value));
        }
    }

    fn unindex_document(&mut self, id: DocId, doc: &Document) {
        for term in doc.terms() {
            if let Some(posting) = self.postings.get_mut(term) {
                posting.remove(&id);
                if posting.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        let key = doc.key();
        if self.by_key.get(&key) == Some(&id) {
            self.by_key.remove(&key);
        }
        for (slot, value) in doc.values() {
            if let Some(stats) = self.value_stats.get_mut(&slot) {
                stats.sum = stats.sum.saturating_sub(value);
                stats.docs -= 1;
                if stats.docs == 0 {
                    self.value_stats.remove(&slot);
                }
            }
        }
    }

    // -- Reads --------------------------------------------------------

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn next_doc_id(&self) -> DocId {
        self.next_doc_id
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docs.get(&id)
    }

    /// All documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = (DocId, &Document)> {
        self.docs.iter().map(|(id, doc)| (*id, doc))
    }

    /// Id of the document having exactly this term set. O(1).
    pub fn find_exact<T: AsRef<str>>(&self, terms: &[T]) -> Option<DocId> {
        let sorted: BTreeSet<&str> = terms.iter().map(|t| t.as_ref()).collect();
        let id = *self.by_key.get(&term_set_key(sorted.iter().copied()))?;
        let doc = self.docs.get(&id)?;
        let same = doc.term_count() == sorted.len() && sorted.iter().all(|t| doc.has_term(t));
        same.then_some(id)
    }

    /// Matching document ids, ascending.
    pub fn search(&self, query: &IndexQuery) -> Vec<DocId> {
        self.evaluate(query).into_iter().collect()
    }

    fn evaluate(&self, query: &IndexQuery) -> BTreeSet<DocId> {
        match query {
            IndexQuery::MatchAll => self.docs.keys().copied().collect(),
            IndexQuery::Term(term) => self.postings.get(term).cloned().unwrap_or_default(),
            IndexQuery::Or(clauses) => {
                let mut result = BTreeSet::new();
                for clause in clauses {
                    result.extend(self.evaluate(clause));
                }
                result
            }
            IndexQuery::And(clauses) => {
                let mut clauses = clauses.iter();
                let mut result = match clauses.next() {
                    Some(first) => self.evaluate(first),
                    None => return self.docs.keys().copied().collect(),
                };
                for clause in clauses {
                    if result.is_empty() {
                        break;
                    }
                    let other = self.evaluate(clause);
                    result.retain(|id| other.contains(id));
                }
                result
            }
        }
    }

    /// Terms starting with `prefix`, in lexicographic order.
    pub fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.postings
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .map(|(term, _)| term.as_str())
            .take_while(move |term| term.starts_with(prefix))
    }

    /// Number of documents containing `term`.
    pub fn term_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map_or(0, BTreeSet::len)
    }

    pub fn value_stats(&self, slot: ValueSlot) -> Option<ValueStats> {
        self.value_stats.get(&slot).copied()
    }

    pub fn value_lower_bound(&self, slot: ValueSlot) -> Option<i64> {
        self.value_stats(slot).map(|s| s.lower)
    }

    pub fn value_upper_bound(&self, slot: ValueSlot) -> Option<i64> {
        self.value_stats(slot).map(|s| s.upper)
    }

    pub fn value_sum(&self, slot: ValueSlot) -> i64 {
        self.value_stats(slot).map_or(0, |s| s.sum)
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(terms: &[&str], count: i64) -> Document {
        let mut doc = Document::with_terms(terms.iter().copied());
        doc.set_value(0, count);
        doc
    }

    #[test]
    fn test_add_and_search() {
        let mut index = MemoryIndex::new();
        let a = index.add_document(doc(&["Sx", "B1"], 1));
        let b = index.add_document(doc(&["Sx", "B2"], 2));
        let c = index.add_document(doc(&["Sy", "B1"], 3));
        assert_eq!((a, b, c), (1, 2, 3));

        assert_eq!(index.search(&IndexQuery::term("B1")), vec![a, c]);
        assert_eq!(index.search(&IndexQuery::MatchAll), vec![a, b, c]);
        let q = IndexQuery::and_of_ors(vec![
            vec!["Sx".into(), "Sy".into()],
            vec!["B2".into()],
        ]);
        assert_eq!(index.search(&q), vec![b]);
        assert!(index.search(&IndexQuery::term("missing")).is_empty());
        assert!(index.search(&IndexQuery::Or(vec![])).is_empty());
    }

    #[test]
    fn test_find_exact() {
        let mut index = MemoryIndex::new();
        let id = index.add_document(doc(&["Sx", "Lx", "B1"], 1));
        assert_eq!(index.find_exact(&["B1", "Sx", "Lx"]), Some(id));
        assert_eq!(index.find_exact(&["B1", "Sx"]), None);
        assert_eq!(index.find_exact(&["B1", "Sx", "Lx", "Tx"]), None);
    }

    #[test]
    fn test_replace_updates_postings_and_values() {
        let mut index = MemoryIndex::new();
        let id = index.add_document(doc(&["a", "b"], 5));
        index.replace_document(id, doc(&["a", "c"], 7)).unwrap();

        assert_eq!(index.term_frequency("b"), 0);
        assert_eq!(index.search(&IndexQuery::term("c")), vec![id]);
        assert_eq!(index.value_sum(0), 7);
        assert_eq!(index.find_exact(&["a", "b"]), None);
        assert_eq!(index.find_exact(&["a", "c"]), Some(id));

        let err = index.replace_document(99, Document::new()).unwrap_err();
        assert!(matches!(err, IndexError::DocumentNotFound(99)));
    }

    #[test]
    fn test_value_bounds() {
        let mut index = MemoryIndex::new();
        assert_eq!(index.value_lower_bound(0), None);
        let a = index.add_document(doc(&["a"], -3));
        index.add_document(doc(&["b"], 10));
        assert_eq!(index.value_lower_bound(0), Some(-3));
        assert_eq!(index.value_upper_bound(0), Some(10));
        assert_eq!(index.value_sum(0), 7);

        index.delete_document(a).unwrap();
        assert_eq!(index.value_sum(0), 10);
        index.clear();
        assert_eq!(index.value_upper_bound(0), None);
        assert_eq!(index.next_doc_id(), 1);
    }

    #[test]
    fn test_terms_with_prefix() {
        let mut index = MemoryIndex::new();
        index.add_document(doc(&["S{\"r\":\"b\"}", "S{\"r\":\"a\"}", "B12101", "L[1]"], 1));
        let stations: Vec<&str> = index.terms_with_prefix("S").collect();
        assert_eq!(stations, vec!["S{\"r\":\"a\"}", "S{\"r\":\"b\"}"]);
        assert_eq!(index.terms_with_prefix("T").count(), 0);
    }

    #[test]
    fn test_from_documents_rejects_bad_ids() {
        let err = MemoryIndex::from_documents(2, vec![(5, Document::new())]).unwrap_err();
        assert!(matches!(err, IndexError::InvalidFormat(_)));

        let index = MemoryIndex::from_documents(4, vec![(1, doc(&["a"], 1)), (3, doc(&["b"], 2))]).unwrap();
        assert_eq!(index.doc_count(), 2);
        assert_eq!(index.value_sum(0), 3);
        assert_eq!(index.next_doc_id(), 4);
    }
}
