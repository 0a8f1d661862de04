//! Boolean term queries.

/// A boolean combination of exact term matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    MatchAll,
    Term(String),
    And(Vec<IndexQuery>),
    Or(Vec<IndexQuery>),
}

impl IndexQuery {
    pub fn term(term: impl Into<String>) -> Self {
        IndexQuery::Term(term.into())
    }

    /// Documents having at least one of `terms`. An empty list matches nothing.
    pub fn any_of<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut alternatives: Vec<IndexQuery> = terms.into_iter().map(IndexQuery::term).collect();
        if alternatives.len() == 1 {
            alternatives.pop().unwrap_or(IndexQuery::MatchAll)
        } else {
            IndexQuery::Or(alternatives)
        }
    }

    /// AND of ORs: each group contributes one alternative set.
    ///
    /// No groups at all means nothing is constrained: `MatchAll`.
    pub fn and_of_ors(groups: Vec<Vec<String>>) -> Self {
        let mut clauses: Vec<IndexQuery> = groups.into_iter().map(IndexQuery::any_of).collect();
        match clauses.len() {
            0 => IndexQuery::MatchAll,
            1 => clauses.pop().unwrap_or(IndexQuery::MatchAll),
            _ => IndexQuery::And(clauses),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, IndexQuery::MatchAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_of_ors_shapes() {
        assert!(IndexQuery::and_of_ors(vec![]).is_match_all());
        assert_eq!(
            IndexQuery::and_of_ors(vec![vec!["a".into()]]),
            IndexQuery::term("a")
        );
        assert_eq!(
            IndexQuery::and_of_ors(vec![vec!["a".into(), "b".into()], vec!["c".into()]]),
            IndexQuery::And(vec![
                IndexQuery::Or(vec![IndexQuery::term("a"), IndexQuery::term("b")]),
                IndexQuery::term("c"),
            ])
        );
        assert_eq!(IndexQuery::any_of(Vec::<String>::new()), IndexQuery::Or(vec![]));
    }
}
