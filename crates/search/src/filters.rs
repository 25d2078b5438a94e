use retrieval_chunker::Chunk;
use std::collections::BTreeMap;

/// Equality constraints on chunk metadata.
///
/// `hard` pairs exclude every candidate that does not match exactly.
/// `soft` pairs never exclude; they only feed reranking boosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub hard: BTreeMap<String, String>,
    pub soft: BTreeMap<String, String>,
}

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hard filters only
    pub fn exact<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            hard: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            soft: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn hard(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hard.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn soft(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.soft.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn has_hard(&self) -> bool {
        !self.hard.is_empty()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hard.is_empty() && self.soft.is_empty()
    }

    /// Every hard pair matches; a key the chunk lacks is a mismatch
    #[must_use]
    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.hard
            .iter()
            .all(|(key, value)| chunk.field(key) == Some(value.as_str()))
    }

    /// Requested value for `key`, hard filters taking precedence
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.hard
            .get(key)
            .or_else(|| self.soft.get(key))
            .map(String::as_str)
    }

    /// Copy holding only the hard pairs
    #[must_use]
    pub fn hard_only(&self) -> Self {
        Self {
            hard: self.hard.clone(),
            soft: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_filters_are_exact_and_case_sensitive() {
        let chunk = Chunk::new("c", "doc-1", "text")
            .with_meta("jurisdiction", "ON")
            .source_name("act.pdf");

        assert!(Filters::new().matches(&chunk));
        assert!(Filters::new().hard("jurisdiction", "ON").matches(&chunk));
        assert!(!Filters::new().hard("jurisdiction", "on").matches(&chunk));
        assert!(Filters::new().hard("doc_id", "doc-1").matches(&chunk));
        assert!(!Filters::new().hard("province", "ON").matches(&chunk));
        assert!(Filters::exact([("source_name", "act.pdf"), ("doc_id", "doc-1")]).matches(&chunk));
    }

    #[test]
    fn soft_filters_never_exclude() {
        let chunk = Chunk::new("c", "d", "text");
        let filters = Filters::new().soft("offence_number", "123");
        assert!(filters.matches(&chunk));
        assert!(!filters.has_hard());
        assert!(!filters.is_empty());
        assert_eq!(filters.value("offence_number"), Some("123"));
    }

    #[test]
    fn hard_value_wins_over_soft() {
        let filters = Filters::new().soft("province", "BC").hard("province", "ON");
        assert_eq!(filters.value("province"), Some("ON"));
        assert_eq!(filters.hard_only().soft.len(), 0);
    }
}
