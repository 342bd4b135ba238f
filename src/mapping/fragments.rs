use crate::parsing::Node;
use dashmap::DashMap;
use std::sync::Arc;

/// Reusable `sql` fragments keyed by `namespace.id`.
///
/// Clones share the same table, so every mapping document parsed for one configuration
/// can reference fragments declared by the others.
#[derive(Debug, Clone, Default)]
pub struct SqlFragments {
    fragments: Arc<DashMap<String, Node>>,
}

impl SqlFragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fragment. A later declaration with the same id replaces the earlier one.
    pub fn insert(&self, id: impl Into<String>, fragment: Node) {
        self.fragments.insert(id.into(), fragment);
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        self.fragments.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let fragments = SqlFragments::new();
        let shared = fragments.clone();
        shared.insert("blog.columns", Node::new("sql").text("id, title"));
        assert!(fragments.contains("blog.columns"));
        assert_eq!(
            fragments.get("blog.columns").unwrap().text.as_deref(),
            Some("id, title")
        );
    }
}
