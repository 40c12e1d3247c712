//! Whitespace strip/preserve declarations for source documents.
use crate::error::PatternError;
use std::cmp::Ordering;
use std::sync::Arc;
use stylus_names::{NameCode, NamePool, NamePoolError, NamespaceResolver, standard};
use stylus_tree::{NodeKind, NodeTest, SpacePolicy};

#[derive(Debug, Clone)]
struct SpaceRule {
    test: NodeTest,
    preserve: bool,
    precedence: i32,
    sequence: usize,
}

/// Element-name tests that say whether whitespace-only text is stripped.
///
/// The most specific test at the highest precedence decides: a name beats
/// `prefix:*`, which beats `*`. Among equals the later declaration wins.
/// Elements matched by no test preserve whitespace.
#[derive(Debug, Clone)]
pub struct SpaceRules {
    pool: Arc<NamePool>,
    rules: Vec<SpaceRule>,
}

impl SpaceRules {
    pub fn new(pool: Arc<NamePool>) -> Self {
        SpaceRules {
            pool,
            rules: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True if some element could have whitespace stripped.
    pub fn strips_anything(&self) -> bool {
        self.rules.iter().any(|rule| !rule.preserve)
    }

    pub fn add(&mut self, test: NodeTest, preserve: bool, precedence: i32) {
        let sequence = self.rules.len();
        self.rules.push(SpaceRule {
            test,
            preserve,
            precedence,
            sequence,
        });
    }

    /// Adds every test in a whitespace-separated list such as `"* x:*
    /// para"`.
    pub fn add_list(
        &mut self,
        tests: &str,
        preserve: bool,
        precedence: i32,
        resolver: &dyn NamespaceResolver,
    ) -> Result<(), PatternError> {
        for token in tests.split_whitespace() {
            let test = self.parse_test(token, resolver)?;
            self.add(test, preserve, precedence);
        }
        Ok(())
    }

    fn parse_test(&self, token: &str, resolver: &dyn NamespaceResolver) -> Result<NodeTest, PatternError> {
        if token == "*" {
            return Ok(NodeTest::Kind(NodeKind::Element));
        }
        if let Some(prefix) = token.strip_suffix(":*") {
            let uri = match prefix {
                "xml" => standard::XML.to_string(),
                p => resolver
                    .resolve_prefix(p)
                    .ok_or_else(|| NamePoolError::UndeclaredPrefix(p.to_string()))?,
            };
            return Ok(NodeTest::Namespace(NodeKind::Element, self.pool.allocate_uri(&uri)?));
        }
        let name = self.pool.allocate_lexical(token, resolver, false)?;
        Ok(NodeTest::Name(NodeKind::Element, name.fingerprint()))
    }
}

impl SpacePolicy for SpaceRules {
    fn is_space_preserving(&self, element: NameCode) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.test.matches_parts(NodeKind::Element, Some(element), &self.pool))
            .max_by(|a, b| {
                a.precedence
                    .cmp(&b.precedence)
                    .then_with(|| {
                        a.test
                            .default_priority()
                            .partial_cmp(&b.test.default_priority())
                            .unwrap_or(Ordering::Equal)
                    })
                    .then(a.sequence.cmp(&b.sequence))
            })
            .is_none_or(|rule| rule.preserve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use stylus_tree::{Axis, BuildOptions, parse_document_with_policy};

    fn bindings() -> HashMap<String, String> {
        HashMap::from([("x".to_string(), "urn:x".to_string())])
    }

    #[test]
    fn most_specific_test_decides() {
        let pool = NamePool::new_shared();
        let mut rules = SpaceRules::new(Arc::clone(&pool));
        rules.add_list("*", false, 0, &bindings()).unwrap();
        rules.add_list("pre x:*", true, 0, &bindings()).unwrap();

        let pre = pool.allocate("", "", "pre").unwrap();
        let para = pool.allocate("", "", "para").unwrap();
        let code = pool.allocate("x", "urn:x", "code").unwrap();
        assert!(rules.is_space_preserving(pre));
        assert!(!rules.is_space_preserving(para));
        assert!(rules.is_space_preserving(code));
        assert!(rules.strips_anything());
    }

    #[test]
    fn precedence_outranks_specificity() {
        let pool = NamePool::new_shared();
        let mut rules = SpaceRules::new(Arc::clone(&pool));
        rules.add_list("pre", true, 0, &bindings()).unwrap();
        rules.add_list("*", false, 1, &bindings()).unwrap();
        let pre = pool.allocate("", "", "pre").unwrap();
        assert!(!rules.is_space_preserving(pre));
    }

    #[test]
    fn unmatched_elements_preserve() {
        let pool = NamePool::new_shared();
        let rules = SpaceRules::new(Arc::clone(&pool));
        assert!(rules.is_space_preserving(pool.allocate("", "", "a").unwrap()));
        assert!(!rules.strips_anything());
    }

    #[test]
    fn undeclared_prefix_is_reported() {
        let pool = NamePool::new_shared();
        let mut rules = SpaceRules::new(pool);
        assert!(rules.add_list("q:*", false, 0, &bindings()).is_err());
    }

    #[test]
    fn drives_the_tree_stripper() {
        let pool = NamePool::new_shared();
        let mut rules = SpaceRules::new(Arc::clone(&pool));
        rules.add_list("*", false, 0, &bindings()).unwrap();
        rules.add_list("pre", true, 0, &bindings()).unwrap();
        let doc = parse_document_with_policy(
            "<doc>\n  <pre> </pre>\n  <p> </p>\n</doc>",
            Arc::clone(&pool),
            BuildOptions::default(),
            rules,
        )
        .unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(root.children().count(), 2);
        let texts: Vec<String> = root
            .axis(Axis::Descendant, NodeTest::Kind(NodeKind::Text))
            .map(|t| t.string_value())
            .collect();
        assert_eq!(texts, vec![" ".to_string()]);
    }
}
