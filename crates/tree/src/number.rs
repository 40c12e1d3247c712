//! Node numbering at the three levels: `single`, `any` and `multiple`.
//!
//! `count` selects the nodes that are counted; when absent, nodes with the
//! same kind and name as the node being numbered are counted. `from` marks
//! where counting restarts; when absent, counting runs from the root.
use crate::axis::Axis;
use crate::node::NodeRef;
use crate::test::NodeTest;

/// A predicate over nodes, typically a compiled match pattern.
pub type NodePredicate<'p> = &'p dyn Fn(&NodeRef<'_>) -> bool;

/// The test matching nodes of the same kind and name as `node`.
pub fn same_kind_and_name(node: &NodeRef<'_>) -> NodeTest {
    match node.fingerprint() {
        Some(fingerprint) => NodeTest::Name(node.kind(), fingerprint),
        None => NodeTest::Kind(node.kind()),
    }
}

/// One plus the number of preceding siblings with the same kind and name.
pub fn count_simple(node: &NodeRef<'_>) -> usize {
    1 + node
        .axis(Axis::PrecedingSibling, same_kind_and_name(node))
        .count()
}

/// Level `single`: finds the nearest ancestor-or-self matching `count`
/// (stopping at a node matching `from`) and returns one plus the number of
/// its preceding siblings that match `count`. Zero if there is no such node.
pub fn count_single(
    node: &NodeRef<'_>,
    count: Option<NodePredicate<'_>>,
    from: Option<NodePredicate<'_>>,
) -> usize {
    if count.is_none() && from.is_none() {
        return count_simple(node);
    }
    let default_test = same_kind_and_name(node);
    let matches_count = |n: &NodeRef<'_>| match count {
        Some(count) => count(n),
        None => default_test.matches(n),
    };

    let mut target = *node;
    while !matches_count(&target) {
        target = match target.parent() {
            Some(parent) => parent,
            None => return 0,
        };
        if from.is_some_and(|from| from(&target)) {
            return 0;
        }
    }

    1 + target
        .axis(Axis::PrecedingSibling, NodeTest::AnyNode)
        .filter(|sibling| matches_count(sibling))
        .count()
}

/// Level `any`: one plus the number of nodes before `node` in document order
/// (ancestors included) that match `count`, counting back no further than
/// the nearest node matching `from`.
///
/// Walks the preceding-or-ancestor axis once, in reverse document order.
pub fn count_any(
    node: &NodeRef<'_>,
    count: Option<NodePredicate<'_>>,
    from: Option<NodePredicate<'_>>,
) -> usize {
    let default_test = same_kind_and_name(node);
    let matches_count = |n: &NodeRef<'_>| match count {
        Some(count) => count(n),
        None => default_test.matches(n),
    };

    let mut number = usize::from(matches_count(node));
    for previous in node.axis(Axis::PrecedingOrAncestor, NodeTest::AnyNode) {
        if from.is_some_and(|from| from(&previous)) {
            break;
        }
        if matches_count(&previous) {
            number += 1;
        }
    }
    number
}

/// Level `multiple`: for each ancestor-or-self that matches `count`, below
/// the nearest ancestor matching `from`, its `single` number. Outermost first.
pub fn count_multiple(
    node: &NodeRef<'_>,
    count: Option<NodePredicate<'_>>,
    from: Option<NodePredicate<'_>>,
) -> Vec<usize> {
    let default_test = same_kind_and_name(node);
    let matches_count = |n: &NodeRef<'_>| match count {
        Some(count) => count(n),
        None => default_test.matches(n),
    };

    let mut numbers = Vec::new();
    let mut current = Some(*node);
    while let Some(n) = current {
        if matches_count(&n) {
            numbers.push(
                1 + n
                    .axis(Axis::PrecedingSibling, NodeTest::AnyNode)
                    .filter(|sibling| matches_count(sibling))
                    .count(),
            );
        }
        current = n.parent().filter(|parent| !from.is_some_and(|from| from(parent)));
    }
    numbers.reverse();
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildOptions;
    use crate::document::Document;
    use crate::node::NodeKind;
    use crate::stripper::StripAll;
    use crate::xml::parse_document_with_policy;
    use stylus_names::NamePool;

    const BOOK: &str = r#"
        <book>
          <chapter><title>A</title><section/><section/></chapter>
          <note/>
          <chapter><title>B</title><section/><section><para/></section></chapter>
        </book>"#;

    fn book() -> Document {
        parse_document_with_policy(BOOK, NamePool::new_shared(), BuildOptions::default(), StripAll).unwrap()
    }

    fn elements<'d>(doc: &'d Document, local: &str) -> Vec<NodeRef<'d>> {
        let fingerprint = doc.pool().fingerprint_for("", local).unwrap();
        doc.all_elements(fingerprint).collect()
    }

    fn named(local: &'static str) -> impl Fn(&NodeRef<'_>) -> bool {
        move |n: &NodeRef<'_>| n.kind() == NodeKind::Element && &*n.local_name() == local
    }

    #[test]
    fn simple_numbers_count_same_named_siblings() {
        let doc = book();
        let chapters = elements(&doc, "chapter");
        assert_eq!(count_simple(&chapters[0]), 1);
        assert_eq!(count_simple(&chapters[1]), 2);
        let note = elements(&doc, "note")[0];
        assert_eq!(count_simple(&note), 1);
    }

    #[test]
    fn single_level_climbs_to_the_counted_ancestor() {
        let doc = book();
        let para = elements(&doc, "para")[0];
        let chapter = named("chapter");
        assert_eq!(count_single(&para, Some(&chapter), None), 2);
        let section = named("section");
        assert_eq!(count_single(&para, Some(&section), None), 2);
        let missing = named("appendix");
        assert_eq!(count_single(&para, Some(&missing), None), 0);
    }

    #[test]
    fn single_level_stops_at_from() {
        let doc = book();
        let para = elements(&doc, "para")[0];
        let chapter = named("chapter");
        let section = named("section");
        assert_eq!(count_single(&para, Some(&chapter), Some(&section)), 0);
    }

    #[test]
    fn any_level_counts_across_the_document() {
        let doc = book();
        let sections = elements(&doc, "section");
        let numbers: Vec<usize> = sections.iter().map(|s| count_any(s, None, None)).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        let chapter = named("chapter");
        assert_eq!(count_any(&sections[3], None, Some(&chapter)), 2);
    }

    #[test]
    fn any_level_counts_ancestors() {
        let doc = book();
        let para = elements(&doc, "para")[0];
        let any_element = |n: &NodeRef<'_>| n.kind() == NodeKind::Element;
        // book, chapter, title, 2 sections, note, chapter, title, 2 sections, para.
        assert_eq!(count_any(&para, Some(&any_element), None), 11);
    }

    #[test]
    fn multiple_level_numbers_each_counted_ancestor() {
        let doc = book();
        let para = elements(&doc, "para")[0];
        let counted = |n: &NodeRef<'_>| {
            n.kind() == NodeKind::Element
                && matches!(&*n.local_name(), "chapter" | "section" | "para")
        };
        assert_eq!(count_multiple(&para, Some(&counted), None), vec![2, 2, 1]);

        let chapter = named("chapter");
        assert_eq!(count_multiple(&para, Some(&counted), Some(&chapter)), vec![2, 1]);
    }
}
