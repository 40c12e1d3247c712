mod common;

use common::TestResult;
use std::cmp::Ordering;
use std::sync::Arc;
use stylus::names::NamePool;
use stylus::tree::{
    Axis, BuildError, BuildOptions, NodeKind, NodeRef, NodeTest, Receiver, TreeBuilder, parse_document,
};

fn names<'d>(nodes: impl Iterator<Item = NodeRef<'d>>) -> Vec<String> {
    nodes
        .map(|n| match n.kind() {
            NodeKind::Root => "#root".to_string(),
            _ => n.display_name(),
        })
        .collect()
}

#[test]
fn three_level_tree_from_builder_events() -> TestResult {
    common::init_logging();
    let pool = NamePool::new_shared();
    let a = pool.allocate("", "", "elementA")?;
    let b = pool.allocate("", "", "elementB")?;
    let mut builder = TreeBuilder::new(Arc::clone(&pool));
    builder.start_document()?;
    builder.start_element(a, &[], &[])?;
    builder.start_element(b, &[], &[])?;
    builder.end_element()?;
    builder.end_element()?;
    builder.end_document()?;
    let doc = builder.finish()?;

    let root = doc.root();
    assert_eq!(names(root.axis(Axis::Child, NodeTest::AnyNode)), ["elementA"]);
    assert_eq!(names(root.axis(Axis::Descendant, NodeTest::AnyNode)), ["elementA", "elementB"]);
    let element_b = root
        .axis(Axis::Descendant, NodeTest::AnyNode)
        .last()
        .ok_or("no elementB")?;
    assert_eq!(names(element_b.axis(Axis::Ancestor, NodeTest::AnyNode)), ["elementA", "#root"]);
    Ok(())
}

#[test]
fn builder_requires_a_started_stream() {
    let builder = TreeBuilder::new(NamePool::new_shared());
    assert!(matches!(builder.finish(), Err(BuildError::NeverStarted)));
}

#[test]
fn parse_errors_carry_a_location() {
    let err = parse_document(
        "<a>\n<b></a>",
        NamePool::new_shared(),
        BuildOptions {
            line_numbering: false,
            system_id: Some("broken.xml".to_string()),
        },
    )
    .unwrap_err();
    let location = err.location();
    assert_eq!(location.system_id.as_deref(), Some("broken.xml"));
    assert!(location.line >= 1);
}

#[test]
fn document_order_agrees_with_every_axis() -> TestResult {
    let doc = parse_document(
        r#"<r a="1"><s><t/>text<!--c--></s><u b="2"><?pi data?></u></r>"#,
        NamePool::new_shared(),
        BuildOptions::default(),
    )?;
    let mut all: Vec<NodeRef<'_>> = Vec::new();
    for node in doc.root().axis(Axis::DescendantOrSelf, NodeTest::AnyNode) {
        all.push(node);
        all.extend(node.attributes());
    }
    for x in &all {
        for y in &all {
            let forward = x.compare(y);
            assert_eq!(forward, y.compare(x).reverse());
            assert_eq!(forward == Ordering::Equal, x == y);
        }
        for axis in Axis::ALL {
            let visited: Vec<NodeRef<'_>> = x.axis(axis, NodeTest::AnyNode).collect();
            for pair in visited.windows(2) {
                let order = pair[0].compare(&pair[1]);
                if axis.is_forwards() && !axis.is_reverse() {
                    assert_eq!(order, Ordering::Less, "{}", axis);
                } else if axis.is_reverse() && !axis.is_forwards() {
                    assert_eq!(order, Ordering::Greater, "{}", axis);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn name_tests_filter_axes() -> TestResult {
    let doc = parse_document(
        r#"<r xmlns:p="urn:p"><p:x/><x/><p:y/></r>"#,
        NamePool::new_shared(),
        BuildOptions::default(),
    )?;
    let r = doc.document_element().ok_or("empty document")?;
    let uri = doc.pool().uri_code_for("urn:p").ok_or("urn:p not interned")?;
    let in_p = NodeTest::Namespace(NodeKind::Element, uri);
    assert_eq!(names(r.axis(Axis::Child, in_p)), ["p:x", "p:y"]);
    let x = doc.pool().fingerprint_for("", "x").ok_or("x not interned")?;
    assert_eq!(names(r.axis(Axis::Child, NodeTest::Name(NodeKind::Element, x))), ["x"]);
    Ok(())
}
