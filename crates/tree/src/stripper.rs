//! Whitespace stripping during tree construction.
//!
//! A [`Stripper`] sits between an event source and a [`Receiver`] and drops
//! text nodes that consist entirely of whitespace, unless the element they
//! appear in preserves space. An `xml:space` attribute on an element
//! overrides the policy and is inherited by its descendants until
//! re-specified.
use crate::builder::{Attribute, Receiver, xml_space_name};
use crate::error::BuildError;
use stylus_names::{Fingerprint, NameCode, NamePool, NamespaceCode};

/// Decides, per element name, whether whitespace-only text directly inside
/// elements of that name is kept.
pub trait SpacePolicy {
    fn is_space_preserving(&self, element: NameCode) -> bool;
}

/// Keeps all whitespace. The default when no policy is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveAll;

impl SpacePolicy for PreserveAll {
    fn is_space_preserving(&self, _element: NameCode) -> bool {
        true
    }
}

/// Strips whitespace-only text everywhere `xml:space` does not say otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripAll;

impl SpacePolicy for StripAll {
    fn is_space_preserving(&self, _element: NameCode) -> bool {
        false
    }
}

impl<F> SpacePolicy for F
where
    F: Fn(NameCode) -> bool,
{
    fn is_space_preserving(&self, element: NameCode) -> bool {
        self(element)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// The nearest `xml:space` setting in scope: `Some(true)` for
    /// `preserve`, `Some(false)` for `default`.
    xml_space: Option<bool>,
    preserve: bool,
}

/// A [`Receiver`] filter that applies a [`SpacePolicy`].
pub struct Stripper<R, P> {
    next: R,
    policy: P,
    xml_space: Fingerprint,
    stack: Vec<Frame>,
    pending: String,
}

impl<R: Receiver, P: SpacePolicy> Stripper<R, P> {
    /// Allocates the `xml:space` name in `pool`, which must be the pool the
    /// incoming name codes come from.
    pub fn new(next: R, policy: P, pool: &NamePool) -> Result<Self, BuildError> {
        Ok(Stripper {
            next,
            policy,
            xml_space: xml_space_name(pool)?.fingerprint(),
            stack: Vec::new(),
            pending: String::new(),
        })
    }

    pub fn into_inner(self) -> R {
        self.next
    }

    fn preserving(&self) -> bool {
        // Text outside the document element is never significant.
        self.stack.last().is_some_and(|frame| frame.preserve)
    }

    fn flush(&mut self) -> Result<(), BuildError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let text = std::mem::take(&mut self.pending);
        if self.preserving() || !is_whitespace(&text) {
            self.next.characters(&text)?;
        }
        Ok(())
    }
}

impl<R: Receiver, P: SpacePolicy> Receiver for Stripper<R, P> {
    fn set_location(&mut self, line: usize, column: usize) {
        self.next.set_location(line, column)
    }

    fn start_document(&mut self) -> Result<(), BuildError> {
        self.next.start_document()
    }

    fn end_document(&mut self) -> Result<(), BuildError> {
        self.flush()?;
        self.next.end_document()
    }

    fn start_element(
        &mut self,
        name: NameCode,
        namespaces: &[NamespaceCode],
        attributes: &[Attribute],
    ) -> Result<(), BuildError> {
        self.flush()?;
        let inherited = self.stack.last().and_then(|frame| frame.xml_space);
        let xml_space = attributes
            .iter()
            .find(|attr| attr.name.fingerprint() == self.xml_space)
            .and_then(|attr| match attr.value.trim() {
                "preserve" => Some(true),
                "default" => Some(false),
                _ => None,
            })
            .or(inherited);
        let preserve = match xml_space {
            Some(true) => true,
            _ => self.policy.is_space_preserving(name),
        };
        self.stack.push(Frame { xml_space, preserve });
        self.next.start_element(name, namespaces, attributes)
    }

    fn end_element(&mut self) -> Result<(), BuildError> {
        self.flush()?;
        self.stack.pop();
        self.next.end_element()
    }

    fn characters(&mut self, text: &str) -> Result<(), BuildError> {
        self.pending.push_str(text);
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), BuildError> {
        self.flush()?;
        self.next.comment(text)
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BuildError> {
        self.flush()?;
        self.next.processing_instruction(target, data)
    }
}

/// XML whitespace: space, tab, carriage return and line feed.
pub fn is_whitespace(text: &str) -> bool {
    text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::node::NodeKind;
    use std::sync::Arc;
    use stylus_names::standard;

    struct Names {
        pool: Arc<NamePool>,
        doc: NameCode,
        pre: NameCode,
        p: NameCode,
        space: NameCode,
    }

    fn names() -> Names {
        let pool = NamePool::new_shared();
        Names {
            doc: pool.allocate("", "", "doc").unwrap(),
            pre: pool.allocate("", "", "pre").unwrap(),
            p: pool.allocate("", "", "p").unwrap(),
            space: pool.allocate("xml", standard::XML, "space").unwrap(),
            pool,
        }
    }

    /// `<doc> <p> </p> <pre> <p> </p> </pre> x </doc>` with optional `xml:space` on `pre`.
    fn feed<R: Receiver>(target: &mut R, n: &Names, pre_space: Option<&str>) {
        let pre_attrs: Vec<Attribute> = pre_space
            .map(|v| vec![Attribute::new(n.space, v)])
            .unwrap_or_default();
        target.start_document().unwrap();
        target.start_element(n.doc, &[], &[]).unwrap();
        target.characters(" ").unwrap();
        target.start_element(n.p, &[], &[]).unwrap();
        target.characters("\n\t").unwrap();
        target.end_element().unwrap();
        target.characters(" ").unwrap();
        target.start_element(n.pre, &[], &pre_attrs).unwrap();
        target.characters(" ").unwrap();
        target.start_element(n.p, &[], &[]).unwrap();
        target.characters("  ").unwrap();
        target.end_element().unwrap();
        target.end_element().unwrap();
        target.characters(" x ").unwrap();
        target.end_element().unwrap();
        target.end_document().unwrap();
    }

    fn text_count(builder: TreeBuilder) -> usize {
        let doc = builder.finish().unwrap();
        doc.root()
            .axis(crate::axis::Axis::Descendant, crate::test::NodeTest::Kind(NodeKind::Text))
            .count()
    }

    #[test]
    fn strip_all_keeps_only_significant_text() {
        let n = names();
        let builder = TreeBuilder::new(Arc::clone(&n.pool));
        let mut stripper = Stripper::new(builder, StripAll, &n.pool).unwrap();
        feed(&mut stripper, &n, None);
        assert_eq!(text_count(stripper.into_inner()), 1);
    }

    #[test]
    fn xml_space_preserve_is_inherited() {
        let n = names();
        let builder = TreeBuilder::new(Arc::clone(&n.pool));
        let mut stripper = Stripper::new(builder, StripAll, &n.pool).unwrap();
        feed(&mut stripper, &n, Some("preserve"));
        // " " inside pre, "  " inside the nested p, and " x ".
        assert_eq!(text_count(stripper.into_inner()), 3);
    }

    #[test]
    fn xml_space_default_restores_the_policy() {
        let n = names();
        let pre = n.pre;
        let policy = move |name: NameCode| name == pre;
        let builder = TreeBuilder::new(Arc::clone(&n.pool));
        let mut stripper = Stripper::new(builder, policy, &n.pool).unwrap();
        feed(&mut stripper, &n, Some("default"));
        // The policy preserves pre's own whitespace child only.
        assert_eq!(text_count(stripper.into_inner()), 2);
    }

    #[test]
    fn preserve_all_keeps_everything() {
        let n = names();
        let builder = TreeBuilder::new(Arc::clone(&n.pool));
        let mut stripper = Stripper::new(builder, PreserveAll, &n.pool).unwrap();
        feed(&mut stripper, &n, None);
        assert_eq!(text_count(stripper.into_inner()), 6);
    }

    #[test]
    fn whitespace_classification() {
        assert!(is_whitespace(" \t\r\n"));
        assert!(is_whitespace(""));
        assert!(!is_whitespace("\u{a0}"));
        assert!(!is_whitespace(" x "));
    }
}
