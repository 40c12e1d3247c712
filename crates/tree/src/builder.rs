//! Push-style construction of [`Document`]s.
use crate::document::{AttributeData, Document, DocumentParts, NamespaceData, NodeData};
use crate::error::BuildError;
use crate::node::NodeKind;
use log::trace;
use std::sync::Arc;
use stylus_names::{NameCode, NamePool, NamePoolError, NamespaceCode, standard};

/// An attribute as delivered with a start-of-element event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: NameCode,
    pub value: String,
}

impl Attribute {
    pub fn new(name: NameCode, value: impl Into<String>) -> Self {
        Attribute {
            name,
            value: value.into(),
        }
    }
}

/// The event contract between a markup parser and whatever consumes its
/// output (a tree builder, or a filter in front of one).
pub trait Receiver {
    /// Position of the next event in the input, for diagnostics and line numbering.
    fn set_location(&mut self, _line: usize, _column: usize) {}

    fn start_document(&mut self) -> Result<(), BuildError>;

    fn end_document(&mut self) -> Result<(), BuildError>;

    /// `namespaces` are the declarations written on this element.
    fn start_element(
        &mut self,
        name: NameCode,
        namespaces: &[NamespaceCode],
        attributes: &[Attribute],
    ) -> Result<(), BuildError>;

    fn end_element(&mut self) -> Result<(), BuildError>;

    fn characters(&mut self, text: &str) -> Result<(), BuildError>;

    fn comment(&mut self, text: &str) -> Result<(), BuildError>;

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BuildError>;
}

impl<R: Receiver + ?Sized> Receiver for &mut R {
    fn set_location(&mut self, line: usize, column: usize) {
        (**self).set_location(line, column)
    }
    fn start_document(&mut self) -> Result<(), BuildError> {
        (**self).start_document()
    }
    fn end_document(&mut self) -> Result<(), BuildError> {
        (**self).end_document()
    }
    fn start_element(
        &mut self,
        name: NameCode,
        namespaces: &[NamespaceCode],
        attributes: &[Attribute],
    ) -> Result<(), BuildError> {
        (**self).start_element(name, namespaces, attributes)
    }
    fn end_element(&mut self) -> Result<(), BuildError> {
        (**self).end_element()
    }
    fn characters(&mut self, text: &str) -> Result<(), BuildError> {
        (**self).characters(text)
    }
    fn comment(&mut self, text: &str) -> Result<(), BuildError> {
        (**self).comment(text)
    }
    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BuildError> {
        (**self).processing_instruction(target, data)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Record the input line of every node.
    pub line_numbering: bool,
    pub system_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Open,
    Finished,
}

/// Builds an arena tree from [`Receiver`] events.
///
/// Adjacent character events are merged into one text node and empty text
/// is dropped. Every name code must have been issued by the builder's pool.
pub struct TreeBuilder {
    pool: Arc<NamePool>,
    options: BuildOptions,
    state: State,
    nodes: Vec<NodeData>,
    attributes: Vec<AttributeData>,
    namespaces: Vec<NamespaceData>,
    text: String,
    line_numbers: Vec<u32>,
    line: usize,
    /// Indices of the open elements, innermost last; the root is at the bottom.
    open: Vec<u32>,
    /// The most recent node at each depth, for linking siblings.
    previous_at_depth: Vec<Option<u32>>,
    xml_namespace_name: Option<NameCode>,
}

impl TreeBuilder {
    pub fn new(pool: Arc<NamePool>) -> Self {
        Self::with_options(pool, BuildOptions::default())
    }

    pub fn with_options(pool: Arc<NamePool>, options: BuildOptions) -> Self {
        TreeBuilder {
            pool,
            options,
            state: State::NotStarted,
            nodes: Vec::new(),
            attributes: Vec::new(),
            namespaces: Vec::new(),
            text: String::new(),
            line_numbers: Vec::new(),
            line: 0,
            open: Vec::new(),
            previous_at_depth: Vec::new(),
            xml_namespace_name: None,
        }
    }

    pub fn pool(&self) -> &Arc<NamePool> {
        &self.pool
    }

    /// Completes the build. Fails if the stream never started or left
    /// elements open.
    pub fn finish(self) -> Result<Document, BuildError> {
        match self.state {
            State::NotStarted => return Err(BuildError::NeverStarted),
            State::Open if self.open.len() > 1 => return Err(BuildError::Unclosed(self.open.len() - 1)),
            _ => {}
        }
        trace!(
            "Built document with {} nodes and {} attributes",
            self.nodes.len(),
            self.attributes.len()
        );
        let line_numbers = self.options.line_numbering.then_some(self.line_numbers);
        Ok(Document::from_parts(
            self.pool,
            DocumentParts {
                nodes: self.nodes,
                attributes: self.attributes,
                namespaces: self.namespaces,
                text: self.text,
                system_id: self.options.system_id,
                line_numbers,
                xml_namespace_name: self.xml_namespace_name,
            },
        ))
    }

    fn check_open(&self) -> Result<(), BuildError> {
        match self.state {
            State::NotStarted => Err(BuildError::NotStarted),
            State::Finished => Err(BuildError::AlreadyFinished),
            State::Open => Ok(()),
        }
    }

    fn check_pool(&self, code: NameCode) -> Result<(), BuildError> {
        debug_assert_eq!(code.pool(), self.pool.id(), "name code from a foreign pool");
        if code.pool() != self.pool.id() {
            return Err(NamePoolError::ForeignNameCode {
                code: code.bits(),
                issuer: code.pool(),
                resolver: self.pool.id(),
            }
            .into());
        }
        Ok(())
    }

    fn buffer_offset(&self) -> Result<u32, BuildError> {
        u32::try_from(self.text.len()).map_err(|_| BuildError::TooLarge(u32::MAX as usize))
    }

    fn push_content(&mut self, content: &str) -> Result<(u32, u32), BuildError> {
        let start = self.buffer_offset()?;
        self.text.push_str(content);
        Ok((start, self.buffer_offset()?))
    }

    /// Appends a node under the innermost open element and links it to its
    /// previous sibling.
    fn add_node(
        &mut self,
        kind: NodeKind,
        name: Option<NameCode>,
        content: (u32, u32),
    ) -> Result<u32, BuildError> {
        let index = u32::try_from(self.nodes.len()).map_err(|_| BuildError::TooLarge(u32::MAX as usize))?;
        let depth = self.open.len();
        let parent = self.open.last().copied();

        if self.previous_at_depth.len() <= depth {
            self.previous_at_depth.resize(depth + 1, None);
        }
        if let Some(previous) = self.previous_at_depth[depth] {
            self.nodes[previous as usize].next_sibling = Some(index);
        }
        self.previous_at_depth[depth] = Some(index);

        let attribute_start = self.attributes.len() as u32;
        let namespace_start = self.namespaces.len() as u32;
        self.nodes.push(NodeData {
            kind,
            depth: depth as u32,
            parent,
            next_sibling: None,
            name,
            content,
            attributes: (attribute_start, attribute_start),
            namespaces: (namespace_start, namespace_start),
        });
        if self.options.line_numbering {
            self.line_numbers.push(self.line as u32);
        }
        Ok(index)
    }
}

impl Receiver for TreeBuilder {
    fn set_location(&mut self, line: usize, _column: usize) {
        self.line = line;
    }

    fn start_document(&mut self) -> Result<(), BuildError> {
        if self.state != State::NotStarted {
            return Err(BuildError::AlreadyFinished);
        }
        self.state = State::Open;
        self.xml_namespace_name = Some(self.pool.allocate("", "", "xml")?);
        let root = self.add_node(NodeKind::Root, None, (0, 0))?;
        self.open.push(root);
        self.previous_at_depth.push(None);
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), BuildError> {
        self.check_open()?;
        if self.open.len() > 1 {
            return Err(BuildError::Unclosed(self.open.len() - 1));
        }
        self.state = State::Finished;
        Ok(())
    }

    fn start_element(
        &mut self,
        name: NameCode,
        namespaces: &[NamespaceCode],
        attributes: &[Attribute],
    ) -> Result<(), BuildError> {
        self.check_open()?;
        self.check_pool(name)?;
        let index = self.add_node(NodeKind::Element, Some(name), (0, 0))?;

        for &code in namespaces {
            let prefix = self.pool.namespace_prefix(code)?;
            let uri = self.pool.namespace_uri(code)?;
            let name = if prefix.is_empty() {
                None
            } else {
                Some(self.pool.allocate("", "", &prefix)?)
            };
            self.namespaces.push(NamespaceData { code, name, uri });
        }
        for attribute in attributes {
            self.check_pool(attribute.name)?;
            self.attributes.push(AttributeData {
                parent: index,
                name: attribute.name,
                value: attribute.value.as_str().into(),
            });
        }

        let node = &mut self.nodes[index as usize];
        node.namespaces.1 = self.namespaces.len() as u32;
        node.attributes.1 = self.attributes.len() as u32;

        self.open.push(index);
        let depth = self.open.len();
        self.previous_at_depth.truncate(depth);
        self.previous_at_depth.resize(depth + 1, None);
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), BuildError> {
        self.check_open()?;
        if self.open.len() <= 1 {
            return Err(BuildError::UnbalancedEnd);
        }
        self.open.pop();
        self.previous_at_depth.truncate(self.open.len() + 1);
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), BuildError> {
        self.check_open()?;
        if text.is_empty() {
            return Ok(());
        }
        let depth = self.open.len();
        let last = self.nodes.len() - 1;
        let merge = self.previous_at_depth.get(depth).copied().flatten() == Some(last as u32)
            && self.nodes[last].kind == NodeKind::Text;
        if merge {
            self.text.push_str(text);
            let end = self.buffer_offset()?;
            self.nodes[last].content.1 = end;
            return Ok(());
        }
        let content = self.push_content(text)?;
        self.add_node(NodeKind::Text, None, content)?;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), BuildError> {
        self.check_open()?;
        let content = self.push_content(text)?;
        self.add_node(NodeKind::Comment, None, content)?;
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), BuildError> {
        self.check_open()?;
        let name = self.pool.allocate("", "", target)?;
        let content = self.push_content(data)?;
        self.add_node(NodeKind::ProcessingInstruction, Some(name), content)?;
        Ok(())
    }
}

/// The `xml:space` attribute name, allocated in `pool`.
pub(crate) fn xml_space_name(pool: &NamePool) -> Result<NameCode, NamePoolError> {
    pool.allocate("xml", standard::XML, "space")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use crate::test::NodeTest;

    fn pool() -> Arc<NamePool> {
        NamePool::new_shared()
    }

    #[test]
    fn events_before_start_are_rejected() {
        let mut builder = TreeBuilder::new(pool());
        assert!(matches!(builder.characters("x"), Err(BuildError::NotStarted)));
    }

    #[test]
    fn finishing_without_start_fails() {
        let builder = TreeBuilder::new(pool());
        assert!(matches!(builder.finish(), Err(BuildError::NeverStarted)));
    }

    #[test]
    fn unclosed_elements_fail_the_build() {
        let pool = pool();
        let a = pool.allocate("", "", "a").unwrap();
        let mut builder = TreeBuilder::new(Arc::clone(&pool));
        builder.start_document().unwrap();
        builder.start_element(a, &[], &[]).unwrap();
        assert!(matches!(builder.end_document(), Err(BuildError::Unclosed(1))));
        assert!(matches!(builder.finish(), Err(BuildError::Unclosed(1))));
    }

    #[test]
    fn unbalanced_end_is_reported() {
        let mut builder = TreeBuilder::new(pool());
        builder.start_document().unwrap();
        assert!(matches!(builder.end_element(), Err(BuildError::UnbalancedEnd)));
    }

    #[test]
    fn adjacent_text_is_merged_and_empty_text_dropped() {
        let pool = pool();
        let p = pool.allocate("", "", "p").unwrap();
        let mut builder = TreeBuilder::new(Arc::clone(&pool));
        builder.start_document().unwrap();
        builder.start_element(p, &[], &[]).unwrap();
        builder.characters("Hello, ").unwrap();
        builder.characters("").unwrap();
        builder.characters("world").unwrap();
        builder.comment("c").unwrap();
        builder.characters("!").unwrap();
        builder.end_element().unwrap();
        builder.end_document().unwrap();
        let doc = builder.finish().unwrap();

        let para = doc.document_element().unwrap();
        let texts: Vec<String> = para
            .axis(Axis::Child, NodeTest::Kind(NodeKind::Text))
            .map(|t| t.string_value())
            .collect();
        assert_eq!(texts, vec!["Hello, world".to_string(), "!".to_string()]);
        assert_eq!(para.string_value(), "Hello, world!");
    }

    #[test]
    fn foreign_name_codes_are_rejected() {
        let other = NamePool::new();
        let foreign = other.allocate("", "", "a").unwrap();
        let mut builder = TreeBuilder::new(pool());
        builder.start_document().unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            builder.start_element(foreign, &[], &[])
        }));
        // Debug builds assert; release builds return the error.
        match result {
            Err(_) => {}
            Ok(outcome) => assert!(matches!(outcome, Err(BuildError::Names(_)))),
        }
    }

    #[test]
    fn line_numbers_are_recorded_when_requested() {
        let pool = pool();
        let a = pool.allocate("", "", "a").unwrap();
        let options = BuildOptions {
            line_numbering: true,
            system_id: Some("mem:doc".into()),
        };
        let mut builder = TreeBuilder::with_options(Arc::clone(&pool), options);
        builder.set_location(1, 1);
        builder.start_document().unwrap();
        builder.set_location(3, 5);
        builder.start_element(a, &[], &[]).unwrap();
        builder.end_element().unwrap();
        builder.end_document().unwrap();
        let doc = builder.finish().unwrap();
        assert_eq!(doc.system_id(), Some("mem:doc"));
        assert_eq!(doc.document_element().unwrap().line_number(), Some(3));
    }
}
