//! Reads XML text with quick-xml and pushes the events into a [`Receiver`].
use crate::builder::{Attribute, BuildOptions, Receiver, TreeBuilder};
use crate::document::Document;
use crate::error::{BuildError, Location};
use crate::stripper::{SpacePolicy, Stripper, is_whitespace};
use log::debug;
use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use std::sync::Arc;
use stylus_names::{NamePool, NamespaceResolver};

/// Parses `source` into a new document whose names are interned in `pool`.
pub fn parse_document(
    source: &str,
    pool: Arc<NamePool>,
    options: BuildOptions,
) -> Result<Document, BuildError> {
    let system_id = options.system_id.clone();
    let mut builder = TreeBuilder::with_options(Arc::clone(&pool), options);
    drive(source, &pool, &mut builder, system_id.as_deref())?;
    builder.finish()
}

/// As [`parse_document`], dropping whitespace-only text according to `policy`.
pub fn parse_document_with_policy<P: SpacePolicy>(
    source: &str,
    pool: Arc<NamePool>,
    options: BuildOptions,
    policy: P,
) -> Result<Document, BuildError> {
    let system_id = options.system_id.clone();
    let builder = TreeBuilder::with_options(Arc::clone(&pool), options);
    let mut stripper = Stripper::new(builder, policy, &pool)?;
    drive(source, &pool, &mut stripper, system_id.as_deref())?;
    stripper.into_inner().finish()
}

/// The namespace declarations in scope while reading.
#[derive(Debug, Default)]
struct NamespaceScope {
    bindings: Vec<(String, String)>,
    /// `bindings.len()` at the start of each open element.
    marks: Vec<usize>,
}

impl NamespaceScope {
    fn push(&mut self) {
        self.marks.push(self.bindings.len());
    }

    fn declare(&mut self, prefix: &str, uri: &str) {
        self.bindings.push((prefix.to_string(), uri.to_string()));
    }

    fn pop(&mut self) {
        if let Some(mark) = self.marks.pop() {
            self.bindings.truncate(mark);
        }
    }

    fn depth(&self) -> usize {
        self.marks.len()
    }
}

impl NamespaceResolver for NamespaceScope {
    fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .filter(|uri| !uri.is_empty() || prefix.is_empty())
    }
}

/// Converts byte offsets into line and column numbers, scanning the input
/// only once as offsets increase.
struct LineTracker<'s> {
    source: &'s str,
    offset: usize,
    line: usize,
    line_start: usize,
}

impl<'s> LineTracker<'s> {
    fn new(source: &'s str) -> Self {
        LineTracker {
            source,
            offset: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn advance_to(&mut self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.source.len());
        if pos > self.offset {
            let scanned = &self.source.as_bytes()[self.offset..pos];
            for (i, b) in scanned.iter().enumerate() {
                if *b == b'\n' {
                    self.line += 1;
                    self.line_start = self.offset + i + 1;
                }
            }
            self.offset = pos;
        }
        (self.line, pos - self.line_start + 1)
    }
}

struct Driver<'a, 's> {
    pool: &'a NamePool,
    receiver: &'a mut dyn Receiver,
    scope: NamespaceScope,
    lines: LineTracker<'s>,
    system_id: Option<&'a str>,
    location: (usize, usize),
}

impl Driver<'_, '_> {
    fn error(&self, message: impl Into<String>) -> BuildError {
        let (line, column) = self.location;
        BuildError::malformed(message, Location::new(line, column, self.system_id.map(str::to_string)))
    }

    fn start_element(&mut self, e: &BytesStart<'_>) -> Result<(), BuildError> {
        self.scope.push();
        let mut declarations = Vec::new();
        let mut raw_attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| self.error(err.to_string()))?;
            let key = utf8(attr.key.as_ref()).map_err(|m| self.error(m))?;
            let raw = utf8(&attr.value).map_err(|m| self.error(m))?;
            let value = unescape(raw).map_err(|err| self.error(err.to_string()))?.into_owned();
            if key == "xmlns" {
                declarations.push(self.pool.allocate_namespace_code("", &value)?);
                self.scope.declare("", &value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.is_empty() {
                    return Err(self.error(format!("cannot undeclare prefix '{}'", prefix)));
                }
                declarations.push(self.pool.allocate_namespace_code(prefix, &value)?);
                self.scope.declare(prefix, &value);
            } else {
                raw_attributes.push((key.to_string(), value));
            }
        }

        let raw_name = e.name();
        let qname = utf8(raw_name.as_ref()).map_err(|m| self.error(m))?;
        let name = self.pool.allocate_lexical(qname, &self.scope, true)?;
        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value) in raw_attributes {
            let code = self.pool.allocate_lexical(&key, &self.scope, false)?;
            if attributes.iter().any(|a: &Attribute| a.name.fingerprint() == code.fingerprint()) {
                return Err(self.error(format!("duplicate attribute '{}'", key)));
            }
            attributes.push(Attribute::new(code, value));
        }
        self.receiver.start_element(name, &declarations, &attributes)
    }

    fn end_element(&mut self) -> Result<(), BuildError> {
        self.scope.pop();
        self.receiver.end_element()
    }

    fn text(&mut self, text: &str) -> Result<(), BuildError> {
        if self.scope.depth() == 0 {
            if is_whitespace(text) {
                return Ok(());
            }
            return Err(self.error("character data outside the document element"));
        }
        self.receiver.characters(text)
    }
}

/// Reads `source` and forwards its events to `receiver`, resolving namespace
/// prefixes and interning every name in `pool`.
///
/// Whitespace outside the document element is discarded. Character and
/// predefined entity references are expanded; any other entity reference is
/// an error.
pub fn drive(
    source: &str,
    pool: &NamePool,
    receiver: &mut dyn Receiver,
    system_id: Option<&str>,
) -> Result<(), BuildError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut driver = Driver {
        pool,
        receiver,
        scope: NamespaceScope::default(),
        lines: LineTracker::new(source),
        system_id,
        location: (1, 1),
    };

    driver.receiver.set_location(1, 1);
    driver.receiver.start_document()?;
    let mut seen_element = false;
    loop {
        let pos = reader.buffer_position() as usize;
        driver.location = driver.lines.advance_to(pos);
        let (line, column) = driver.location;
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(err) => {
                let (line, column) = driver.lines.advance_to(reader.error_position() as usize);
                driver.location = (line, column);
                return Err(driver.error(err.to_string()));
            }
        };
        driver.receiver.set_location(line, column);
        match event {
            Event::Start(e) => {
                seen_element = true;
                driver.start_element(&e)?;
            }
            Event::Empty(e) => {
                seen_element = true;
                driver.start_element(&e)?;
                driver.end_element()?;
            }
            Event::End(_) => driver.end_element()?,
            Event::Text(e) => {
                let raw = utf8(&e).map_err(|m| driver.error(m))?;
                let text = unescape(raw).map_err(|err| driver.error(err.to_string()))?;
                driver.text(&text)?;
            }
            Event::CData(e) => {
                let text = utf8(&e).map_err(|m| driver.error(m))?;
                driver.text(text)?;
            }
            Event::GeneralRef(e) => {
                let resolved = match e.resolve_char_ref() {
                    Ok(Some(ch)) => ch.to_string(),
                    Ok(None) => {
                        let name = utf8(&e).map_err(|m| driver.error(m))?;
                        resolve_predefined_entity(name)
                            .ok_or_else(|| driver.error(format!("unknown entity '&{};'", name)))?
                            .to_string()
                    }
                    Err(err) => return Err(driver.error(err.to_string())),
                };
                driver.text(&resolved)?;
            }
            Event::Comment(e) => {
                let text = utf8(&e).map_err(|m| driver.error(m))?;
                driver.receiver.comment(text)?;
            }
            Event::PI(e) => {
                let target = utf8(e.target()).map_err(|m| driver.error(m))?;
                let data = utf8(e.content()).map_err(|m| driver.error(m))?;
                driver
                    .receiver
                    .processing_instruction(target, data.trim_start())?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_element {
        return Err(driver.error("no document element"));
    }
    if driver.scope.depth() != 0 {
        return Err(driver.error(format!("{} element(s) left open", driver.scope.depth())));
    }
    debug!("Parsed {} bytes of XML from {}", source.len(), system_id.unwrap_or("<string>"));
    driver.receiver.end_document()
}

fn utf8(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|err| format!("invalid UTF-8: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use crate::node::NodeKind;
    use crate::stripper::StripAll;
    use crate::test::NodeTest;

    fn parse(source: &str) -> Result<Document, BuildError> {
        parse_document(source, NamePool::new_shared(), BuildOptions::default())
    }

    #[test]
    fn builds_elements_attributes_and_text() {
        let doc = parse(r#"<?xml version="1.0"?><a x="1"><b>one &amp; two</b><!--c--><?pi data?></a>"#)
            .unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(&*a.local_name(), "a");
        let x = doc.pool().fingerprint_for("", "x").unwrap();
        assert_eq!(a.attribute_value(x), Some("1"));
        let kinds: Vec<NodeKind> = a.children().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Element, NodeKind::Comment, NodeKind::ProcessingInstruction]
        );
        assert_eq!(a.string_value(), "one & two");
        let pi = a.children().nth(2).unwrap();
        assert_eq!(pi.display_name(), "pi");
        assert_eq!(pi.string_value(), "data");
    }

    #[test]
    fn character_references_and_cdata_merge_into_text() {
        let doc = parse("<a>x&#65;<![CDATA[<y>]]>&lt;</a>").unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(a.children().count(), 1);
        assert_eq!(a.string_value(), "xA<y><");
    }

    #[test]
    fn resolves_namespaces() {
        let doc = parse(r#"<p:a xmlns:p="urn:p" xmlns="urn:d"><b p:c="v"/></p:a>"#).unwrap();
        let a = doc.document_element().unwrap();
        assert_eq!(&*a.uri(), "urn:p");
        assert_eq!(&*a.prefix(), "p");
        let b = a.children().next().unwrap();
        assert_eq!(&*b.uri(), "urn:d");
        let c = b.attributes().next().unwrap();
        assert_eq!(&*c.uri(), "urn:p");
        assert_eq!(c.string_value(), "v");

        let in_scope: Vec<String> = b
            .axis(Axis::Namespace, NodeTest::AnyNode)
            .map(|n| n.local_name().to_string())
            .collect();
        assert_eq!(in_scope, vec!["p".to_string(), "".to_string(), "xml".to_string()]);
    }

    #[test]
    fn default_namespace_undeclaration_hides_outer_binding() {
        let doc = parse(r#"<a xmlns="urn:d"><b xmlns=""/></a>"#).unwrap();
        let b = doc.document_element().unwrap().children().next().unwrap();
        assert_eq!(&*b.uri(), "");
        let namespaces: Vec<String> = b
            .axis(Axis::Namespace, NodeTest::AnyNode)
            .map(|n| n.string_value())
            .collect();
        assert_eq!(namespaces, vec![stylus_names::standard::XML.to_string()]);
    }

    #[test]
    fn undeclared_prefix_is_an_error() {
        assert!(matches!(parse("<p:a/>"), Err(BuildError::Names(_))));
    }

    #[test]
    fn malformed_input_reports_a_location() {
        let err = parse("<a>\n  <b></c>\n</a>").unwrap_err();
        let location = err.location();
        assert_eq!(location.line, 2);
    }

    #[test]
    fn empty_input_fails() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
    }

    #[test]
    fn line_numbers_follow_the_input() {
        let options = BuildOptions {
            line_numbering: true,
            system_id: None,
        };
        let doc = parse_document("<a>\n<b/>\n\n<c/></a>", NamePool::new_shared(), options).unwrap();
        let lines: Vec<Option<u32>> = doc
            .document_element()
            .unwrap()
            .axis(Axis::Child, NodeTest::Kind(NodeKind::Element))
            .map(|n| n.line_number())
            .collect();
        assert_eq!(lines, vec![Some(2), Some(4)]);
    }

    #[test]
    fn policy_strips_indentation() {
        let source = "<list>\n  <item>a</item>\n  <item xml:space=\"preserve\"> </item>\n</list>";
        let doc = parse_document_with_policy(source, NamePool::new_shared(), BuildOptions::default(), StripAll)
            .unwrap();
        let list = doc.document_element().unwrap();
        assert_eq!(list.children().count(), 2);
        let texts = list
            .axis(Axis::Descendant, NodeTest::Kind(NodeKind::Text))
            .count();
        assert_eq!(texts, 2);
    }
}
