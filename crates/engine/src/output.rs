//! Defines the `Outputter` trait, which decouples the executor from what is
//! done with the result (a tree, an event log, or plain text).
use crate::error::ExecutionError;
use std::sync::Arc;
use stylus_names::{NameCode, NamePool, NamespaceCode};
use stylus_tree::{Attribute, Document, Receiver, TreeBuilder};

/// The result events a transformation produces. Attributes and namespaces
/// belong to the most recently started element and must come before any of
/// its content.
pub trait Outputter {
    fn start_element(&mut self, name: NameCode) -> Result<(), ExecutionError>;
    fn namespace(&mut self, namespace: NamespaceCode) -> Result<(), ExecutionError>;
    fn attribute(&mut self, name: NameCode, value: &str) -> Result<(), ExecutionError>;
    fn end_element(&mut self) -> Result<(), ExecutionError>;
    fn text(&mut self, text: &str) -> Result<(), ExecutionError>;
    fn comment(&mut self, _text: &str) -> Result<(), ExecutionError> {
        Ok(())
    }
    fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<(), ExecutionError> {
        Ok(())
    }
}

struct PendingElement {
    name: NameCode,
    namespaces: Vec<NamespaceCode>,
    attributes: Vec<Attribute>,
}

/// Builds the result as a [`Document`] in the stylesheet's name pool.
pub struct TreeOutputter {
    builder: TreeBuilder,
    pending: Option<PendingElement>,
}

impl TreeOutputter {
    pub fn new(pool: Arc<NamePool>) -> Result<Self, ExecutionError> {
        let mut builder = TreeBuilder::new(pool);
        builder.start_document()?;
        Ok(TreeOutputter { builder, pending: None })
    }

    pub fn finish(mut self) -> Result<Document, ExecutionError> {
        self.flush()?;
        self.builder.end_document()?;
        Ok(self.builder.finish()?)
    }

    /// Writes the buffered start tag, if any.
    fn flush(&mut self) -> Result<(), ExecutionError> {
        if let Some(element) = self.pending.take() {
            self.builder
                .start_element(element.name, &element.namespaces, &element.attributes)?;
        }
        Ok(())
    }

    fn pending(&mut self, what: &str) -> Result<&mut PendingElement, ExecutionError> {
        self.pending
            .as_mut()
            .ok_or_else(|| ExecutionError::type_error(format!("{} written after element content", what)))
    }
}

impl Outputter for TreeOutputter {
    fn start_element(&mut self, name: NameCode) -> Result<(), ExecutionError> {
        self.flush()?;
        self.pending = Some(PendingElement {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
        });
        Ok(())
    }

    fn namespace(&mut self, namespace: NamespaceCode) -> Result<(), ExecutionError> {
        let element = self.pending("namespace")?;
        if !element.namespaces.contains(&namespace) {
            element.namespaces.push(namespace);
        }
        Ok(())
    }

    /// A second attribute with the same name replaces the first.
    fn attribute(&mut self, name: NameCode, value: &str) -> Result<(), ExecutionError> {
        let element = self.pending("attribute")?;
        let fingerprint = name.fingerprint();
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name.fingerprint() == fingerprint)
        {
            Some(existing) => *existing = Attribute::new(name, value),
            None => element.attributes.push(Attribute::new(name, value)),
        }
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ExecutionError> {
        self.flush()?;
        self.builder.end_element()?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.flush()?;
        self.builder.characters(text)?;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.flush()?;
        self.builder.comment(text)?;
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), ExecutionError> {
        self.flush()?;
        self.builder.processing_instruction(target, data)?;
        Ok(())
    }
}

/// One result event with its names resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    StartElement(String),
    Namespace { prefix: String, uri: String },
    Attribute { name: String, value: String },
    EndElement,
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

/// Records every event, for tests and diagnostics.
pub struct EventLog {
    pool: Arc<NamePool>,
    events: Vec<OutputEvent>,
}

impl EventLog {
    pub fn new(pool: Arc<NamePool>) -> Self {
        EventLog {
            pool,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<OutputEvent> {
        self.events
    }

    /// The concatenated text events.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                OutputEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Outputter for EventLog {
    fn start_element(&mut self, name: NameCode) -> Result<(), ExecutionError> {
        self.events
            .push(OutputEvent::StartElement(self.pool.display_name(name)?));
        Ok(())
    }

    fn namespace(&mut self, namespace: NamespaceCode) -> Result<(), ExecutionError> {
        self.events.push(OutputEvent::Namespace {
            prefix: self.pool.namespace_prefix(namespace)?.to_string(),
            uri: self.pool.namespace_uri(namespace)?.to_string(),
        });
        Ok(())
    }

    fn attribute(&mut self, name: NameCode, value: &str) -> Result<(), ExecutionError> {
        self.events.push(OutputEvent::Attribute {
            name: self.pool.display_name(name)?,
            value: value.to_string(),
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ExecutionError> {
        self.events.push(OutputEvent::EndElement);
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ExecutionError> {
        if !text.is_empty() {
            self.events.push(OutputEvent::Text(text.to_string()));
        }
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.events.push(OutputEvent::Comment(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), ExecutionError> {
        self.events.push(OutputEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }
}

/// Keeps only the text of the result; markup is discarded.
#[derive(Debug, Default)]
pub struct TextCollector {
    text: String,
}

impl TextCollector {
    pub fn new() -> Self {
        TextCollector::default()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Outputter for TextCollector {
    fn start_element(&mut self, _: NameCode) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn namespace(&mut self, _: NamespaceCode) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn attribute(&mut self, _: NameCode, _: &str) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn end_element(&mut self) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ExecutionError> {
        self.text.push_str(text);
        Ok(())
    }
}
