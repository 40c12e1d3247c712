//! Instructions as declared in a template body, before compilation.
use crate::expression::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An expression as written: path text compiled with the module's
/// namespace bindings, or an expression supplied directly.
#[derive(Clone)]
pub enum Select {
    Path(String),
    Custom(Expr),
}

impl fmt::Debug for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Select::Path(text) => write!(f, "Path({:?})", text),
            Select::Custom(expr) => write!(f, "Custom({:?})", expr),
        }
    }
}

impl From<&str> for Select {
    fn from(text: &str) -> Self {
        Select::Path(text.to_string())
    }
}

impl From<String> for Select {
    fn from(text: String) -> Self {
        Select::Path(text)
    }
}

impl From<Expr> for Select {
    fn from(expr: Expr) -> Self {
        Select::Custom(expr)
    }
}

/// A parameter passed by apply-templates, apply-imports or call-template.
#[derive(Debug, Clone)]
pub struct WithParam {
    pub name: String,
    pub select: Option<Select>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberLevel {
    #[default]
    Single,
    Any,
    Multiple,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    /// Processes `select` (by default the children of the context node)
    /// with the best rule of `mode` for each node.
    ApplyTemplates {
        select: Option<Select>,
        mode: Option<String>,
        params: Vec<WithParam>,
    },
    /// Processes the context node with the rules the current rule's module
    /// imports.
    ApplyImports { params: Vec<WithParam> },
    /// Invokes a named template. With `context`, the template runs with the
    /// first selected node as its context node, and not at all when the
    /// selection is empty.
    CallTemplate {
        name: String,
        params: Vec<WithParam>,
        context: Option<Select>,
    },
    Variable {
        name: String,
        select: Option<Select>,
        body: Vec<Instruction>,
    },
    Text(String),
    ValueOf(Select),
    /// A literal result element. Attribute values are expressions.
    Element {
        name: String,
        attributes: Vec<(String, Select)>,
        body: Vec<Instruction>,
    },
    If {
        test: Select,
        body: Vec<Instruction>,
    },
    Choose {
        whens: Vec<(Select, Vec<Instruction>)>,
        otherwise: Vec<Instruction>,
    },
    ForEach {
        select: Select,
        body: Vec<Instruction>,
    },
    /// Writes the number of the context node, or of `value` when given.
    Number {
        level: NumberLevel,
        count: Option<String>,
        from: Option<String>,
        value: Option<Select>,
    },
    Message {
        select: Option<Select>,
        body: Vec<Instruction>,
        terminate: bool,
    },
}

impl Instruction {
    pub fn text(text: &str) -> Self {
        Instruction::Text(text.to_string())
    }

    pub fn value_of(select: impl Into<Select>) -> Self {
        Instruction::ValueOf(select.into())
    }

    /// Apply-templates to the children of the context node.
    pub fn apply_templates() -> Self {
        Instruction::ApplyTemplates {
            select: None,
            mode: None,
            params: Vec::new(),
        }
    }

    pub fn apply_templates_to(select: impl Into<Select>) -> Self {
        Instruction::ApplyTemplates {
            select: Some(select.into()),
            mode: None,
            params: Vec::new(),
        }
    }

    pub fn apply_imports() -> Self {
        Instruction::ApplyImports { params: Vec::new() }
    }

    pub fn call_template(name: &str) -> Self {
        Instruction::CallTemplate {
            name: name.to_string(),
            params: Vec::new(),
            context: None,
        }
    }

    pub fn variable(name: &str, select: impl Into<Select>) -> Self {
        Instruction::Variable {
            name: name.to_string(),
            select: Some(select.into()),
            body: Vec::new(),
        }
    }

    pub fn element(name: &str, body: Vec<Instruction>) -> Self {
        Instruction::Element {
            name: name.to_string(),
            attributes: Vec::new(),
            body,
        }
    }

    pub fn when(test: impl Into<Select>, body: Vec<Instruction>) -> Self {
        Instruction::If {
            test: test.into(),
            body,
        }
    }

    pub fn for_each(select: impl Into<Select>, body: Vec<Instruction>) -> Self {
        Instruction::ForEach {
            select: select.into(),
            body,
        }
    }

    pub fn message(select: impl Into<Select>, terminate: bool) -> Self {
        Instruction::Message {
            select: Some(select.into()),
            body: Vec::new(),
            terminate,
        }
    }

    /// Sets the mode of an apply-templates instruction.
    pub fn in_mode(mut self, name: &str) -> Self {
        if let Instruction::ApplyTemplates { mode, .. } = &mut self {
            *mode = Some(name.to_string());
        }
        self
    }

    /// Sets the context selection of a call-template instruction.
    pub fn on(mut self, select: impl Into<Select>) -> Self {
        if let Instruction::CallTemplate { context, .. } = &mut self {
            *context = Some(select.into());
        }
        self
    }

    /// Adds a parameter to an apply-templates, apply-imports or
    /// call-template instruction.
    pub fn with_param(mut self, name: &str, select: impl Into<Select>) -> Self {
        let param = WithParam {
            name: name.to_string(),
            select: Some(select.into()),
            body: Vec::new(),
        };
        match &mut self {
            Instruction::ApplyTemplates { params, .. }
            | Instruction::ApplyImports { params }
            | Instruction::CallTemplate { params, .. } => params.push(param),
            _ => {}
        }
        self
    }

    /// Adds an attribute to a literal result element.
    pub fn with_attribute(mut self, name: &str, select: impl Into<Select>) -> Self {
        if let Instruction::Element { attributes, .. } = &mut self {
            attributes.push((name.to_string(), select.into()));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_the_matching_variant() {
        let apply = Instruction::apply_templates_to("item").in_mode("toc").with_param("n", "1");
        match apply {
            Instruction::ApplyTemplates { select, mode, params } => {
                assert!(matches!(select, Some(Select::Path(p)) if p == "item"));
                assert_eq!(mode.as_deref(), Some("toc"));
                assert_eq!(params.len(), 1);
                assert_eq!(params[0].name, "n");
            }
            other => panic!("unexpected {:?}", other),
        }

        let call = Instruction::call_template("walk").on("following-sibling::*[1]");
        assert!(matches!(call, Instruction::CallTemplate { context: Some(_), .. }));
    }

    #[test]
    fn modifiers_ignore_other_variants() {
        let text = Instruction::text("x").in_mode("m").with_param("p", "1").on(".");
        assert!(matches!(text, Instruction::Text(t) if t == "x"));
    }

    #[test]
    fn number_levels_deserialize_in_lowercase() {
        let level: NumberLevel = serde_json::from_str("\"multiple\"").unwrap();
        assert_eq!(level, NumberLevel::Multiple);
    }
}
