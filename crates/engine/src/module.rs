//! Stylesheet modules and their top-level declarations.
use crate::instruction::{Instruction, Select};
use std::collections::HashMap;
use stylus_rules::Pattern;

/// A match pattern as declared: text compiled with the module's namespace
/// bindings, or a pattern built by the host.
#[derive(Debug, Clone)]
pub enum MatchPattern {
    Text(String),
    Compiled(Pattern),
}

/// A template parameter with an optional default.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub select: Option<Select>,
    pub body: Vec<Instruction>,
}

/// A template: a rule when it has a match pattern, callable by name when
/// it has a name, or both.
#[derive(Debug, Clone, Default)]
pub struct Template {
    pub pattern: Option<MatchPattern>,
    pub name: Option<String>,
    pub mode: Option<String>,
    pub priority: Option<f64>,
    pub params: Vec<Param>,
    pub body: Vec<Instruction>,
}

impl Template {
    pub fn matching(pattern: &str) -> Self {
        Template {
            pattern: Some(MatchPattern::Text(pattern.to_string())),
            ..Template::default()
        }
    }

    pub fn matching_pattern(pattern: Pattern) -> Self {
        Template {
            pattern: Some(MatchPattern::Compiled(pattern)),
            ..Template::default()
        }
    }

    pub fn named(name: &str) -> Self {
        Template {
            name: Some(name.to_string()),
            ..Template::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn param(mut self, name: &str, default: Option<Select>) -> Self {
        self.params.push(Param {
            name: name.to_string(),
            select: default,
            body: Vec::new(),
        });
        self
    }

    pub fn body(mut self, body: Vec<Instruction>) -> Self {
        self.body = body;
        self
    }

    /// Text used to identify the template in diagnostics.
    pub fn label(&self) -> String {
        match (&self.name, &self.pattern) {
            (Some(name), _) => name.clone(),
            (None, Some(MatchPattern::Text(text))) => format!("match=\"{}\"", text),
            (None, Some(MatchPattern::Compiled(pattern))) => format!("match=\"{}\"", pattern.text()),
            (None, None) => "(anonymous)".to_string(),
        }
    }
}

/// A stylesheet-level variable, or a parameter the host may set.
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub select: Option<Select>,
    pub body: Vec<Instruction>,
    pub is_param: bool,
}

impl GlobalVariable {
    pub fn variable(name: &str, select: impl Into<Select>) -> Self {
        GlobalVariable {
            name: name.to_string(),
            select: Some(select.into()),
            body: Vec::new(),
            is_param: false,
        }
    }

    pub fn param(name: &str, default: Option<Select>) -> Self {
        GlobalVariable {
            name: name.to_string(),
            select: default,
            body: Vec::new(),
            is_param: true,
        }
    }
}

/// One stylesheet module. Included modules share the includer's import
/// precedence; imported modules rank below it.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    /// Prefix bindings for names in patterns, expressions and literal
    /// result elements. The `""` entry is the default element namespace.
    pub namespaces: HashMap<String, String>,
    pub imports: Vec<String>,
    pub includes: Vec<String>,
    pub templates: Vec<Template>,
    pub globals: Vec<GlobalVariable>,
    /// Whitespace-separated element tests, as in `"* x:*"`.
    pub strip_space: Vec<String>,
    pub preserve_space: Vec<String>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            ..Module::default()
        }
    }

    pub fn namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.insert(prefix.to_string(), uri.to_string());
        self
    }

    pub fn import(mut self, module: &str) -> Self {
        self.imports.push(module.to_string());
        self
    }

    pub fn include(mut self, module: &str) -> Self {
        self.includes.push(module.to_string());
        self
    }

    pub fn template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    pub fn global(mut self, global: GlobalVariable) -> Self {
        self.globals.push(global);
        self
    }

    pub fn strip_space(mut self, tests: &str) -> Self {
        self.strip_space.push(tests.to_string());
        self
    }

    pub fn preserve_space(mut self, tests: &str) -> Self {
        self.preserve_space.push(tests.to_string());
        self
    }
}
