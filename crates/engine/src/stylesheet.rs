//! The compiled, immutable form of a stylesheet. One `Stylesheet` can be
//! shared by any number of concurrent runs.
use crate::config::ExecutionConfig;
use crate::expression::Expr;
use crate::instruction::NumberLevel;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stylus_names::{NameCode, NamePool, NamespaceCode};
use stylus_rules::{ModeName, Pattern, RuleManager, SpaceRules};
use stylus_tree::{BuildError, BuildOptions, Document, parse_document, parse_document_with_policy};

/// Where a variable or parameter value comes from.
#[derive(Debug, Clone)]
pub(crate) enum ValueSource {
    Select(Expr),
    /// The text produced by running the instructions.
    Body(Vec<Op>),
    /// The empty string.
    Empty,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledParam {
    pub(crate) name: Arc<str>,
    pub(crate) value: ValueSource,
}

#[derive(Debug, Clone)]
pub(crate) struct ParamSlot {
    pub(crate) name: Arc<str>,
    pub(crate) slot: usize,
    pub(crate) default: ValueSource,
}

#[derive(Debug, Clone)]
pub(crate) enum Op {
    ApplyTemplates {
        select: Option<Expr>,
        mode: ModeName,
        params: Vec<CompiledParam>,
    },
    ApplyImports {
        params: Vec<CompiledParam>,
    },
    CallTemplate {
        target: usize,
        params: Vec<CompiledParam>,
        context: Option<Expr>,
        /// Set when this is a self-call with nothing left to do after it.
        tail: bool,
    },
    Variable {
        slot: usize,
        value: ValueSource,
    },
    Text(String),
    ValueOf(Expr),
    Element {
        name: NameCode,
        namespaces: Vec<NamespaceCode>,
        attributes: Vec<(NameCode, Expr)>,
        body: Vec<Op>,
    },
    If {
        test: Expr,
        body: Vec<Op>,
    },
    Choose {
        whens: Vec<(Expr, Vec<Op>)>,
        otherwise: Vec<Op>,
    },
    ForEach {
        select: Expr,
        body: Vec<Op>,
    },
    Number {
        level: NumberLevel,
        count: Option<Pattern>,
        from: Option<Pattern>,
        value: Option<Expr>,
    },
    Message {
        select: Option<Expr>,
        body: Vec<Op>,
        terminate: bool,
    },
}

#[derive(Debug)]
pub struct CompiledTemplate {
    pub(crate) label: String,
    pub(crate) name: Option<String>,
    pub(crate) module: String,
    pub(crate) precedence: i32,
    /// The lowest precedence among the modules this template's module
    /// imports, directly or indirectly.
    pub(crate) min_import_precedence: i32,
    pub(crate) params: Vec<ParamSlot>,
    pub(crate) body: Vec<Op>,
    pub(crate) frame_size: usize,
    pub(crate) tail_recursive: bool,
}

impl CompiledTemplate {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    pub fn min_import_precedence(&self) -> i32 {
        self.min_import_precedence
    }

    /// Local variable slots this template needs, parameters included.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// True if the template calls itself in tail position, so the call runs
    /// as a loop instead of nesting.
    pub fn is_tail_recursive(&self) -> bool {
        self.tail_recursive
    }
}

#[derive(Debug)]
pub(crate) struct CompiledGlobal {
    pub(crate) name: String,
    pub(crate) is_param: bool,
    pub(crate) value: ValueSource,
    pub(crate) frame_size: usize,
}

pub struct Stylesheet {
    pub(crate) pool: Arc<NamePool>,
    pub(crate) templates: Vec<CompiledTemplate>,
    pub(crate) named: HashMap<String, usize>,
    pub(crate) rules: RuleManager<usize>,
    pub(crate) globals: Vec<CompiledGlobal>,
    pub(crate) global_names: HashMap<String, usize>,
    pub(crate) space: SpaceRules,
    pub(crate) max_frame_size: usize,
}

impl Stylesheet {
    pub fn pool(&self) -> &Arc<NamePool> {
        &self.pool
    }

    pub fn rules(&self) -> &RuleManager<usize> {
        &self.rules
    }

    pub fn space_rules(&self) -> &SpaceRules {
        &self.space
    }

    pub fn templates(&self) -> &[CompiledTemplate] {
        &self.templates
    }

    /// The template a call by `name` reaches: the one with the highest
    /// import precedence.
    pub fn named_template(&self, name: &str) -> Option<&CompiledTemplate> {
        self.named.get(name).map(|&i| &self.templates[i])
    }

    /// The largest frame any template or global initializer needs; every
    /// frame of a run is allocated at this size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(|g| g.name.as_str())
    }

    /// Builds a source tree in this stylesheet's name pool, stripping
    /// whitespace as the stylesheet declares unless `config` turns that off.
    pub fn parse_source(
        &self,
        text: &str,
        options: BuildOptions,
        config: &ExecutionConfig,
    ) -> Result<Document, BuildError> {
        if config.strip_whitespace && self.space.strips_anything() {
            parse_document_with_policy(text, Arc::clone(&self.pool), options, self.space.clone())
        } else {
            parse_document(text, Arc::clone(&self.pool), options)
        }
    }
}

impl fmt::Debug for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stylesheet")
            .field("templates", &self.templates.len())
            .field("rules", &self.rules.rule_count())
            .field("globals", &self.globals.len())
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}
