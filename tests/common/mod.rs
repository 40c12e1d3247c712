#![allow(dead_code)]

use std::sync::Arc;
use stylus::names::NamePool;
use stylus::tree::{BuildOptions, Document, parse_document};
use stylus::{Module, Stylesheet, StylesheetBuilder};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compiles `modules` in a fresh pool; the first module is the principal.
pub fn compile(modules: Vec<Module>) -> Result<Stylesheet, stylus::CompileError> {
    let principal = modules.first().map(|m| m.name.clone()).unwrap_or_default();
    let mut builder = StylesheetBuilder::new(NamePool::new_shared());
    for module in modules {
        builder.add_module(module);
    }
    builder.compile(&principal)
}

/// Parses `source` into the stylesheet's pool without whitespace stripping.
pub fn source_for(stylesheet: &Stylesheet, source: &str) -> Result<Document, stylus::BuildError> {
    parse_document(source, Arc::clone(stylesheet.pool()), BuildOptions::default())
}

/// `<list>` holding `count` `<i>` elements, each containing `text`.
pub fn sibling_chain(count: usize, text: &str) -> String {
    let mut source = String::with_capacity(count * (text.len() + 8) + 13);
    source.push_str("<list>");
    for _ in 0..count {
        source.push_str("<i>");
        source.push_str(text);
        source.push_str("</i>");
    }
    source.push_str("</list>");
    source
}
