//! # stylus
//!
//! A template-transformation core. The workspace crates are re-exported here:
//!
//! - [`names`]: the name pool that interns qualified names into name codes.
//! - [`tree`]: immutable source trees, axes, document order and the tree
//!   builder.
//! - [`rules`]: match patterns, modes and rule selection.
//! - [`engine`]: stylesheet compilation and the executor.
//!
//! [`transform`] runs a compiled stylesheet over markup text and returns the
//! result tree.
//!
//! ```
//! use stylus::{ExecutionConfig, Instruction, Module, StylesheetBuilder, Template, names::NamePool};
//!
//! let stylesheet = StylesheetBuilder::new(NamePool::new_shared())
//!     .module(Module::new("main").template(
//!         Template::matching("/").body(vec![Instruction::element("count", vec![Instruction::value_of("count")])]),
//!     ))
//!     .compile("main")?;
//! let result = stylus::transform(&stylesheet, "<count>3</count>", &ExecutionConfig::default())?;
//! assert_eq!(result.document_element().unwrap().string_value(), "3");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub use stylus_engine as engine;
pub use stylus_names as names;
pub use stylus_rules as rules;
pub use stylus_tree as tree;

pub use stylus_engine::{
    CancelHandle, CompileError, EventLog, ExecutionConfig, ExecutionError, Executor, GlobalVariable, Instruction,
    Module, OutputEvent, Outputter, Stylesheet, StylesheetBuilder, Template, TreeOutputter,
};
pub use stylus_rules::AmbiguityPolicy;
pub use stylus_tree::{BuildError, BuildOptions, Document};

use log::debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("source error: {0}")]
    Source(#[from] BuildError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Parses `source` in the stylesheet's name pool, runs the stylesheet over
/// it and returns the result tree.
pub fn transform(stylesheet: &Stylesheet, source: &str, config: &ExecutionConfig) -> Result<Document, TransformError> {
    let document = stylesheet.parse_source(source, BuildOptions::default(), config)?;
    debug!("Parsed source: {} nodes", document.node_count());
    let mut out = TreeOutputter::new(Arc::clone(stylesheet.pool()))?;
    Executor::new(stylesheet, &document, config.clone())?.run(&mut out)?;
    Ok(out.finish()?)
}

/// Like [`transform`], but returns the result as a list of events.
pub fn transform_to_events(
    stylesheet: &Stylesheet,
    source: &str,
    config: &ExecutionConfig,
) -> Result<Vec<OutputEvent>, TransformError> {
    let document = stylesheet.parse_source(source, BuildOptions::default(), config)?;
    let mut out = EventLog::new(Arc::clone(stylesheet.pool()));
    Executor::new(stylesheet, &document, config.clone())?.run(&mut out)?;
    Ok(out.into_events())
}
