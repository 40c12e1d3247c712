//! # stylus-engine
//!
//! Compiles stylesheet [`Module`]s into an immutable [`Stylesheet`] and runs
//! it over source documents. Compilation assigns import precedence, binds
//! variables to frame slots, sizes frames and marks tail calls; the
//! [`Executor`] dispatches each selected node to its best template rule.
//!
//! ```
//! use std::sync::Arc;
//! use stylus_engine::{EventLog, ExecutionConfig, Executor, Instruction, Module, StylesheetBuilder, Template};
//! use stylus_names::NamePool;
//! use stylus_tree::BuildOptions;
//!
//! let stylesheet = StylesheetBuilder::new(NamePool::new_shared())
//!     .module(Module::new("main").template(
//!         Template::matching("item").body(vec![Instruction::text("<"), Instruction::value_of("."), Instruction::text(">")]),
//!     ))
//!     .compile("main")?;
//!
//! let config = ExecutionConfig::default();
//! let doc = stylesheet.parse_source("<list><item>a</item><item>b</item></list>", BuildOptions::default(), &config)?;
//! let mut out = EventLog::new(Arc::clone(stylesheet.pool()));
//! Executor::new(&stylesheet, &doc, config)?.run(&mut out)?;
//! assert_eq!(out.text(), "<a><b>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod bindery;
pub mod compiler;
pub mod config;
pub mod error;
pub mod executor;
pub mod expression;
pub mod instruction;
pub mod module;
pub mod output;
pub mod stylesheet;

pub use bindery::{Bindery, GlobalState, ParameterSet};
pub use compiler::StylesheetBuilder;
pub use config::ExecutionConfig;
pub use error::{CompileError, ExecutionError};
pub use executor::{CancelHandle, Executor};
pub use expression::{Expr, Expression, Focus, PathExpression, Value, from_fn, literal};
pub use instruction::{Instruction, NumberLevel, Select, WithParam};
pub use module::{GlobalVariable, MatchPattern, Module, Param, Template};
pub use output::{EventLog, OutputEvent, Outputter, TextCollector, TreeOutputter};
pub use stylesheet::{CompiledTemplate, Stylesheet};
