//! # stylus-rules
//!
//! Template rules and the choice between them. A [`RuleManager`] holds the
//! rules of every mode; for a node it returns the matching rule with the
//! highest import precedence and then the highest priority, reporting a tie
//! between different declarations as an ambiguity.
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use stylus_names::NamePool;
//! use stylus_rules::{AmbiguityPolicy, ModeName, Pattern, RuleManager};
//! use stylus_tree::{BuildOptions, parse_document};
//!
//! let doc = parse_document("<a><b/></a>", NamePool::new_shared(), BuildOptions::default())?;
//! let mut rules = RuleManager::new(Arc::clone(doc.pool()));
//! let resolver: HashMap<String, String> = HashMap::new();
//! rules.add_rule(&Pattern::parse("*", doc.pool(), &resolver)?, "any", ModeName::Default, 0, None, None)?;
//! rules.add_rule(&Pattern::parse("a/b", doc.pool(), &resolver)?, "b", ModeName::Default, 0, None, None)?;
//!
//! let b = doc.document_element().unwrap().children().next().unwrap();
//! let rule = rules.find_rule(&b, &ModeName::Default, AmbiguityPolicy::Fail)?.unwrap();
//! assert_eq!(*rule.action(), "b");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod error;
pub mod mode;
pub mod pattern;
pub mod space;

pub use error::{PatternError, RuleDescription, RuleError};
pub use mode::{AmbiguityPolicy, Mode, ModeName, Rule, RuleManager};
pub use pattern::{Alternative, Anchor, PathPattern, Pattern, PredicateFn};
pub use space::SpaceRules;
