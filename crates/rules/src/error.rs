use std::fmt;
use stylus_names::NamePoolError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {message}")]
    Syntax { pattern: String, message: String },

    #[error("axis '{axis}' is not allowed in pattern '{pattern}'")]
    UnsupportedAxis { pattern: String, axis: String },

    #[error("name error in pattern: {0}")]
    Names(#[from] NamePoolError),
}

impl PatternError {
    pub fn syntax(pattern: &str, message: impl Into<String>) -> Self {
        PatternError::Syntax {
            pattern: pattern.to_string(),
            message: message.into(),
        }
    }
}

/// Enough about a rule to identify it in a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDescription {
    pub pattern: String,
    pub precedence: i32,
    pub priority: f64,
    /// The module (or other origin) that declared the rule, when known.
    pub origin: Option<String>,
}

impl fmt::Display for RuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (precedence {}, priority {})",
            self.pattern, self.precedence, self.priority
        )?;
        if let Some(origin) = &self.origin {
            write!(f, " in {}", origin)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("ambiguous rule match for {node} in mode {mode}: {first} and {second}")]
    Ambiguous {
        node: String,
        mode: String,
        first: RuleDescription,
        second: RuleDescription,
    },

    #[error("invalid priority {0}: priorities must be finite numbers")]
    InvalidPriority(f64),
}
