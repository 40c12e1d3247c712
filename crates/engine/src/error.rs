use stylus_names::NamePoolError;
use stylus_rules::{PatternError, RuleDescription, RuleError};
use stylus_tree::BuildError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("invalid expression '{expression}': {message}")]
    Expression { expression: String, message: String },

    #[error("variable ${0} is not declared")]
    UndeclaredVariable(String),

    #[error("call to unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("template '{name}' is declared more than once at precedence {precedence}")]
    DuplicateTemplate { name: String, precedence: i32 },

    #[error("global variable ${name} is declared more than once at precedence {precedence}")]
    DuplicateGlobal { name: String, precedence: i32 },

    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("module '{0}' imports or includes itself")]
    CircularModule(String),

    #[error("a template needs a match pattern or a name")]
    AnonymousTemplate,

    #[error("name pool error: {0}")]
    Names(#[from] NamePoolError),
}

impl CompileError {
    pub fn expression(expression: &str, message: impl Into<String>) -> Self {
        CompileError::Expression {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("ambiguous rule match for {node} in mode {mode}: {first} and {second}")]
    Ambiguous {
        node: String,
        mode: String,
        first: RuleDescription,
        second: RuleDescription,
    },

    #[error("transformation terminated: {0}")]
    Terminated(String),

    #[error("template nesting exceeded {0} levels")]
    RecursionLimit(usize),

    #[error("global variable ${0} is defined in terms of itself")]
    CircularVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("apply-imports used with no current template rule")]
    NoCurrentRule,

    #[error("no template named '{0}'")]
    UnknownTemplate(String),

    #[error("unknown stylesheet parameter ${0}")]
    UnknownParameter(String),

    #[error("the source document uses a different name pool from the stylesheet")]
    ForeignDocument,

    #[error("rule error: {0}")]
    Rule(RuleError),

    #[error("output error: {0}")]
    Output(#[from] BuildError),

    #[error("name pool error: {0}")]
    Names(#[from] NamePoolError),
}

impl ExecutionError {
    pub fn type_error(message: impl Into<String>) -> Self {
        ExecutionError::Type(message.into())
    }

    /// True for errors that stop a run on request rather than because
    /// something is wrong with the stylesheet or the input.
    pub fn is_termination(&self) -> bool {
        matches!(self, ExecutionError::Terminated(_))
    }
}

impl From<RuleError> for ExecutionError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Ambiguous {
                node,
                mode,
                first,
                second,
            } => ExecutionError::Ambiguous {
                node,
                mode,
                first,
                second,
            },
            other => ExecutionError::Rule(other),
        }
    }
}
