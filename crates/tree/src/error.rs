use std::fmt;
use stylus_names::NamePoolError;
use thiserror::Error;

/// Where in the input a build failure happened. Unknown parts are `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: i64,
    pub column: i64,
    pub system_id: Option<String>,
}

impl Location {
    pub fn unknown() -> Self {
        Location {
            line: -1,
            column: -1,
            system_id: None,
        }
    }

    pub fn new(line: usize, column: usize, system_id: Option<String>) -> Self {
        Location {
            line: line as i64,
            column: column as i64,
            system_id,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system_id {
            Some(id) => write!(f, "{}: line {}, column {}", id, self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

impl From<(usize, usize)> for Location {
    fn from((line, column): (usize, usize)) -> Self {
        Location::new(line, column, None)
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("document event received before start of document")]
    NotStarted,

    #[error("the event stream ended without a start of document")]
    NeverStarted,

    #[error("event received after end of document")]
    AlreadyFinished,

    #[error("the event stream ended with {0} unclosed element(s)")]
    Unclosed(usize),

    #[error("end of element without a matching start")]
    UnbalancedEnd,

    #[error("malformed input at {location}: {message}")]
    Malformed { message: String, location: Location },

    #[error("name pool error: {0}")]
    Names(#[from] NamePoolError),

    #[error("XML reader error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    #[error("document is too large: more than {0} nodes")]
    TooLarge(usize),
}

impl BuildError {
    pub fn malformed(message: impl Into<String>, location: Location) -> Self {
        BuildError::Malformed {
            message: message.into(),
            location,
        }
    }

    /// The input location of the failure, or an unknown location.
    pub fn location(&self) -> Location {
        match self {
            BuildError::Malformed { location, .. } => location.clone(),
            _ => Location::unknown(),
        }
    }
}
