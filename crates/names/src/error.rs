use crate::code::PoolId;
use thiserror::Error;

/// Errors raised by a [`NamePool`](crate::NamePool).
///
/// The capacity variants are fatal for the run that hit them. `ForeignNameCode`
/// and `UnknownNameCode` indicate a programming error (a code resolved against
/// a pool that never issued it), not bad input data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamePoolError {
    #[error("name pool is full: hash chain at slot {slot} exceeds {max} entries")]
    ChainTooDeep { slot: u32, max: usize },

    #[error("too many prefixes for namespace URI '{uri}' (maximum {max})")]
    TooManyPrefixes { uri: String, max: usize },

    #[error("too many distinct namespace URIs (maximum {0})")]
    TooManyUris(usize),

    #[error("too many distinct prefixes (maximum {0})")]
    TooManyPrefixCodes(usize),

    #[error("name pool has been sealed; cannot allocate '{0}'")]
    Sealed(String),

    #[error("name code {code:#x} was issued by pool {issuer}, not by pool {resolver}")]
    ForeignNameCode {
        code: u32,
        issuer: PoolId,
        resolver: PoolId,
    },

    #[error("unknown name code {0:#x}")]
    UnknownNameCode(u32),

    #[error("unknown namespace code {0:#x}")]
    UnknownNamespaceCode(u32),

    #[error("namespace prefix '{0}' is not declared")]
    UndeclaredPrefix(String),

    #[error("invalid qualified name '{0}'")]
    InvalidQName(String),

    #[error("corrupt name pool snapshot: {0}")]
    CorruptSnapshot(String),
}

impl NamePoolError {
    /// True for errors that reveal a misuse of codes rather than a capacity or input problem.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            NamePoolError::ForeignNameCode { .. }
                | NamePoolError::UnknownNameCode(_)
                | NamePoolError::UnknownNamespaceCode(_)
        )
    }
}
