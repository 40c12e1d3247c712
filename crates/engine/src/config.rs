//! Run configuration.
use serde::{Deserialize, Serialize};
use stylus_rules::AmbiguityPolicy;

/// Settings for one transformation run.
///
/// ```
/// use stylus_engine::ExecutionConfig;
/// use stylus_rules::AmbiguityPolicy;
///
/// let config = ExecutionConfig::from_json(r#"{ "ambiguity": "recover-with-warnings", "max_depth": 64 }"#)?;
/// assert_eq!(config.ambiguity, AmbiguityPolicy::RecoverWithWarnings);
/// assert_eq!(config.max_depth, 64);
/// assert!(config.strip_whitespace);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// What to do when two rules tie for a node.
    pub ambiguity: AmbiguityPolicy,
    /// The deepest nesting of template invocations allowed before the run
    /// fails with a recursion-limit error. Tail calls do not nest.
    pub max_depth: usize,
    /// Apply the stylesheet's strip-space declarations when building the
    /// source tree.
    pub strip_whitespace: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            ambiguity: AmbiguityPolicy::Fail,
            max_depth: 256,
            strip_whitespace: true,
        }
    }
}

impl ExecutionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ExecutionConfig::from_json("{}").unwrap();
        assert_eq!(config, ExecutionConfig::default());
        assert_eq!(config.ambiguity, AmbiguityPolicy::Fail);
    }

    #[test]
    fn json_round_trip() {
        let config = ExecutionConfig {
            ambiguity: AmbiguityPolicy::RecoverSilently,
            max_depth: 10,
            strip_whitespace: false,
        };
        let json = config.to_json().unwrap();
        assert!(json.contains("recover-silently"));
        assert_eq!(ExecutionConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_unknown_policies() {
        assert!(ExecutionConfig::from_json(r#"{ "ambiguity": "guess" }"#).is_err());
    }
}
