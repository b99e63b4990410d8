//! Domain-level error taxonomy.

/// Text that does not follow the identifier grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed identifier '{input}': {reason}")]
pub struct MalformedIdentifier {
    pub input: String,
    pub reason: String,
}

impl MalformedIdentifier {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced while interpreting declared metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    #[error("invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_identifier_display() {
        let err = MalformedIdentifier::new("TE_1", "too short");
        let msg = err.to_string();
        assert!(msg.contains("TE_1"));
        assert!(msg.contains("too short"));
    }

    #[test]
    fn test_constraint_error_display() {
        let err = MetadataError::InvalidConstraint {
            constraint: ">=3, <2".to_string(),
            reason: "empty range".to_string(),
        };
        assert!(err.to_string().contains("empty range"));
    }
}
