use std::error::Error as StdError;

/// Crate-wide result type for collaborator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors shared across the store, directory and crypto contracts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A record with this external id already exists.
    #[error("duplicate external id: {external_id}")]
    Duplicate { external_id: String },

    /// Operation is currently unavailable (not configured/ready).
    #[error("operation unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from an external dependency.
    #[error("operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// A stored value did not map onto the data model.
    #[error(transparent)]
    Model(#[from] nudge_common::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn duplicate(external_id: impl Into<String>) -> Self {
        Self::Duplicate {
            external_id: external_id.into(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl nudge_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::InvalidInput { message }
    }
}

nudge_common::impl_context!();

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_become_invalid_input_with_context() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err = parsed.context("stored content").unwrap_err();
        match err {
            Error::InvalidInput { message } => assert!(message.starts_with("stored content: ")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn model_errors_pass_through() {
        let err: Error = nudge_common::Error::unrecognised("message kind", "m.bogus").into();
        assert!(matches!(err, Error::Model(_)));
        assert_eq!(err.to_string(), "unrecognised message kind: m.bogus");
    }
}
