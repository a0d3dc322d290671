/// Errors raised while assembling an action registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("action '{name}' has an invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("reaction action '{name}' has no trigger keys")]
    EmptyKeySet { name: String },

    #[error("action name '{name}' is registered twice")]
    DuplicateName { name: String },

    #[error("no default message action registered")]
    MissingDefault,
}

pub type Result<T> = std::result::Result<T, Error>;
