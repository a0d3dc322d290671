use {nudge_channels::TransmitError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Transmit(#[from] TransmitError),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// The access token was rejected; retrying cannot help.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Transmit(TransmitError::Server {
                status, errcode, ..
            }) => {
                *status == 401
                    || matches!(
                        errcode.as_deref(),
                        Some("M_UNKNOWN_TOKEN" | "M_MISSING_TOKEN")
                    )
            },
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
