use nudge_channels::TransmitError;

pub type Result<T> = std::result::Result<T, DeliveryError>;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The server refused the request in a way retrying cannot fix.
    #[error("{operation} failed permanently: {source}")]
    Terminal {
        operation: &'static str,
        #[source]
        source: TransmitError,
    },

    /// Every attempt in the retry budget failed transiently.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExceeded {
        operation: &'static str,
        attempts: u32,
        last: TransmitError,
    },
}

impl DeliveryError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }
}
