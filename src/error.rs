use thiserror::Error;

/// Errors that can occur while talking to the measurement store
/// or while preparing to do so.
#[derive(Error, Debug)]
pub enum Error {
    /// The store rejected the credential (HTTP 401)
    #[error("Authentication token has expired")]
    CredentialExpired,

    /// The store answered with a non-success status
    #[error("Store operation failed: {operation} - status {status}: {body}")]
    StoreOperationFailed {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Timeout, refused connection, DNS failure...
    #[error("Network failure during {operation}: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The store answered with a success status but a body we cannot use
    #[error("Invalid response to {operation}: {details}")]
    InvalidResponse {
        operation: &'static str,
        details: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
