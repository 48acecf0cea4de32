use std::path::PathBuf;

use reqwest::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the session, cookie and client layers.
///
/// A rejected login is not an error: [`crate::AtCoder::login`] returns
/// `Ok(false)` for that case.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DNS, connection or timeout failure. Never retried.
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a status the caller does not accept.
    #[error("{url} responded with {status}")]
    HttpStatus { url: String, status: StatusCode },

    /// A contest or task id that does not exist.
    #[error("{0} not found")]
    NotFound(String),

    #[error("a session transaction is already running")]
    NestedTransaction,

    /// The login form did not carry the anti-forgery token. Usually a
    /// maintenance page or a changed site layout.
    #[error("csrf_token was not found on the login page")]
    MissingCsrfToken,

    #[error("invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },

    #[error("failed to access config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config data: {0}")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("could not determine the configuration directory")]
    NoConfigDir,

    #[error("credential prompt failed: {0}")]
    Prompt(String),
}

impl Error {
    pub(crate) fn config(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Config {
            path: path.into(),
            source,
        }
    }
}
