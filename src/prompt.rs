//! Where login credentials come from.

use std::fmt;

use async_trait::async_trait;
use inquire::{Password, Text};

use crate::error::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials when [`crate::AtCoder::login`] is called without any.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> Result<Credentials>;
}

/// Always answers with the same credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.0.clone())
    }
}

/// Asks on the terminal. The password is read without echo; the username
/// prompt is skipped when one was given up front.
#[derive(Debug, Clone, Default)]
pub struct InquirePrompt {
    username: Option<String>,
}

impl InquirePrompt {
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }
}

#[async_trait]
impl CredentialProvider for InquirePrompt {
    async fn credentials(&self) -> Result<Credentials> {
        let username = self.username.clone();
        tokio::task::spawn_blocking(move || ask(username))
            .await
            .map_err(|e| Error::Prompt(e.to_string()))?
    }
}

fn ask(username: Option<String>) -> Result<Credentials> {
    let username = match username {
        Some(username) => username,
        None => Text::new("username:")
            .prompt()
            .map_err(|e| Error::Prompt(e.to_string()))?,
    };
    let password = Password::new("password:")
        .without_confirmation()
        .prompt()
        .map_err(|e| Error::Prompt(e.to_string()))?;
    Ok(Credentials { username, password })
}
