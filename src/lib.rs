//! Login session and contest lookup for AtCoder.
//!
//! [`AtCoder`] drives the site through a [`Session`], which keeps the
//! cookies of the logged-in user in a [`CookieStore`] and only writes them
//! to disk when a whole [`Session::transaction`] succeeds.

pub mod atcoder;
pub mod cli;
pub mod commands;
pub mod config;
pub mod cookie;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod session;
pub mod transport;

pub use atcoder::{AtCoder, Contest, LoginState, Task};
pub use config::{
    ClientConfig, ClientConfigBuilder, ConfigStore, JsonFileConfigStore, MemoryConfigStore,
};
pub use cookie::CookieStore;
pub use error::{Error, Result};
pub use prompt::{CredentialProvider, Credentials, InquirePrompt, StaticCredentials};
pub use session::{RequestOptions, Session, SessionResponse};
pub use transport::{ReqwestTransport, Transport};
