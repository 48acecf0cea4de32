//! Authenticated HTTP session with transactional cookie updates.
//!
//! A [`Session`] owns one cookie slot. Outside a transaction the slot is
//! the persistent [`CookieStore`]. While [`Session::transaction`] runs, every
//! request and every [`Session::commit`] works on a private clone instead:
//! the clone is adopted (and written to disk once, if anything was staged)
//! when the callback succeeds, and thrown away when it fails.
//!
//! Responses never persist anything on their own. A response carries the
//! cookie update it would cause, and the caller decides whether to stage it
//! with [`Session::commit`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::StatusCode;

use crate::cookie::{set_cookies_to_entries, CookieStore};
use crate::error::{Error, Result};
use crate::transport::{Request, Response, Transport};

/// Per-request settings.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Sent instead of the session's cookies. `Some("")` sends an empty
    /// `Cookie` header.
    pub cookie: Option<String>,
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            cookie: None,
            follow_redirects: true,
        }
    }
}

impl RequestOptions {
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// A response plus the cookie update it would cause.
#[derive(Debug, Clone)]
pub struct SessionResponse {
    pub status: StatusCode,
    pub data: String,
    pub headers: HeaderMap,
    /// `name=value` pairs from the `Set-Cookie` headers, or `None` when the
    /// response sets no cookies.
    pub pending_cookies: Option<Vec<String>>,
}

impl SessionResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

impl From<Response> for SessionResponse {
    fn from(response: Response) -> Self {
        let set_cookies = response.set_cookies();
        let pending_cookies =
            (!set_cookies.is_empty()).then(|| set_cookies_to_entries(set_cookies));
        Self {
            status: response.status,
            data: response.data,
            headers: response.headers,
            pending_cookies,
        }
    }
}

struct State {
    cookies: CookieStore,
    transaction: Option<Transaction>,
}

impl State {
    fn active(&self) -> &CookieStore {
        match &self.transaction {
            Some(tx) => &tx.cookies,
            None => &self.cookies,
        }
    }
}

struct Transaction {
    cookies: CookieStore,
    updated: bool,
}

pub struct Session {
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, cookies: CookieStore) -> Self {
        Self {
            transport,
            state: Mutex::new(State {
                cookies,
                transaction: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Entries of the store requests currently see: the transaction's clone
    /// inside a transaction, the persistent store otherwise.
    pub fn cookies(&self) -> Vec<String> {
        self.lock().active().get().to_vec()
    }

    #[cfg(test)]
    pub(crate) fn in_transaction(&self) -> bool {
        self.lock().transaction.is_some()
    }

    pub async fn get(&self, url: &str, options: &RequestOptions) -> Result<SessionResponse> {
        let request = Request::get(url, self.cookie_header(options));
        self.send(request, options).await
    }

    pub async fn post(
        &self,
        url: &str,
        form: Vec<(String, String)>,
        options: &RequestOptions,
    ) -> Result<SessionResponse> {
        let request = Request::post(url, form, self.cookie_header(options));
        self.send(request, options).await
    }

    fn cookie_header(&self, options: &RequestOptions) -> String {
        match &options.cookie {
            Some(cookie) => cookie.clone(),
            None => self.lock().active().header_value(),
        }
    }

    async fn send(&self, request: Request, options: &RequestOptions) -> Result<SessionResponse> {
        let request = request.follow_redirects(options.follow_redirects);
        let response = self.transport.send(request).await?;
        Ok(response.into())
    }

    /// Stages the cookie update carried by `response`.
    ///
    /// Inside a transaction the update lands in the transaction's clone and
    /// reaches the disk when the transaction completes. Outside one it is
    /// persisted right away. A response without cookies changes nothing.
    pub fn commit(&self, response: &SessionResponse) -> Result<()> {
        match &response.pending_cookies {
            Some(cookies) => self.replace_cookies(cookies.clone()),
            None => Ok(()),
        }
    }

    /// Drops every cookie and persists the empty state. Inside a transaction
    /// the write is deferred to the transaction's completion.
    pub fn remove_session(&self) -> Result<()> {
        self.replace_cookies(Vec::new())
    }

    fn replace_cookies(&self, cookies: Vec<String>) -> Result<()> {
        let mut state = self.lock();
        if let Some(tx) = state.transaction.as_mut() {
            tx.cookies.set(cookies);
            tx.updated = true;
            log::debug!("staged {} cookie(s) in transaction", tx.cookies.get().len());
            return Ok(());
        }
        let mut next = state.cookies.clone();
        next.set(cookies);
        next.save_config_file()?;
        state.cookies = next;
        Ok(())
    }

    /// Runs `callback` with cookie changes isolated from the persistent
    /// store.
    ///
    /// On success the staged cookies become the session's cookies and are
    /// saved once if anything was staged. On error, or if the returned
    /// future is dropped early, they are discarded. Starting a transaction
    /// while one is running fails with [`Error::NestedTransaction`] without
    /// calling `callback`.
    pub async fn transaction<F, Fut, R, E>(&self, callback: F) -> Result<R, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: From<Error>,
    {
        let guard = self.begin()?;
        let value = callback().await?;
        guard.commit()?;
        Ok(value)
    }

    fn begin(&self) -> Result<TransactionGuard<'_>> {
        let mut state = self.lock();
        if state.transaction.is_some() {
            return Err(Error::NestedTransaction);
        }
        state.transaction = Some(Transaction {
            cookies: state.cookies.clone(),
            updated: false,
        });
        log::debug!("transaction started");
        Ok(TransactionGuard {
            session: self,
            done: false,
        })
    }
}

struct TransactionGuard<'a> {
    session: &'a Session,
    done: bool,
}

impl TransactionGuard<'_> {
    fn commit(mut self) -> Result<()> {
        self.done = true;
        let mut state = self.session.lock();
        let Some(tx) = state.transaction.take() else {
            return Ok(());
        };
        if tx.updated {
            tx.cookies.save_config_file()?;
        }
        state.cookies = tx.cookies;
        log::debug!("transaction committed (saved: {})", tx.updated);
        Ok(())
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.session.lock().transaction = None;
            log::debug!("transaction rolled back");
        }
    }
}
