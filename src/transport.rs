//! Plain HTTP GET/POST with a caller-supplied `Cookie` header.
//!
//! The transport never touches the cookie store and never treats an HTTP
//! status as a failure: a `302` is a meaningful answer when probing the
//! login state, so the caller always gets the status back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use strum::Display;

use crate::error::Result;

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Sent verbatim as the `Cookie` header, even when empty.
    pub cookie: String,
    /// Form fields, sent url-encoded. Only used for POST.
    pub form: Vec<(String, String)>,
    pub follow_redirects: bool,
}

impl Request {
    pub fn get(url: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            cookie: cookie.into(),
            form: Vec::new(),
            follow_redirects: true,
        }
    }

    pub fn post(
        url: impl Into<String>,
        form: Vec<(String, String)>,
        cookie: impl Into<String>,
    ) -> Self {
        Self {
            method: Method::Post,
            form,
            ..Self::get(url, cookie)
        }
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }
}

/// Status, body and headers of an answered request.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub data: String,
    pub headers: HeaderMap,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            data: String::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_body(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    /// Appends a header. Values that are not valid header text are skipped.
    pub fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(_) => log::warn!("dropping invalid {name} header value"),
        }
        self
    }

    /// Raw `Set-Cookie` values, one per cookie.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }
}

/// Sends requests. Implemented over reqwest for real use and by scripted
/// doubles in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// [`Transport`] backed by two reqwest clients, one following redirects and
/// one that hands every `3xx` back to the caller.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    follow: reqwest::Client,
    no_follow: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            follow: build_client(user_agent, timeout, Policy::limited(MAX_REDIRECTS))?,
            no_follow: build_client(user_agent, timeout, Policy::none())?,
        })
    }
}

fn build_client(
    user_agent: &str,
    timeout: Option<Duration>,
    redirect: Policy,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .redirect(redirect);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let client = if request.follow_redirects {
            &self.follow
        } else {
            &self.no_follow
        };
        let builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url).form(&request.form),
        };
        let response = builder
            .header(COOKIE, request.cookie.as_str())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let data = response.text().await?;
        log::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Response {
            status,
            data,
            headers,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    #[tokio::test]
    async fn get_and_post_follow_redirects_by_default() {
        let transport = ScriptedTransport::new();
        transport.on_get("https://atcoder.jp/", Response::new(StatusCode::OK));
        transport.on_post("https://atcoder.jp/login", Response::new(StatusCode::FOUND));

        let got = transport
            .send(Request::get("https://atcoder.jp/", "a=1"))
            .await
            .unwrap();
        let posted = transport
            .send(Request::post(
                "https://atcoder.jp/login",
                vec![("k".into(), "v".into())],
                "",
            ))
            .await
            .unwrap();

        assert_eq!(got.status, StatusCode::OK);
        assert_eq!(posted.status, StatusCode::FOUND);
        let sent = transport.requests();
        assert_eq!(sent[0], Request::get("https://atcoder.jp/", "a=1"));
        assert_eq!(sent[1].method, Method::Post);
        assert!(sent[1].follow_redirects);
    }

    #[test]
    fn response_reads_all_set_cookie_headers() {
        let response = Response::new(StatusCode::FOUND)
            .with_header(SET_COOKIE, "A=1; Path=/")
            .with_header(SET_COOKIE, "B=2; HttpOnly");

        assert_eq!(response.set_cookies(), vec!["A=1; Path=/", "B=2; HttpOnly"]);
    }

    #[test]
    fn response_without_headers() {
        let response = Response::new(StatusCode::OK).with_body("<html></html>");
        assert!(response.set_cookies().is_empty());
        assert_eq!(response.data, "<html></html>");
    }

    #[test]
    fn post_request_keeps_cookie_and_form() {
        let request = Request::post(
            "https://example.com/login",
            vec![("a".into(), "b".into())],
            "",
        )
        .follow_redirects(false);

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.cookie, "");
        assert_eq!(request.form, vec![("a".to_string(), "b".to_string())]);
        assert!(!request.follow_redirects);
        assert_eq!(request.method.to_string(), "POST");
    }
}
