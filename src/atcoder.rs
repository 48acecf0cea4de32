use std::sync::{Arc, Mutex, PoisonError};

use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::ClientConfig;
use crate::cookie::CookieStore;
use crate::error::{Error, Result};
use crate::prompt::{CredentialProvider, Credentials};
use crate::session::{RequestOptions, Session, SessionResponse};
use crate::transport::ReqwestTransport;

/// Contest whose submit page redirects anonymous visitors, used to probe
/// the login state.
const PROBE_CONTEST: &str = "abc001";
const LOGIN_PATH: &str = "/login";
const CSRF_FIELD: &str = "csrf_token";
const TITLE_SUFFIX: &str = " - AtCoder";
const TASK_TABLE: &str = "#main-div .row table > tbody";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub label: String,
    pub title: String,
    pub url: String,
}

/// Cached result of the last login check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoginState {
    #[default]
    Unknown,
    LoggedIn,
    LoggedOut,
}

/// Client for the AtCoder site on top of a [`Session`].
pub struct AtCoder {
    session: Session,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    state: Mutex<LoginState>,
}

impl AtCoder {
    pub fn new(
        session: Session,
        credentials: Arc<dyn CredentialProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            session,
            credentials,
            base_url,
            state: Mutex::new(LoginState::Unknown),
        }
    }

    /// Builds the client over reqwest with the given cookies.
    pub fn from_config(
        config: &ClientConfig,
        cookies: CookieStore,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.user_agent, config.timeout)?;
        let session = Session::new(Arc::new(transport), cookies);
        Ok(Self::new(session, credentials, config.base_url.clone()))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_url(&self) -> String {
        format!("{}login", self.base_url)
    }

    pub fn contest_url(&self, contest: &str) -> String {
        format!("{}contests/{}", self.base_url, contest)
    }

    pub fn task_list_url(&self, contest: &str) -> String {
        format!("{}/tasks", self.contest_url(contest))
    }

    pub fn task_url(&self, contest: &str, task: &str) -> String {
        format!("{}/{}", self.task_list_url(contest), task)
    }

    fn probe_url(&self) -> String {
        format!("{}/submit", self.contest_url(PROBE_CONTEST))
    }

    pub fn login_state(&self) -> LoginState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_login_state(&self, state: LoginState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Whether the saved session is logged in.
    ///
    /// The answer is cached; `force` skips the cache and asks the site again.
    pub async fn check_session(&self, force: bool) -> Result<bool> {
        match self.login_state() {
            LoginState::LoggedIn if !force => return Ok(true),
            LoginState::LoggedOut if !force => return Ok(false),
            _ => {}
        }
        let logged_in = self.probe().await?;
        let state = if logged_in {
            LoginState::LoggedIn
        } else {
            LoginState::LoggedOut
        };
        self.set_login_state(state);
        log::debug!("login state: {state}");
        Ok(logged_in)
    }

    /// Anonymous visitors of the probe page get a `302`; anything else
    /// means the session is logged in.
    async fn probe(&self) -> Result<bool> {
        let options = RequestOptions::default().without_redirects();
        let response = self.session.get(&self.probe_url(), &options).await?;
        Ok(response.status != StatusCode::FOUND)
    }

    /// Logs in and saves the new session if the site accepts the
    /// credentials.
    ///
    /// `None` asks the credential provider. A rejected login returns
    /// `Ok(false)` and leaves the saved session untouched; any error rolls
    /// back every cookie change made during the attempt.
    ///
    /// Only the cookies set by the accepted POST are saved. If that answer
    /// sets none, the login still counts as accepted and the saved session
    /// stays as it was.
    pub async fn login(&self, credentials: Option<Credentials>) -> Result<bool> {
        let login_url = self.login_url();
        let accepted = self
            .session
            .transaction(move || async move {
                let page = self
                    .session
                    .get(&login_url, &RequestOptions::default().with_cookie(""))
                    .await?;
                let csrf_token = parse_csrf_token(&page.data)?;

                let Credentials { username, password } = match credentials {
                    Some(credentials) => credentials,
                    None => self.credentials.credentials().await?,
                };
                let form = vec![
                    ("username".to_string(), username),
                    ("password".to_string(), password),
                    (CSRF_FIELD.to_string(), csrf_token),
                ];
                let options = RequestOptions::default()
                    .with_cookie(pending_cookie_header(&page))
                    .without_redirects();
                let response = self.session.post(&login_url, form, &options).await?;

                let accepted = !self.is_login_page(response.location());
                if accepted {
                    self.session.commit(&response)?;
                }
                Ok::<_, Error>(accepted)
            })
            .await?;
        log::info!("login {}", if accepted { "succeeded" } else { "rejected" });
        Ok(accepted)
    }

    fn is_login_page(&self, location: Option<&str>) -> bool {
        location.is_some_and(|location| location == LOGIN_PATH || location == self.login_url())
    }

    /// Forgets the saved session.
    pub async fn logout(&self) -> Result<()> {
        self.session.remove_session()?;
        self.set_login_state(LoginState::Unknown);
        log::info!("session removed");
        Ok(())
    }

    pub async fn contest(&self, id: &str) -> Result<Contest> {
        let url = self.contest_url(id);
        let response = self.fetch_page(&url, || format!("contest {id}")).await?;
        Ok(Contest {
            id: id.to_string(),
            title: parse_contest_title(&response.data)?,
            url,
        })
    }

    /// Tasks listed on the contest's task page. A page without a task table
    /// yields an empty list.
    pub async fn tasks(&self, contest: &str) -> Result<Vec<Task>> {
        let url = self.task_list_url(contest);
        let response = self.fetch_page(&url, || format!("contest {contest}")).await?;
        parse_tasks(&response.data, &self.base_url)
    }

    pub async fn task(&self, contest: &str, task: &str) -> Result<Task> {
        self.tasks(contest)
            .await?
            .into_iter()
            .find(|t| t.id == task)
            .ok_or_else(|| Error::NotFound(format!("task {task}")))
    }

    async fn fetch_page(
        &self,
        url: &str,
        missing: impl FnOnce() -> String,
    ) -> Result<SessionResponse> {
        let response = self.session.get(url, &RequestOptions::default()).await?;
        let status = response.status;
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(Error::NotFound(missing()))
        } else {
            Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            })
        }
    }
}

fn pending_cookie_header(response: &SessionResponse) -> String {
    response
        .pending_cookies
        .as_deref()
        .map(|cookies| cookies.join("; "))
        .unwrap_or_default()
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn parse_csrf_token(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let input = selector(&format!("input[name=\"{CSRF_FIELD}\"]"))?;
    document
        .select(&input)
        .find_map(|node| node.value().attr("value"))
        .map(str::to_string)
        .ok_or(Error::MissingCsrfToken)
}

fn parse_contest_title(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&selector("title")?)
        .next()
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .unwrap_or_default();
    Ok(match title.strip_suffix(TITLE_SUFFIX) {
        Some(stripped) => stripped.to_string(),
        None => title,
    })
}

fn parse_tasks(html: &str, base_url: &str) -> Result<Vec<Task>> {
    let document = Html::parse_document(html);
    let Some(tbody) = document.select(&selector(TASK_TABLE)?).next() else {
        return Ok(vec![]);
    };
    let row = selector("tr")?;
    let cell = selector("td")?;
    let anchor = selector("a")?;

    let mut tasks = vec![];
    for tr in tbody.select(&row) {
        let links = tr
            .select(&cell)
            .take(2)
            .map(|td| td.select(&anchor).next())
            .collect::<Vec<_>>();
        let (Some(Some(label_link)), Some(Some(title_link))) = (links.first(), links.get(1)) else {
            log::debug!("skipping task row without links");
            continue;
        };
        let Some(href) = label_link.value().attr("href") else {
            continue;
        };
        let id = href.rsplit('/').next().unwrap_or_default().to_string();
        tasks.push(Task {
            id,
            label: element_text(label_link),
            title: element_text(title_link),
            url: format!("{}{}", base_url, href.trim_start_matches('/')),
        });
    }
    Ok(tasks)
}

fn element_text(node: &ElementRef) -> String {
    collapse_whitespace(&node.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
