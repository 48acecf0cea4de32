use std::sync::Arc;

use atcoder_cli::{
    AtCoder, ClientConfigBuilder, ConfigStore, CookieStore, Credentials, JsonFileConfigStore,
    StaticCredentials,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN_PAGE: &str = r#"<form><input type="hidden" name="csrf_token" value="tok123"></form>"#;

async fn mock_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "REVEL_SESSION=anonymous; Path=/; HttpOnly")
                .set_body_string(LOGIN_PAGE),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("cookie", "REVEL_SESSION=anonymous"))
        .and(body_string_contains("password=hunter2"))
        .and(body_string_contains("csrf_token=tok123"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/")
                .append_header("set-cookie", "REVEL_SESSION=authenticated; Path=/; HttpOnly"),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contests/abc001/submit"))
        .and(header("cookie", "REVEL_SESSION=authenticated"))
        .respond_with(ResponseTemplate::new(200))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/contests/abc001/submit"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
        .mount(&server)
        .await;

    server
}

fn client(server: &MockServer, dir: &TempDir) -> (AtCoder, Arc<JsonFileConfigStore>) {
    let store = Arc::new(JsonFileConfigStore::new(dir.path(), "session"));
    let cookies = CookieStore::load(store.clone()).unwrap();
    let config = ClientConfigBuilder::default()
        .base_url(format!("{}/", server.uri()))
        .build()
        .unwrap();
    let credentials = Arc::new(StaticCredentials(Credentials::new("tourist", "wrong")));
    let atcoder = AtCoder::from_config(&config, cookies, credentials).unwrap();
    (atcoder, store)
}

#[tokio::test]
async fn login_check_and_logout_cycle() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let (atcoder, store) = client(&server, &dir);

    assert!(!atcoder.check_session(false).await.unwrap());

    let accepted = atcoder
        .login(Some(Credentials::new("tourist", "hunter2")))
        .await
        .unwrap();
    assert!(accepted);
    assert_eq!(
        store.get("cookies").unwrap(),
        Some(json!(["REVEL_SESSION=authenticated"]))
    );
    assert!(atcoder.check_session(true).await.unwrap());

    // a fresh process picks the saved session up
    let (restarted, _) = client(&server, &dir);
    assert!(restarted.check_session(false).await.unwrap());

    restarted.logout().await.unwrap();
    assert_eq!(store.get("cookies").unwrap(), Some(json!([])));
    assert!(!restarted.check_session(false).await.unwrap());
}

#[tokio::test]
async fn rejected_login_writes_nothing() {
    let server = mock_site().await;
    let dir = TempDir::new().unwrap();
    let (atcoder, store) = client(&server, &dir);

    let accepted = atcoder.login(None).await.unwrap();

    assert!(!accepted);
    assert!(!store.path().exists());
    assert!(atcoder.session().cookies().is_empty());
    assert!(!atcoder.check_session(false).await.unwrap());
}

#[tokio::test]
async fn missing_contest_is_not_found() {
    let server = mock_site().await;
    Mock::given(method("GET"))
        .and(path("/contests/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (atcoder, _) = client(&server, &dir);

    let err = atcoder.contest("nope").await.unwrap_err();
    assert_eq!(err.to_string(), "contest nope not found");
}
