//! Origin mocks and worker construction for integration tests.
#![allow(dead_code)]

use std::time::Duration;

use reqwest::Client;
use showroom::leads::LeadService;
use showroom::leads::mailer::Mailer;
use showroom::leads::sheets::SheetsClient;
use showroom::storage::WorkerDb;
use showroom::storage::config::{DEFAULT_PRECACHE, EmailConfig};
use showroom::worker::{HttpFetcher, OfflineWorker, WorkerConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SHEETS_PATH: &str = "/sheets/append";
pub const EMAIL_PATH: &str = "/emails";
pub const TEST_API_KEY: &str = "re_test_key";
pub const TEST_RECIPIENT: &str = "sales@showroom.test";

/// HTML body served for a page path.
pub fn page_body(page: &str) -> String {
    format!("<html><body>page {page}</body></html>")
}

/// Serve every default precache path from the origin.
pub async fn mount_site(server: &MockServer) {
    for page in DEFAULT_PRECACHE {
        Mock::given(method("GET"))
            .and(path(*page))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(page_body(page)),
            )
            .mount(server)
            .await;
    }
}

/// Network timeout of test fetchers.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(500);

/// Fetcher with a short timeout so offline paths stay fast.
pub fn fetcher() -> HttpFetcher {
    HttpFetcher::with_timeout(FETCH_TIMEOUT).expect("http client")
}

/// Make the origin unreachable: every request outlives the fetch timeout.
pub async fn go_offline(server: &MockServer) {
    server.reset().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_delay(FETCH_TIMEOUT * 4))
        .mount(server)
        .await;
}

pub fn worker_config(origin: &str) -> WorkerConfig {
    WorkerConfig::new(origin).expect("valid origin")
}

/// Worker over an in-memory database.
pub fn worker(origin: &str) -> OfflineWorker<HttpFetcher> {
    worker_with_db(worker_config(origin), WorkerDb::open_in_memory().expect("in-memory db"))
}

pub fn worker_with_db(config: WorkerConfig, db: WorkerDb) -> OfflineWorker<HttpFetcher> {
    OfflineWorker::new(config, db, fetcher())
}

/// Installed and activated worker for a mounted site.
pub async fn started_worker(server: &MockServer) -> OfflineWorker<HttpFetcher> {
    mount_site(server).await;
    let worker = worker(&server.uri());
    worker.start().await.expect("install and activate");
    worker
}

/// An origin that refuses connections: a port bound and then released.
pub fn dead_origin() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Lead service pointed at mocked spreadsheet and email endpoints.
pub fn lead_service(collaborators: &MockServer) -> LeadService {
    let client = Client::new();
    let sheets = SheetsClient::new(
        client.clone(),
        Some(format!("{}{SHEETS_PATH}", collaborators.uri())),
    );
    let mailer = Mailer::new(
        client,
        EmailConfig {
            api_url: format!("{}{EMAIL_PATH}", collaborators.uri()),
            api_key: Some(TEST_API_KEY.to_string()),
            to: Some(TEST_RECIPIENT.to_string()),
            ..EmailConfig::default()
        },
    );
    LeadService::new(sheets, mailer)
}

pub async fn mount_sheets(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(SHEETS_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("{\"ok\":true}"))
        .mount(server)
        .await;
}

pub async fn mount_email(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path(EMAIL_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("{\"id\":\"email_1\"}"))
        .mount(server)
        .await;
}

/// Bodies the mock received on `route`, as text.
pub async fn bodies_sent_to(server: &MockServer, route: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect()
}
