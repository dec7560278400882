use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use once_cell::sync::Lazy;
use reqwest::{Client, Method, Response};
use secrecy::Secret;
use tokio::net::TcpListener;
use wiremock::MockServer;

use contact_intake::configuration::MailingListSettings;
use contact_intake::contact_store::{ContactStore, StorageError};
use contact_intake::domain::NewContact;
use contact_intake::mailing_list_client::MailingListClient;
use contact_intake::{startup, telemetry};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            telemetry::get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        telemetry::initialize_subscriber(subscriber);
    } else {
        let subscriber =
            telemetry::get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        telemetry::initialize_subscriber(subscriber);
    };
});

pub const LIST_ID: &str = "list-1";
pub const API_KEY: &str = "test-key";

#[derive(Clone, Copy, PartialEq)]
pub enum StoreBehaviour {
    Healthy,
    Failing,
    Panicking,
}

/// In-memory contact table with a unique email column.
pub struct FakeContactStore {
    behaviour: StoreBehaviour,
    rows: Mutex<Vec<(String, String)>>,
    writes: AtomicUsize,
}

impl FakeContactStore {
    pub fn new(behaviour: StoreBehaviour) -> Self {
        Self {
            behaviour,
            rows: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn rows(&self) -> Vec<(String, String)> {
        self.rows.lock().unwrap().clone()
    }

    /// Number of insert attempts, successful or not.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ContactStore for FakeContactStore {
    async fn insert_if_absent(&self, contact: &NewContact) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        match self.behaviour {
            StoreBehaviour::Failing => return Err(StorageError(sqlx::Error::PoolTimedOut)),
            StoreBehaviour::Panicking => panic!("contact store blew up"),
            StoreBehaviour::Healthy => {}
        }

        let mut rows = self.rows.lock().unwrap();
        if !rows.iter().any(|(_, email)| email == contact.email.as_ref()) {
            rows.push((
                contact.name.as_ref().to_string(),
                contact.email.as_ref().to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
pub enum MailingList {
    /// Points the client at `App::mailing_list_server`.
    Mocked,
    /// Credentials left out of the configuration.
    Unconfigured,
    /// Points the client at a port nobody listens on.
    Unreachable,
}

pub struct App {
    pub address: SocketAddr,
    pub client: Client,
    pub contact_store: Arc<FakeContactStore>,
    pub mailing_list_server: MockServer,
}

impl App {
    pub async fn new() -> Self {
        App::spawn(StoreBehaviour::Healthy, MailingList::Mocked).await
    }

    pub async fn spawn(store: StoreBehaviour, mailing_list: MailingList) -> Self {
        App::spawn_with(store, mailing_list, |router| router).await
    }

    /// `wrap` may add layers in front of the application router.
    pub async fn spawn_with<F>(store: StoreBehaviour, mailing_list: MailingList, wrap: F) -> Self
    where
        F: FnOnce(Router) -> Router,
    {
        Lazy::force(&TRACING);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to start an test application");
        let address = listener.local_addr().unwrap();

        let mailing_list_server = MockServer::start().await;
        let settings = match mailing_list {
            MailingList::Mocked => mailing_list_settings(mailing_list_server.uri()),
            MailingList::Unreachable => mailing_list_settings("http://127.0.0.1:1".to_string()),
            MailingList::Unconfigured => MailingListSettings::default(),
        };

        let contact_store = Arc::new(FakeContactStore::new(store));
        let app_state = startup::AppState {
            contact_store: contact_store.clone(),
            mailing_list: settings.credentials().map(MailingListClient::new),
        };
        let router = wrap(startup::router(app_state));

        tokio::spawn(async move { axum::serve(listener, router).await });

        App {
            address,
            client: Client::new(),
            contact_store,
            mailing_list_server,
        }
    }
}

fn mailing_list_settings(base_url: String) -> MailingListSettings {
    MailingListSettings {
        api_key: Some(Secret::new(API_KEY.to_string())),
        server_prefix: Some("us1".to_string()),
        list_id: Some(LIST_ID.to_string()),
        base_url: Some(base_url),
    }
}

impl App {
    pub fn build_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("http://{}{}", self.address, path);
        self.client.request(method, url)
    }

    pub async fn get_health_check(&self) -> Response {
        self.build_request(Method::GET, "/health_check")
            .send()
            .await
            .unwrap()
    }

    pub async fn post_contact(&self, body: &serde_json::Value) -> Response {
        self.build_request(Method::POST, "/contact")
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_contact_raw(&self, body: &'static str) -> Response {
        self.build_request(Method::POST, "/contact")
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn mirror_requests(&self) -> Vec<wiremock::Request> {
        self.mailing_list_server
            .received_requests()
            .await
            .unwrap_or_default()
    }
}

pub async fn message_of(response: Response) -> String {
    let body: serde_json::Value = response.json().await.expect("Response is not JSON");
    body["message"]
        .as_str()
        .expect("Response has no message")
        .to_string()
}
