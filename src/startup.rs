use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{FromRef, MatchedPath},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::configuration::{DatabaseSettings, Settings};
use crate::contact_store::{ContactStore, PostgresContactStore};
use crate::mailing_list_client::MailingListClient;
use crate::routes::{check_health, method_not_allowed, submit_contact};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub contact_store: Arc<dyn ContactStore>,
    /// `None` when the mailing-list credentials are incomplete.
    pub mailing_list: Option<MailingListClient>,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    app_state: AppState,
}

impl Application {
    pub async fn build(configuration: &Settings) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind((
            configuration.application.host.as_str(),
            configuration.application.port,
        ))
        .await?;
        let port = listener.local_addr()?.port();
        let app_state = get_app_state(configuration)?;

        Ok(Self {
            port,
            listener,
            app_state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        run(self.listener, self.app_state).await
    }
}

pub fn get_app_state(configuration: &Settings) -> Result<AppState, anyhow::Error> {
    let pool = get_connection_pool(&configuration.database)?;

    let mailing_list = configuration
        .mailing_list
        .credentials()
        .map(MailingListClient::new);
    if mailing_list.is_none() {
        tracing::warn!("Mailing-list credentials are incomplete, contacts will not be mirrored");
    }

    Ok(AppState {
        contact_store: Arc::new(PostgresContactStore::new(pool)),
        mailing_list,
    })
}

/// The pool connects on first use, so the server starts without a database.
pub fn get_connection_pool(settings: &DatabaseSettings) -> Result<Pool<Postgres>, sqlx::Error> {
    Ok(PgPoolOptions::new().connect_lazy_with(settings.connect_options()?))
}

pub async fn run(listener: TcpListener, app_state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(app_state)).await
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/contact", post(submit_contact).fallback(method_not_allowed))
        .with_state(app_state)
        .route("/health_check", get(check_health))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            // Refer to https://github.com/tokio-rs/axum/blob/main/examples/tracing-aka-logging/Cargo.toml
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);
                tracing::info_span!(
                    "Starting HTTP request",
                    method = ?request.method(),
                    path,
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
}

fn handle_panic(error: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = error.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = error.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic.message = detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Internal Server Error" })),
    )
        .into_response()
}
