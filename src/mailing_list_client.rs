use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;

use crate::configuration::MailingListCredentials;
use crate::domain::{ContactEmail, ContactName};

/// Client for the mailing-list service's member-creation endpoint.
///
/// Holds one `reqwest::Client` so connections are reused across requests.
#[derive(Clone)]
pub struct MailingListClient {
    http_client: Client,
    base_url: String,
    list_id: String,
    api_key: Secret<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum MirrorOutcome {
    Subscribed,
    /// The service answers 400 for addresses that are already on the list.
    AlreadyMember,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Failed to reach the mailing-list service")]
    Transport(#[from] reqwest::Error),
    #[error("Mailing-list service answered with {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

#[derive(Serialize)]
struct AddMemberRequest<'a> {
    email_address: &'a str,
    status: &'a str,
    merge_fields: MergeFields<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct MergeFields<'a> {
    fname: &'a str,
}

impl MailingListClient {
    pub fn new(credentials: MailingListCredentials) -> Self {
        Self {
            http_client: Client::new(),
            base_url: credentials.base_url,
            list_id: credentials.list_id,
            api_key: credentials.api_key,
        }
    }

    /// Registers the address with a `pending` status, so the subscriber has
    /// to confirm through the service's own double opt-in email.
    #[tracing::instrument(name = "Adding a pending member to the mailing list", skip(self, name))]
    pub async fn add_pending_member(
        &self,
        email: &ContactEmail,
        name: &ContactName,
    ) -> Result<MirrorOutcome, MirrorError> {
        let url = format!("{}/3.0/lists/{}/members", self.base_url, self.list_id);
        let body = AddMemberRequest {
            email_address: email.as_ref(),
            status: "pending",
            merge_fields: MergeFields {
                fname: name.as_ref(),
            },
        };

        let response = self
            .http_client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("apikey {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(MirrorOutcome::Subscribed),
            StatusCode::BAD_REQUEST => Ok(MirrorOutcome::AlreadyMember),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MirrorError::UnexpectedStatus { status, body })
            }
        }
    }
}
