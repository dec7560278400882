use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Context;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header::ALLOW, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::contact_store::{ContactStore, StorageError};
use crate::domain::{NewContact, ValidationError};
use crate::mailing_list_client::{MailingListClient, MirrorOutcome};

/// A body that an upstream layer already parsed. When present in the request
/// extensions it is used as is and the raw body is left unread.
#[derive(Clone, Debug)]
pub struct PreParsedBody(pub Value);

#[derive(Debug, Default, PartialEq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
struct RawContactForm {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TryFrom<Value> for ContactForm {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => {
                let raw: RawContactForm = serde_json::from_value(value)
                    .context("Contact fields must be strings")?;

                Ok(Self {
                    name: raw.name.unwrap_or_default(),
                    email: raw.email.unwrap_or_default(),
                })
            }
            other => Err(anyhow::anyhow!(
                "Expected a JSON object, got `{}`",
                other
            )),
        }
    }
}

impl TryFrom<ContactForm> for NewContact {
    type Error = ContactError;

    fn try_from(form: ContactForm) -> Result<Self, Self::Error> {
        Ok(NewContact::parse(form.name, form.email)?)
    }
}

/// Parses a raw request body. An empty body stands for an empty object.
pub fn decode_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
}

/// Extracts `{name, email}` from the request body, whatever shape it arrived in.
pub struct ContactPayload(pub ContactForm);

#[async_trait]
impl<S> FromRequest<S> for ContactPayload
where
    S: Send + Sync,
{
    type Rejection = ContactError;

    async fn from_request(mut req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let value = match req.extensions_mut().remove::<PreParsedBody>() {
            Some(PreParsedBody(value)) => value,
            None => {
                let body = Bytes::from_request(req, state)
                    .await
                    .context("Failed to read the request body")
                    .map_err(ContactError::MalformedBody)?;

                decode_body(&body)
                    .context("Request body is not valid JSON")
                    .map_err(ContactError::MalformedBody)?
            }
        };

        let form = ContactForm::try_from(value).map_err(ContactError::MalformedBody)?;

        Ok(Self(form))
    }
}

#[tracing::instrument(
    name = "Accepting a contact submission",
    skip(contact_store, mailing_list, form),
    fields(
        contact_email = %form.email,
        contact_name = %form.name
    ),
)]
pub async fn submit_contact(
    State(contact_store): State<Arc<dyn ContactStore>>,
    State(mailing_list): State<Option<MailingListClient>>,
    ContactPayload(form): ContactPayload,
) -> Result<impl IntoResponse, ContactError> {
    let new_contact: NewContact = form.try_into()?;

    contact_store
        .insert_if_absent(&new_contact)
        .await
        .map_err(ContactError::Storage)?;

    mirror_contact(mailing_list.as_ref(), &new_contact).await;

    Ok(Json(json!({ "ok": true })))
}

/// Best-effort copy of a stored contact into the mailing list.
///
/// Returns nothing on purpose: every outcome ends up in the logs and none of
/// them reaches the caller.
#[tracing::instrument(name = "Mirroring contact to the mailing list", skip_all)]
async fn mirror_contact(mailing_list: Option<&MailingListClient>, contact: &NewContact) {
    let Some(client) = mailing_list else {
        tracing::debug!("Mailing-list credentials are not configured, skipping");
        return;
    };

    match client.add_pending_member(&contact.email, &contact.name).await {
        Ok(MirrorOutcome::Subscribed) => {
            tracing::info!("Contact added to the mailing list as pending")
        }
        Ok(MirrorOutcome::AlreadyMember) => {
            tracing::info!("Contact is already a member of the mailing list")
        }
        Err(error) => {
            tracing::error!(
                error.cause_chain = ?error,
                error.message = %error,
                "Failed to mirror contact to the mailing list",
            )
        }
    }
}

pub async fn method_not_allowed() -> ContactError {
    ContactError::MethodNotAllowed
}

#[derive(thiserror::Error)]
pub enum ContactError {
    #[error("Invalid JSON")]
    MalformedBody(#[source] anyhow::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Database error")]
    Storage(#[source] StorageError),
}

impl Debug for ContactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl IntoResponse for ContactError {
    fn into_response(self) -> Response {
        let status = match &self {
            ContactError::MalformedBody(_) | ContactError::Validation(_) => {
                tracing::warn!("Rejected contact submission: {:?}", self);
                StatusCode::BAD_REQUEST
            }
            ContactError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ContactError::Storage(_) => {
                tracing::error!("{:?}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut response = (status, Json(json!({ "message": self.to_string() }))).into_response();
        if let ContactError::MethodNotAllowed = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
        }

        response
    }
}

fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
