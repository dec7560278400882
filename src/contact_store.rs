use sqlx::{Pool, Postgres};

use crate::domain::NewContact;

#[derive(Debug, thiserror::Error)]
#[error("Failed to insert the contact into the database")]
pub struct StorageError(#[source] pub sqlx::Error);

/// Write-only access to the contact table.
///
/// `insert_if_absent` is keyed on the email: when a row already exists for it
/// the call succeeds without touching that row.
#[async_trait::async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_if_absent(&self, contact: &NewContact) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct PostgresContactStore {
    pool: Pool<Postgres>,
}

impl PostgresContactStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContactStore for PostgresContactStore {
    #[tracing::instrument(name = "Saving contact details in the database", skip(self, contact))]
    async fn insert_if_absent(&self, contact: &NewContact) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
                INSERT INTO contacts (name, email)
                VALUES ($1, $2)
                ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(contact.name.as_ref())
        .bind(contact.email.as_ref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            tracing::error!("Failed to execute query: {:?}", error);
            StorageError(error)
        })?;

        if result.rows_affected() == 0 {
            tracing::info!("Contact already stored, nothing to insert");
        }

        Ok(())
    }
}
