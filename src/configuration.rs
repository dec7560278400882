use config::{Config, Environment, File, FileFormat};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

const MAILCHIMP_API_HOST: &str = "api.mailchimp.com";

#[derive(Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub mailing_list: MailingListSettings,
}

#[derive(Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

#[derive(Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
    /// Full connection string, e.g. `POSTGRES_URL` on the hosting platform.
    /// Takes precedence over the individual fields when present.
    #[serde(default)]
    pub url: Option<Secret<String>>,
}

impl DatabaseSettings {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match &self.url {
            Some(url) if !url.expose_secret().trim().is_empty() => {
                url.expose_secret().parse::<PgConnectOptions>()
            }
            _ => Ok(self.connect_options_without_database().database(&self.database_name)),
        }
    }

    pub fn connect_options_without_database(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(self.password.expose_secret())
            .ssl_mode(ssl_mode)
    }
}

/// Mailing-list mirror settings. Every field is optional: the mirror runs only
/// when the API key, server prefix and list id are all set.
#[derive(Deserialize, Default)]
pub struct MailingListSettings {
    #[serde(default)]
    pub api_key: Option<Secret<String>>,
    #[serde(default)]
    pub server_prefix: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    /// Overrides `https://{server_prefix}.api.mailchimp.com`.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Clone)]
pub struct MailingListCredentials {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub list_id: String,
}

impl MailingListSettings {
    pub fn credentials(&self) -> Option<MailingListCredentials> {
        let api_key = self
            .api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())?;
        let server_prefix = non_blank(self.server_prefix.as_deref())?;
        let list_id = non_blank(self.list_id.as_deref())?;

        let base_url = match non_blank(self.base_url.as_deref()) {
            Some(base_url) => base_url.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}", server_prefix, MAILCHIMP_API_HOST),
        };

        Some(MailingListCredentials {
            api_key: api_key.clone(),
            base_url,
            list_id: list_id.to_string(),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = Config::builder()
        .add_source(File::new("configuration.yaml", FileFormat::Yaml))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        // Variable names provisioned by the hosting platform
        .set_override_option("database.url", std::env::var("POSTGRES_URL").ok())?
        .set_override_option("mailing_list.api_key", std::env::var("MAILCHIMP_API_KEY").ok())?
        .set_override_option(
            "mailing_list.server_prefix",
            std::env::var("MAILCHIMP_SERVER_PREFIX").ok(),
        )?
        .set_override_option("mailing_list.list_id", std::env::var("MAILCHIMP_LIST_ID").ok())?
        .build()?;

    settings.try_deserialize::<Settings>()
}
