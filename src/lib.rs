pub mod configuration;
pub mod contact_store;
pub mod domain;
pub mod mailing_list_client;
pub mod routes;
pub mod startup;
pub mod telemetry;
