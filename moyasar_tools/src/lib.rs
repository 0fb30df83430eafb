//! A thin REST client for the Moyasar payment gateway.
//!
//! Only the parts of the gateway API needed to settle orders are covered: fetching a payment by id, and the payment
//! object that the gateway pushes to webhooks.
mod api;
mod config;
mod error;

mod data_objects;

pub use api::MoyasarApi;
pub use config::MoyasarConfig;
pub use data_objects::{GatewayPayment, PaymentMetadata, PaymentSource, WebhookPayload};
pub use error::MoyasarApiError;
