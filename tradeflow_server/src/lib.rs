//! # TradeFlow server
//! This crate hosts the HTTP server for the TradeFlow order lifecycle engine. It is responsible for:
//! * Receiving payment events from the gateway, checking their signatures and applying them to orders.
//! * Exposing the order flow, PO workflow and audit trail to authenticated clients and admins.
//! * Running the auto-quote worker in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Authentication
//! Bearer tokens are issued elsewhere and verified here (see [auth](auth/index.html)). Each route declares the roles
//! that may call it, and the [ACL middleware](middleware/index.html) enforces that.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/payments`: Gateway webhooks, and payment syncs requested by users.
//! * `/api/...`: The order, PO, audit and auto-quote routes. See [routes](routes/index.html).
//! * `/files/...`: PO downloads through signed links.

pub mod auth;
pub mod auto_quote_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
