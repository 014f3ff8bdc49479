//! Lead Forwarder Library
//!
//! Receives lead-capture form submissions from a website builder and relays
//! them to RD Station CRM as a contact and, optionally, a deal.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `crm_client`: RD Station CRM API client.
//! - `crm_payloads`: Contact and deal request bodies.
//! - `errors`: Error handling types.
//! - `forwarder`: Contact-then-deal orchestration.
//! - `handlers`: HTTP request handlers.
//! - `models`: Lead and response models.
//! - `normalizer`: Inbound payload normalization.
//! - `routes`: Router, middleware and OpenAPI document.

pub mod config;
pub mod crm_client;
pub mod crm_payloads;
pub mod errors;
pub mod forwarder;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod routes;
