//! AWS-oriented adapters and handlers for the Pawto Album API.
//!
//! This crate owns runtime integration details (the API Gateway router, the
//! lifecycle handlers, DynamoDB/S3/SES adapters and the payment-gateway and
//! GPU-job HTTP clients). Domain rules live in `pawto_core`.

pub mod adapters;
pub mod config;
pub mod error;
pub mod handlers;
