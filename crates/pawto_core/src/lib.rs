//! Shared Pawto Album domain primitives.
//!
//! This crate owns the collection record and its lifecycle rules, the HTTP
//! request/response contracts, the object-storage key layout and the
//! generation-job descriptor. It intentionally excludes AWS SDK and Lambda
//! runtime concerns; those live in `pawto_lambda`.

pub mod collection;
pub mod contract;
pub mod job;
pub mod notification;
pub mod storage_keys;
