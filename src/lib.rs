//! Streaming file upload service.
//!
//! Files arrive as a stream of chunks, are committed under a generated key,
//! and uploads declared as JSON get a second, transformed copy.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
