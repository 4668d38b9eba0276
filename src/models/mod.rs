//! Wire messages and identifiers shared by the ingestion core and the HTTP layer.
//!
//! Both messages serialize naturally as JSON via `serde`.

pub mod upload;
