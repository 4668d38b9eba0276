//! Ingestion core: storage backends, key derivation, JSON post-processing
//! and the per-upload session that ties them together.

pub mod chunk_sink;
pub mod disk_sink;
pub mod ingestion;
pub mod json_transform;
pub mod key_generator;
pub mod memory_sink;
