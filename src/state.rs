//! Shared state handed to every handler.

use crate::services::{chunk_sink::SinkFactory, ingestion::SessionOptions};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Backend every upload session draws its own sink from.
    pub store: Arc<dyn SinkFactory>,
    pub options: SessionOptions,
}

impl AppState {
    pub fn new(store: Arc<dyn SinkFactory>, options: SessionOptions) -> Self {
        Self { store, options }
    }
}
