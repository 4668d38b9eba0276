//! HTTP handlers for uploads and stored objects.
//! The request body is streamed frame by frame into an ingestion session;
//! nothing is buffered beyond the frame being written.

use crate::{
    errors::AppError,
    models::upload::UploadRequest,
    services::ingestion::IngestionSession,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{
    convert::Infallible,
    io,
    net::{IpAddr, SocketAddr},
};
use tracing::info;

/// Header carrying the client-side file name.
pub const FILE_NAME_HEADER: &str = "x-file-name";
/// Response header naming the transformed JSON copy, when one was stored.
pub const MODIFIED_KEY_HEADER: &str = "x-modified-key";

/// Caller address from the connection, if the server recorded one.
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(PeerAddr(ip))
    }
}

/// `POST /upload`: stream the body into storage.
///
/// `x-file-name` and `Content-Type` travel in the opening message; the body
/// frames follow as data-only messages.
pub async fn upload_file(
    State(state): State<AppState>,
    PeerAddr(peer): PeerAddr,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let file_name = header_text(&headers, FILE_NAME_HEADER)?;
    let mime_type = header_text(&headers, header::CONTENT_TYPE.as_str())?;

    let mut session = IngestionSession::for_peer(state.store.sink(), peer, state.options)?;
    info!(
        "upload from {} via {} backend",
        peer.map(|ip| ip.to_string()).unwrap_or_default(),
        state.store.backend_name()
    );

    let opening = UploadRequest::first(file_name, mime_type, Bytes::new());
    let frames = body
        .into_data_stream()
        .map(|frame| frame.map(UploadRequest::chunk).map_err(io::Error::other));
    let messages = stream::iter([Ok(opening)]).chain(frames);

    let outcome = session.run(messages).await?;

    let mut response = Json(outcome.response).into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", outcome.etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Some(key) = outcome.modified_key {
        if let Ok(value) = HeaderValue::from_str(key.as_str()) {
            headers.insert(HeaderName::from_static(MODIFIED_KEY_HEADER), value);
        }
    }
    Ok(response)
}

/// `GET /objects/{*key}`: return a stored object as-is.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let data = state.store.load(&key).await?;

    let mut response = Response::new(Body::from(data));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    Ok(response)
}

/// Optional text header; present but not valid text is a client error.
fn header_text(headers: &HeaderMap, name: &str) -> Result<Option<String>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|text| Some(text.to_string()))
            .map_err(|_| {
                AppError::invalid_argument(format!("header `{}` is not valid text", name))
            }),
    }
}
