//! The upload client against a live router on a loopback port.

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use uploader::{
    client::{UploadClient, UploadOptions},
    routes::routes::routes,
    services::{chunk_sink::SinkFactory, ingestion::SessionOptions, memory_sink::MemoryStore},
    state::AppState,
};

async fn serve(store: MemoryStore, options: SessionOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes().with_state(AppState::new(Arc::new(store), options));
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn uploads_file_in_small_chunks() {
    let store = MemoryStore::new();
    let url = serve(store.clone(), SessionOptions::default()).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let contents: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &contents).unwrap();

    let client = UploadClient::new(&url).unwrap();
    let receipt = client
        .upload_file(&path, &UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(receipt.response.size, 1000);
    assert!(receipt.response.file_name.starts_with("127.0.0.1_"));
    assert!(receipt.response.file_name.ends_with("_notes.txt"));
    assert!(receipt.modified_key.is_none());
    assert_eq!(store.load(&receipt.response.file_name).await.unwrap(), contents);
}

#[tokio::test]
async fn json_file_gets_transformed_copy() {
    let store = MemoryStore::new();
    let url = serve(store.clone(), SessionOptions::default()).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small_test.json");
    std::fs::write(&path, br#"{"id":7,"count":4,"tags":["a","b"],"name":"widget"}"#).unwrap();

    let client = UploadClient::new(&url).unwrap();
    let options = UploadOptions {
        chunk_size: 5,
        ..UploadOptions::default()
    };
    let receipt = client.upload_file(&path, &options).await.unwrap();

    let modified = receipt.modified_key.unwrap();
    assert_eq!(modified, format!("modified_{}", receipt.response.file_name));
    assert_eq!(
        store.load(&modified).await.unwrap(),
        br#"{"count":4000,"tags":["a","b"],"name":"widget"}"#.as_slice()
    );
}

#[tokio::test]
async fn server_rejection_is_reported() {
    let store = MemoryStore::new();
    let url = serve(store.clone(), SessionOptions::new(16)).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.bin");
    std::fs::write(&path, vec![0u8; 64]).unwrap();

    let err = UploadClient::new(&url)
        .unwrap()
        .upload_file(&path, &UploadOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("400"));
}

#[tokio::test]
async fn missing_file_fails_before_sending() {
    let client = UploadClient::new("http://127.0.0.1:9").unwrap();
    let err = client
        .upload_file(std::path::Path::new("/nonexistent/file.bin"), &UploadOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to open"));
}
