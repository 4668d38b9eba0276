use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uploader::client::{DEFAULT_CHUNK_SIZE, UploadClient, UploadOptions};

/// Stream a local file to an uploader server.
#[derive(Parser, Debug)]
#[command(author, version, about = "Upload a file to the uploader service")]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Server base URL
    #[arg(long, env = "UPLOADER_URL", default_value = "http://127.0.0.1:50080")]
    server: String,

    /// Bytes per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Content type to declare (defaults to one guessed from the extension)
    #[arg(long)]
    content_type: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let client = UploadClient::new(&args.server)?;
    let options = UploadOptions {
        chunk_size: args.chunk_size,
        content_type: args.content_type,
    };

    let receipt = client.upload_file(&args.file, &options).await?;
    tracing::info!(
        "uploaded file: {} ({} bytes)",
        receipt.response.file_name,
        receipt.response.size
    );
    if let Some(key) = &receipt.modified_key {
        tracing::info!("transformed copy: {}", key);
    }
    println!("{}", serde_json::to_string(&receipt.response)?);
    Ok(())
}
