use crate::services::ingestion::{DEFAULT_MAX_UPLOAD_BYTES, SessionOptions};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf};

/// Where uploads are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Files under `storage_dir`.
    Disk,
    /// In-process map; contents are lost on exit.
    Memory,
}

impl BackendKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disk" => Ok(Self::Disk),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown storage backend `{}` (expected disk or memory)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub backend: BackendKind,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Streaming file upload service")]
pub struct Args {
    /// Host to bind to (overrides UPLOADER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOADER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploads are stored (overrides UPLOADER_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Storage backend (overrides UPLOADER_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Largest accepted upload in bytes (overrides UPLOADER_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |name| env::var(name))
    }

    /// Merge parsed arguments over values looked up with `lookup`.
    /// Arguments win; missing variables fall back to defaults.
    pub fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let read = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        // --- Environment fallback ---
        let env_host = read("UPLOADER_HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match read("UPLOADER_PORT")? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOADER_PORT value `{}`", value))?,
            None => 50080,
        };
        let env_storage = read("UPLOADER_STORAGE_DIR")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./received_files"));
        let env_backend = match read("UPLOADER_BACKEND")? {
            Some(value) => BackendKind::parse(&value)?,
            None => BackendKind::Disk,
        };
        let env_max = match read("UPLOADER_MAX_UPLOAD_BYTES")? {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing UPLOADER_MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            backend: args.backend.unwrap_or(env_backend),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
        };

        if cfg.max_upload_bytes == 0 {
            bail!("max upload size must be greater than zero");
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::new(self.max_upload_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_args_or_env() {
        let cfg = AppConfig::merge(Args::default(), lookup_from(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:50080");
        assert_eq!(cfg.storage_dir, PathBuf::from("./received_files"));
        assert_eq!(cfg.backend, BackendKind::Disk);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = AppConfig::merge(
            Args::default(),
            lookup_from(&[
                ("UPLOADER_PORT", "9000"),
                ("UPLOADER_BACKEND", "Memory"),
                ("UPLOADER_MAX_UPLOAD_BYTES", "1024"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.backend, BackendKind::Memory);
        assert_eq!(cfg.max_upload_bytes, 1024);
    }

    #[test]
    fn arguments_override_environment() {
        let args = Args {
            port: Some(7000),
            storage_dir: Some(PathBuf::from("/srv/uploads")),
            ..Args::default()
        };
        let cfg = AppConfig::merge(
            args,
            lookup_from(&[("UPLOADER_PORT", "9000"), ("UPLOADER_STORAGE_DIR", "/tmp/x")]),
        )
        .unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.storage_dir, PathBuf::from("/srv/uploads"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = AppConfig::merge(Args::default(), lookup_from(&[("UPLOADER_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("UPLOADER_PORT"));

        assert!(
            AppConfig::merge(Args::default(), lookup_from(&[("UPLOADER_BACKEND", "s3")])).is_err()
        );
        assert!(
            AppConfig::merge(
                Args::default(),
                lookup_from(&[("UPLOADER_MAX_UPLOAD_BYTES", "0")])
            )
            .is_err()
        );
    }
}
