use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub upload_dir: PathBuf,
    /// Base used for photo URLs. When unset it is derived from the request `Host`.
    pub public_base_url: Option<Url>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://viagens.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("temp_data/temp_images"));

        let public_base_url = match env::var("PUBLIC_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_base_url(raw.trim())?),
            _ => None,
        };

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid MAX_UPLOAD_BYTES: {err}")))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            listen_addr,
            upload_dir,
            public_base_url,
            max_upload_bytes,
        })
    }
}

/// Parses a base URL, forcing a trailing slash so relative joins keep its path.
pub fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let mut url =
        Url::parse(raw).map_err(|err| AppError::Config(format!("invalid base url {raw}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!("invalid base url {raw}")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
