use url::Url;

use crate::{
    config::{parse_base_url, AppConfig},
    db::DbPool,
    error::AppError,
    services::images::ImageStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub images: ImageStore,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, images: ImageStore) -> Self {
        Self { config, db, images }
    }

    /// Root that photo URLs are built from: the configured public URL, or the
    /// host the request was addressed to.
    pub fn base_url(&self, host: &str) -> Result<Url, AppError> {
        match &self.config.public_base_url {
            Some(url) => Ok(url.clone()),
            None => parse_base_url(&format!("http://{host}/")),
        }
    }
}
