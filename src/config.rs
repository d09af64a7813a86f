use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub media_root: PathBuf,
    pub public_base_url: Url,
    pub admin_token: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://itinera.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));

        // Joining storage keys onto the base requires the trailing slash.
        let mut raw_base = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000/media/".to_string());
        if !raw_base.ends_with('/') {
            raw_base.push('/');
        }
        let public_base_url = Url::parse(&raw_base)
            .map_err(|err| AppError::Config(format!("invalid PUBLIC_BASE_URL: {err}")))?;

        let admin_token =
            env::var("ADMIN_TOKEN").unwrap_or_else(|_| "change-me-admin-token".to_string());

        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|err| AppError::Config(format!("invalid MAX_UPLOAD_BYTES: {err}")))?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            database_url,
            listen_addr,
            media_root,
            public_base_url,
            admin_token,
            max_upload_bytes,
        })
    }

    /// Whole-request ceiling for multipart bodies; generous enough for a
    /// full gallery plus timeline set at the per-file limit.
    pub fn body_limit_bytes(&self) -> usize {
        self.max_upload_bytes.saturating_mul(64)
    }
}
