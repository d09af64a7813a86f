use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::{error::AppError, submission::UploadedFile};

pub const PROGRAM_IMAGES: &str = "program-images";
pub const TIMELINE_IMAGES: &str = "timeline-images";
pub const BANNERS: &str = "banners";

/// Disk-backed object store addressed by public URL. Uploads land under
/// `<root>/<folder>/<uuid>.<ext>` and are served back through the `/media`
/// static mount, so the URL returned here is what gets persisted on trips
/// and banners.
#[derive(Clone)]
pub struct MediaStore {
    root: Arc<PathBuf>,
    public_base: Url,
}

impl MediaStore {
    pub fn new(root: PathBuf, public_base: Url) -> Self {
        Self {
            root: Arc::new(root),
            public_base,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        for folder in [PROGRAM_IMAGES, TIMELINE_IMAGES, BANNERS] {
            fs::create_dir_all(self.root().join(folder)).await?;
        }
        Ok(())
    }

    pub async fn store(&self, file: &UploadedFile, folder: &str) -> Result<String, AppError> {
        let key = format!("{}.{}", Uuid::new_v4(), extension_for(file));
        let dir = self.root().join(folder);
        fs::create_dir_all(&dir)
            .await
            .map_err(|err| AppError::Storage(format!("failed to prepare {folder}: {err}")))?;
        fs::write(dir.join(&key), &file.bytes)
            .await
            .map_err(|err| AppError::Storage(format!("failed to store {key}: {err}")))?;

        let url = self
            .public_base
            .join(&format!("{folder}/{key}"))
            .map_err(|err| AppError::Storage(format!("unresolvable key {key}: {err}")))?;
        Ok(url.to_string())
    }

    /// Deleting is always cleanup of an object nothing references anymore,
    /// so failures are logged and swallowed rather than failing the caller.
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.path_for_url(url) else {
            warn!("skipping delete of url outside the media store: {url}");
            return;
        };
        if let Err(err) = fs::remove_file(&path).await {
            warn!("failed to delete stored object {}: {err}", path.display());
        }
    }

    fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let parsed = Url::parse(url).ok()?;
        if parsed.origin() != self.public_base.origin() {
            return None;
        }
        let relative = parsed.path().strip_prefix(self.public_base.path())?;
        if relative.is_empty()
            || relative
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            return None;
        }
        Some(self.root().join(relative))
    }
}

fn extension_for(file: &UploadedFile) -> String {
    Path::new(&file.file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".into())
}
