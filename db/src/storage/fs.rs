use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument};
use ulid::Ulid;

use crate::{
    models::DbCertificate,
    storage::{CertificateStore, StoreError, Storage},
};

const CERT_EXTENSION: &str = "der";

/// Stores each certificate as `<ulid>.der` inside a single directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    dir: PathBuf,
}

impl FsStorage {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cert_path(&self, id: Ulid) -> PathBuf {
        self.dir.join(format!("{id}.{CERT_EXTENSION}"))
    }
}

/// Write to a temp file, flush it to disk, then rename it into place.
async fn write_file_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await?;

    if let Some(dir) = path.parent() {
        sync_dir(dir).await?;
    }
    Ok(())
}

/// Persist directory entries, so a rename survives a crash.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl CertificateStore for FsStorage {
    #[instrument(skip(self, der), fields(dir = %self.dir.display()))]
    async fn add_certificate(&self, der: &[u8]) -> Result<String, StoreError> {
        let id = Ulid::new();
        let path = self.cert_path(id);

        write_file_atomic(&path, der).await?;

        debug!(path = %path.display(), "Stored certificate");
        Ok(id.to_string())
    }

    async fn get_certificate(&self, id: &str) -> Result<Option<DbCertificate>, StoreError> {
        // Only ULIDs are valid file stems, which also keeps ids from escaping the directory.
        let Ok(id) = Ulid::from_string(id) else {
            return Ok(None);
        };

        match fs::read(self.cert_path(id)).await {
            Ok(der) => Ok(Some(DbCertificate {
                id,
                der,
                created_at: id.datetime().into(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn ping(&self) -> Result<(), StoreError> {
        let metadata = fs::metadata(&self.dir).await?;
        if !metadata.is_dir() {
            return Err(StoreError::NotFound);
        }
        if metadata.permissions().readonly() {
            return Err(StoreError::Internal(
                format!("{} is read-only", self.dir.display()).into(),
            ));
        }
        Ok(())
    }
}
