use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// On-disk artifact storage. Each artifact is one flat file at
/// `{dir}/{name}`; names are generated server-side and never taken from the
/// client unparsed.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Artifact storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write to a temp file and rename, so a reader never sees a partial
    /// artifact.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let tmp = self.dir.join(format!(".{}.part", name));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, self.file_path(name)).await?;
        Ok(())
    }

    /// `None` if no artifact has that name.
    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.file_path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let dir = std::env::temp_dir().join(format!("hearth-storage-{}", uuid::Uuid::new_v4()));
        let storage = Storage::new(dir.clone()).await.unwrap();

        storage.write("receipt.png", b"\x89PNG").await.unwrap();
        assert_eq!(storage.read("receipt.png").await.unwrap().as_deref(), Some(&b"\x89PNG"[..]));
        assert!(storage.read("missing.png").await.unwrap().is_none());
        assert!(!dir.join(".receipt.png.part").exists());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
