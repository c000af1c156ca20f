use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Media root on disk. Each picture is a flat file named after its post.
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub async fn new(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a stored file. Rejects names that could leave the media root.
    pub fn file_path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..")
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid media file name {name:?}"),
            ));
        }
        Ok(self.dir.join(name))
    }

    /// Write a new file and flush it to disk. Fails if the name is taken.
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.file_path(name)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Delete a file. A file that is already gone is not an error.
    pub async fn delete(&self, name: &str) -> io::Result<()> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted media file {}", name);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Media file {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Names of all stored files.
    pub async fn list(&self) -> io::Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}
