use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

/// Temp file holding an upload while it is hashed.
///
/// The file is removed on drop, including when the ingest future is
/// cancelled part-way through the stream.
pub(crate) struct Spool {
    path: PathBuf,
    file: fs::File,
}

impl Spool {
    pub(crate) async fn create(dir: &Path) -> io::Result<Self> {
        let path = dir.join(format!("ingest-{}", Uuid::new_v4()));
        let file = fs::File::create(&path).await?;
        Ok(Self { path, file })
    }

    pub(crate) fn file_mut(&mut self) -> &mut fs::File {
        &mut self.file
    }

    /// Open an independent reader positioned at the start of the spooled bytes.
    pub(crate) async fn reopen(&self) -> io::Result<fs::File> {
        fs::File::open(&self.path).await
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Spool {
    fn drop(&mut self) {
        // Best effort.
        let _ = std::fs::remove_file(&self.path);
    }
}
