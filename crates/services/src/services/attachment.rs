use std::path::{Path, PathBuf};

use thiserror::Error;
use utils::assets::uploads_dir;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("No file uploaded")]
    EmptyFile,
    #[error("File too large ({0} bytes, max {1})")]
    TooLarge(u64, u64),
    #[error("Stored file not found")]
    NotFound,
    #[error("Invalid stored filename")]
    InvalidFilename,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Metadata of a file that made it to disk.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub size_bytes: i64,
}

/// Writes and removes attachment files under the uploads directory. The
/// database rows for attachments are the caller's concern; file and record
/// operations are deliberately not transactional (see the crash windows
/// documented in DESIGN.md).
#[derive(Clone)]
pub struct AttachmentService {
    uploads_dir: PathBuf,
    max_size_bytes: u64,
}

impl AttachmentService {
    pub fn new(max_size_bytes: u64) -> Result<Self, AttachmentError> {
        let uploads_dir = uploads_dir();
        if !uploads_dir.exists() {
            std::fs::create_dir_all(&uploads_dir)?;
        }
        Ok(Self {
            uploads_dir,
            max_size_bytes,
        })
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.uploads_dir.join(filename)
    }

    /// Persist uploaded bytes under a fresh name, keeping the original
    /// extension so static serving gets a sensible content type.
    pub async fn store(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, AttachmentError> {
        if bytes.is_empty() {
            return Err(AttachmentError::EmptyFile);
        }
        if bytes.len() as u64 > self.max_size_bytes {
            return Err(AttachmentError::TooLarge(
                bytes.len() as u64,
                self.max_size_bytes,
            ));
        }

        let filename = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        tokio::fs::write(self.path_for(&filename), bytes).await?;
        Ok(StoredFile {
            size_bytes: bytes.len() as i64,
            filename,
        })
    }

    /// Unlink a stored file. Filenames are generated by [`store`], so
    /// anything path-like coming back from the database is rejected
    /// instead of resolved.
    pub async fn remove(&self, filename: &str) -> Result<(), AttachmentError> {
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.contains("..") {
            return Err(AttachmentError::InvalidFilename);
        }

        match tokio::fs::remove_file(self.path_for(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(AttachmentError::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Lowercased alphanumeric extension of the uploaded name, if it has one.
fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 16 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
