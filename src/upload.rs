use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::ApiError;
use crate::types::{ConversionError, UploadKind};

pub const FILE_FIELD: &str = "file";
pub const PASSWORD_FIELD: &str = "password";

const MAX_PASSWORD_BYTES: usize = 1024;

/// Directory in which every request stages its input and output files.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates a uniquely named file tagged with the job id. The file is
    /// removed when the returned value is dropped.
    pub fn create(&self, job_id: &Uuid, suffix: &str) -> io::Result<StagedFile> {
        let prefix = format!("{}-", job_id.simple());
        let file = Builder::new()
            .prefix(&prefix)
            .suffix(suffix)
            .tempfile_in(&self.dir)?;
        Ok(StagedFile { file })
    }
}

#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        fs::read(self.path())
    }

    /// Deletes the file now. A failed delete is logged and otherwise ignored.
    pub fn discard(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.file.close() {
            log::warn!("Failed to remove staged file {}: {}", path.display(), e);
        }
    }

    async fn append_from(&self, field: &mut Field, max_bytes: u64) -> Result<u64, ApiError> {
        let mut out = tokio::fs::File::from_std(self.file.as_file().try_clone().map_err(staging_failed)?);
        let mut written = 0u64;

        while let Some(chunk) = field.try_next().await.map_err(invalid_payload)? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(ApiError::PayloadTooLarge { limit: max_bytes });
            }
            out.write_all(&chunk).await.map_err(staging_failed)?;
        }

        out.flush().await.map_err(staging_failed)?;
        Ok(written)
    }
}

/// The uploaded document after it has been written to the staging area.
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub file: StagedFile,
    pub size: u64,
}

#[derive(Debug)]
pub struct UploadForm {
    pub upload: Upload,
    /// `None` when the field is missing or empty.
    pub password: Option<String>,
}

impl UploadForm {
    /// Reads the multipart form, rejecting a file whose extension does not
    /// match `kind` before anything is written to disk.
    pub async fn read(
        mut payload: Multipart,
        staging: &StagingArea,
        job_id: &Uuid,
        kind: UploadKind,
        max_bytes: u64,
    ) -> Result<Self, ApiError> {
        let mut upload = None;
        let mut password = None;

        while let Some(mut field) = payload.try_next().await.map_err(invalid_payload)? {
            let (name, filename) = {
                let disposition = field.content_disposition();
                (
                    disposition.get_name().unwrap_or_default().to_string(),
                    disposition.get_filename().map(client_filename),
                )
            };

            match name.as_str() {
                FILE_FIELD => {
                    let filename = filename
                        .filter(|name| !name.is_empty())
                        .ok_or_else(|| ApiError::validation("No file uploaded"))?;
                    if !kind.accepts(&filename) {
                        return Err(ApiError::validation(kind.rejection_message()));
                    }

                    let file = staging
                        .create(job_id, kind.staging_suffix())
                        .map_err(staging_failed)?;
                    let size = file.append_from(&mut field, max_bytes).await?;
                    upload = Some(Upload {
                        filename,
                        file,
                        size,
                    });
                }
                PASSWORD_FIELD => {
                    let bytes = read_text_field(&mut field).await?;
                    let value = String::from_utf8(bytes)
                        .map_err(|_| ApiError::validation("Password must be valid UTF-8"))?;
                    password = Some(value).filter(|value| !value.is_empty());
                }
                _ => {
                    while field.try_next().await.map_err(invalid_payload)?.is_some() {}
                }
            }
        }

        let upload = upload.ok_or_else(|| ApiError::validation("No file uploaded"))?;
        Ok(Self { upload, password })
    }
}

async fn read_text_field(field: &mut Field) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(invalid_payload)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_PASSWORD_BYTES {
            return Err(ApiError::validation("Password is too long"));
        }
    }
    Ok(bytes)
}

/// Browsers send a bare name, but some clients include their local path.
fn client_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim().to_string()
}

fn invalid_payload(e: actix_multipart::MultipartError) -> ApiError {
    ApiError::validation(format!("Invalid multipart payload: {}", e))
}

fn staging_failed(e: io::Error) -> ApiError {
    ApiError::Conversion {
        context: "Upload failed",
        source: ConversionError::Io(e),
    }
}
