use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";

/// Formats an upload may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Word,
}

impl UploadKind {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Pdf => &["pdf"],
            UploadKind::Word => &["docx", "doc"],
        }
    }

    /// Case-insensitive check of the text after the last dot, so `.pdf`
    /// on its own is a PDF.
    pub fn accepts(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => self
                .extensions()
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
            None => false,
        }
    }

    /// Message returned when an upload has the wrong extension.
    pub fn rejection_message(&self) -> &'static str {
        match self {
            UploadKind::Pdf => "File must be a PDF",
            UploadKind::Word => "File must be a Word document (.docx or .doc)",
        }
    }

    /// Suffix of the staged copy on disk.
    pub fn staging_suffix(&self) -> &'static str {
        match self {
            UploadKind::Pdf => ".pdf",
            UploadKind::Word => ".docx",
        }
    }
}

/// Formats the service produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
    Text,
}

impl DocumentKind {
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Word => "docx",
            DocumentKind::Text => "txt",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => PDF_MIME,
            DocumentKind::Word => DOCX_MIME,
            DocumentKind::Text => TEXT_MIME,
        }
    }

    /// `report.pdf` -> `report.docx` when converting to Word. Only the text
    /// after the last dot is replaced.
    pub fn rename(&self, filename: &str) -> String {
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(filename);
        format!("{}.{}", stem, self.extension())
    }
}

/// A finished conversion, ready to be sent back as a download.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub filename: String,
    pub media_type: &'static str,
    pub content: Bytes,
}

impl ConvertedDocument {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF processing error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Word package error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Word XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("PDF is encrypted and cannot be opened without a password")]
    Encrypted,

    #[error("PDF uses an unsupported encryption scheme: {message}")]
    UnsupportedEncryption { message: String },

    #[error("PDF is password protected. Please provide the password.")]
    PasswordRequired,

    #[error("Invalid PDF or incorrect password: {message}")]
    UnreadablePdf { message: String },

    #[error("Conversion task was cancelled")]
    Cancelled,
}

impl ConversionError {
    /// Failures caused by what the client sent rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConversionError::PasswordRequired | ConversionError::UnreadablePdf { .. }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
