//! Plain-text extraction from uploaded documents.
//!
//! Dispatch is by file extension. Unknown extensions never fail: they extract to
//! [`UNSUPPORTED_FORMAT_NOTICE`] so the document can still be listed and classified by name.

mod bundle;
mod office;

use std::path::Path;
use thiserror::Error;

pub use bundle::{MAX_MEMBER_BYTES, UploadedFile, expand_upload};

/// Text produced for files whose format is not recognised.
pub const UNSUPPORTED_FORMAT_NOTICE: &str = "Formato não suportado.";

/// Errors raised while parsing a supported format.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The PDF parser rejected the document.
    #[error("Failed to read PDF: {0}")]
    Pdf(String),
    /// The file is not a readable ZIP container.
    #[error("Failed to open archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// A required part is absent from an Office document.
    #[error("Document is missing part '{0}'")]
    MissingPart(String),
    /// The Word reader rejected the document.
    #[error("Failed to read DOCX: {0}")]
    Docx(String),
    /// An Office part is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An archive member expands beyond the per-member limit.
    #[error("Archive member '{name}' is larger than {limit} bytes")]
    MemberTooLarge {
        /// Member path inside the archive.
        name: String,
        /// Maximum accepted size in bytes.
        limit: u64,
    },
    /// An archive member could not be read as UTF-8 text.
    #[error("Failed to read archive member: {0}")]
    Io(#[from] std::io::Error),
}

/// File formats the extractor understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Portable Document Format.
    Pdf,
    /// Word document.
    Docx,
    /// PowerPoint presentation.
    Pptx,
    /// Excel workbook.
    Xlsx,
    /// UTF-8 plain text.
    Txt,
}

impl FileFormat {
    /// Detect the format from the filename's extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        match extension(filename)?.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

pub(crate) fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
}

/// Extract the plain text of `bytes`, interpreting them according to `filename`'s extension.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractionError> {
    let Some(format) = FileFormat::from_filename(filename) else {
        tracing::debug!(filename, "Unsupported format");
        return Ok(UNSUPPORTED_FORMAT_NOTICE.to_string());
    };

    let text = match format {
        FileFormat::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|error| ExtractionError::Pdf(error.to_string()))?,
        FileFormat::Docx => office::docx_text(bytes)?,
        FileFormat::Pptx => office::pptx_text(bytes)?,
        FileFormat::Xlsx => office::xlsx_text(bytes)?,
        FileFormat::Txt => String::from_utf8_lossy(bytes).into_owned(),
    };
    tracing::debug!(filename, ?format, chars = text.len(), "Extracted text");
    Ok(text)
}
