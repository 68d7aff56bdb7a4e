use crate::extraction::{ExtractionError, FileFormat, extension};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Largest uncompressed size accepted for a single archive member (64 MiB).
pub const MAX_MEMBER_BYTES: u64 = 64 * 1024 * 1024;

/// A named file ready to be added to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Document name; archive members keep their relative path.
    pub name: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// Turn one upload into the documents it carries.
///
/// A `.zip` upload expands into its members with a supported format; directories, unsafe
/// paths and macOS resource forks are skipped. Any other upload is returned as-is. A member
/// that inflates past [`MAX_MEMBER_BYTES`] rejects the whole upload.
pub fn expand_upload(name: &str, bytes: Vec<u8>) -> Result<Vec<UploadedFile>, ExtractionError> {
    expand_with_limit(name, bytes, MAX_MEMBER_BYTES)
}

fn expand_with_limit(
    name: &str,
    bytes: Vec<u8>,
    member_limit: u64,
) -> Result<Vec<UploadedFile>, ExtractionError> {
    if extension(name).as_deref() != Some("zip") {
        return Ok(vec![UploadedFile {
            name: name.to_string(),
            bytes,
        }]);
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes.as_slice()))?;
    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut member = archive.by_index(index)?;
        if member.is_dir() {
            continue;
        }
        let Some(path) = member.enclosed_name() else {
            tracing::warn!(bundle = name, member = member.name(), "Skipping unsafe archive path");
            continue;
        };
        let member_name = path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let hidden = member_name.starts_with("__MACOSX/")
            || path
                .file_name()
                .is_some_and(|file| file.to_string_lossy().starts_with('.'));
        if hidden || FileFormat::from_filename(&member_name).is_none() {
            tracing::debug!(bundle = name, member = %member_name, "Skipping archive member");
            continue;
        }
        // The header's declared size is untrusted; count the inflated bytes instead.
        let mut contents = Vec::new();
        (&mut member)
            .take(member_limit + 1)
            .read_to_end(&mut contents)?;
        if contents.len() as u64 > member_limit {
            tracing::warn!(bundle = name, member = %member_name, "Archive member too large");
            return Err(ExtractionError::MemberTooLarge {
                name: member_name,
                limit: member_limit,
            });
        }
        files.push(UploadedFile {
            name: member_name,
            bytes: contents,
        });
    }

    tracing::info!(bundle = name, documents = files.len(), "Expanded archive upload");
    Ok(files)
}
