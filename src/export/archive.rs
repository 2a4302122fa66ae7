use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use super::types::AnnotationManifest;
use crate::error::ArchiveError;

pub const MANIFEST_ENTRY: &str = "annotations.json";
pub const IMAGES_DIR: &str = "images";

/// Download name for a project's archive.
pub fn archive_filename(project_name: &str) -> String {
    format!("{project_name}_annotations.zip")
}

/// Writes `images/{filename}` for every image, then `annotations.json`.
///
/// `blobs[i]` must hold the bytes of `manifest.images[i]`. Entries carry a
/// fixed timestamp so equal inputs give equal archives.
pub fn build_archive(manifest: &AnnotationManifest, blobs: &[Bytes]) -> Result<Vec<u8>, ArchiveError> {
    if manifest.images.len() != blobs.len() {
        return Err(ArchiveError::LengthMismatch {
            images: manifest.images.len(),
            blobs: blobs.len(),
        });
    }

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (image, blob) in manifest.images.iter().zip(blobs) {
        zip.start_file(format!("{IMAGES_DIR}/{}", image.filename), options)?;
        zip.write_all(blob)?;
    }

    let json = serde_json::to_vec_pretty(manifest)?;
    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(&json)?;

    Ok(zip.finish()?.into_inner())
}
