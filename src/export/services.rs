use std::time::Duration;

use anyhow::Context;
use tracing::{info, instrument};
use uuid::Uuid;

use super::aggregate::export_project_data;
use super::archive::{archive_filename, build_archive};
use super::types::ExportRecord;
use crate::error::AppResult;
use crate::images::fetch::fetch_all;
use crate::images::remote::BlobSource;
use crate::state::AppState;

/// A finished export, ready to be sent as an attachment.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Aggregates, fetches and archives one project.
#[instrument(skip(st))]
pub async fn export_project(st: &AppState, project_id: Uuid) -> AppResult<ExportArchive> {
    let record = export_project_data(&st.db, project_id).await?;
    package_export(record, st.remote.as_ref(), st.config.remote.fetch_timeout()).await
}

/// Fetches every image of `record` and zips them with the manifest.
pub async fn package_export<S>(
    record: ExportRecord,
    source: &S,
    timeout: Duration,
) -> AppResult<ExportArchive>
where
    S: BlobSource + ?Sized,
{
    let (name, urls, manifest) = record.into_parts();
    let blobs = fetch_all(source, &urls, timeout).await?;

    let bytes = tokio::task::spawn_blocking(move || build_archive(&manifest, &blobs))
        .await
        .context("archive task panicked")??;

    let filename = archive_filename(&name);
    info!(%filename, images = urls.len(), bytes = bytes.len(), "export archive built");
    Ok(ExportArchive { filename, bytes })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use zip::ZipArchive;

    use super::*;
    use crate::error::{AppError, RemoteError};
    use crate::export::types::{AnnotationManifest, ExportCategory, ExportImage};

    #[derive(Default)]
    struct FakeSource {
        blobs: HashMap<String, Bytes>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl BlobSource for FakeSource {
        async fn fetch(&self, url: &str) -> Result<Bytes, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.blobs
                .get(url)
                .cloned()
                .ok_or_else(|| RemoteError::UnexpectedResponse(format!("404 for {url}")))
        }
    }

    fn record(filenames: &[&str]) -> ExportRecord {
        ExportRecord {
            name: "birds".into(),
            manifest: AnnotationManifest {
                categories: vec![ExportCategory {
                    id: "c1".into(),
                    name: "owl".into(),
                }],
                images: filenames
                    .iter()
                    .enumerate()
                    .map(|(i, f)| ExportImage {
                        id: format!("i{i}"),
                        filename: (*f).into(),
                        width: 1,
                        height: 1,
                    })
                    .collect(),
                annotations: vec![],
            },
            image_urls: filenames
                .iter()
                .map(|f| format!("https://cdn.local/BIRDS/{f}.png"))
                .collect(),
        }
    }

    fn source_for(filenames: &[&str]) -> FakeSource {
        FakeSource {
            blobs: filenames
                .iter()
                .map(|f| {
                    (
                        format!("https://cdn.local/BIRDS/{f}.png"),
                        Bytes::from(format!("bytes of {f}")),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn packages_every_image_under_its_filename() {
        let names = ["image-aaaaa", "image-bbbbb"];
        let source = source_for(&names);

        let out = package_export(record(&names), &source, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(out.filename, "birds_annotations.zip");
        let mut zip = ZipArchive::new(Cursor::new(out.bytes)).unwrap();
        assert_eq!(zip.len(), 3);
        for f in names {
            let mut body = String::new();
            zip.by_name(&format!("images/{f}"))
                .unwrap()
                .read_to_string(&mut body)
                .unwrap();
            assert_eq!(body, format!("bytes of {f}"));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn one_missing_blob_fails_the_export() {
        let source = source_for(&["image-aaaaa"]);

        let err = package_export(
            record(&["image-aaaaa", "image-zzzzz"]),
            &source,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Network(_)));
    }

    #[tokio::test]
    async fn project_without_images_exports_manifest_only() {
        let source = FakeSource::default();

        let out = package_export(record(&[]), &source, Duration::from_secs(5))
            .await
            .unwrap();

        let zip = ZipArchive::new(Cursor::new(out.bytes)).unwrap();
        assert_eq!(zip.file_names().collect::<Vec<_>>(), vec!["annotations.json"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
