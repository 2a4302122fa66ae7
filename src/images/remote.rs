//! Retrying client for image blobs held in object storage.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageReader;
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::RemoteError;
use crate::retry::{with_retry, RetryPolicy};
use crate::storage::StorageClient;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Anything that can turn a blob URL into its bytes.
#[async_trait]
pub trait BlobSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, RemoteError>;
}

#[derive(Clone)]
pub struct RemoteImages {
    storage: Arc<dyn StorageClient>,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RemoteImages {
    pub fn new(storage: Arc<dyn StorageClient>, http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            storage,
            http,
            policy,
        }
    }

    /// Stores `content` as `{folder}/{name}`.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn upload(
        &self,
        content: Bytes,
        folder: &str,
        name: &str,
    ) -> Result<UploadedImage, RemoteError> {
        let info = inspect(&content)?;
        let public_id = format!("{folder}/{name}");

        let url = with_retry(&self.policy, "upload", || {
            let body = content.clone();
            let public_id = public_id.as_str();
            async move {
                self.storage
                    .put_object(public_id, body, info.content_type)
                    .await
                    .map_err(RemoteError::Storage)
            }
        })
        .await?;

        info!(%public_id, %url, "image uploaded");
        Ok(UploadedImage {
            url,
            filename: name.to_string(),
            width: info.width,
            height: info.height,
        })
    }

    /// Deletes the blob behind a stored image URL. Succeeds when the blob is
    /// already gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, url: &str) -> Result<(), RemoteError> {
        let public_id = self
            .storage
            .public_id_from_url(url)
            .ok_or_else(|| RemoteError::MalformedUrl(url.to_string()))?;

        let id = public_id.as_str();
        with_retry(&self.policy, "delete", || async move {
            self.storage
                .delete_object(id)
                .await
                .map_err(RemoteError::Storage)
        })
        .await?;

        info!(%public_id, "image deleted");
        Ok(())
    }

    /// Deletes every blob in `folder`.
    #[instrument(skip(self))]
    pub async fn delete_all(&self, folder: &str) -> Result<(), RemoteError> {
        let removed = with_retry(&self.policy, "delete_all", || async move {
            self.storage
                .delete_prefix(folder)
                .await
                .map_err(RemoteError::Storage)
        })
        .await?;

        info!(folder, removed, "folder purged");
        Ok(())
    }
}

#[async_trait]
impl BlobSource for RemoteImages {
    async fn fetch(&self, url: &str) -> Result<Bytes, RemoteError> {
        with_retry(&self.policy, "fetch", || async move {
            let response = self.http.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(RemoteError::UnexpectedResponse(format!("{status} from {url}")));
            }
            Ok(response.bytes().await?)
        })
        .await
    }
}

#[derive(Debug, Clone, Copy)]
struct ImageInfo {
    width: u32,
    height: u32,
    content_type: &'static str,
}

fn inspect(content: &[u8]) -> Result<ImageInfo, RemoteError> {
    let reader = ImageReader::new(Cursor::new(content))
        .with_guessed_format()
        .map_err(|e| RemoteError::UnreadableImage(e.to_string()))?;
    let content_type = reader
        .format()
        .map(|f| f.to_mime_type())
        .ok_or_else(|| RemoteError::UnreadableImage("unknown image format".into()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| RemoteError::UnreadableImage(e.to_string()))?;
    Ok(ImageInfo {
        width,
        height,
        content_type,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Rgb};

    /// Encodes a solid `w` x `h` PNG.
    pub fn png(w: u32, h: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(w, h, Rgb([200u8, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(storage: Arc<MemoryStorage>, attempts: u32) -> RemoteImages {
        RemoteImages::new(storage, reqwest::Client::new(), RetryPolicy::immediate(attempts))
    }

    #[tokio::test]
    async fn upload_reports_url_and_dimensions() {
        let storage = Arc::new(MemoryStorage::default());
        let remote = client(storage.clone(), 1);

        let out = remote
            .upload(Bytes::from(fixtures::png(7, 3)), "CATS", "image-abcde")
            .await
            .unwrap();

        assert_eq!(out.filename, "image-abcde");
        assert_eq!((out.width, out.height), (7, 3));
        assert!(out.url.ends_with("/CATS/image-abcde"));
        assert!(storage.objects.lock().unwrap().contains_key("CATS/image-abcde"));
    }

    #[tokio::test]
    async fn upload_retries_until_storage_recovers() {
        let storage = Arc::new(MemoryStorage::failing(2));
        let remote = client(storage.clone(), 3);

        remote
            .upload(Bytes::from(fixtures::png(2, 2)), "CATS", "image-aaaaa")
            .await
            .unwrap();
        assert_eq!(storage.calls(), 3);
    }

    #[tokio::test]
    async fn upload_fails_after_exhausting_attempts() {
        let storage = Arc::new(MemoryStorage::failing(10));
        let remote = client(storage.clone(), 3);

        let err = remote
            .upload(Bytes::from(fixtures::png(2, 2)), "CATS", "image-aaaaa")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Storage(_)));
        assert_eq!(storage.calls(), 3);
    }

    #[tokio::test]
    async fn upload_rejects_non_images_without_touching_storage() {
        let storage = Arc::new(MemoryStorage::default());
        let remote = client(storage.clone(), 3);

        let err = remote
            .upload(Bytes::from_static(b"plain text"), "CATS", "image-bbbbb")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::UnreadableImage(_)));
        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn delete_uses_folder_and_stem_from_url() {
        let storage = Arc::new(MemoryStorage::default());
        storage
            .objects
            .lock()
            .unwrap()
            .insert("DOGS/image-zzzzz".into(), Bytes::from_static(b"x"));
        let remote = client(storage.clone(), 1);

        remote
            .delete("https://cdn.local/bucket/DOGS/image-zzzzz.png")
            .await
            .unwrap();
        assert!(storage.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_a_missing_blob_succeeds() {
        let storage = Arc::new(MemoryStorage::default());
        storage
            .objects
            .lock()
            .unwrap()
            .insert("DOGS/image-keep".into(), Bytes::from_static(b"x"));
        let remote = client(storage.clone(), 3);

        let url = "https://cdn.local/bucket/DOGS/image-gone.png";
        remote.delete(url).await.unwrap();
        remote.delete(url).await.unwrap();

        assert_eq!(storage.calls(), 2);
        assert_eq!(storage.objects.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_rejects_url_without_folder() {
        let storage = Arc::new(MemoryStorage::default());
        let remote = client(storage.clone(), 3);

        let err = remote.delete("image.png").await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedUrl(_)));
        assert_eq!(storage.calls(), 0);
    }

    #[tokio::test]
    async fn delete_all_purges_only_the_folder() {
        let storage = Arc::new(MemoryStorage::default());
        {
            let mut objects = storage.objects.lock().unwrap();
            objects.insert("A/image-1".into(), Bytes::new());
            objects.insert("A/image-2".into(), Bytes::new());
            objects.insert("AB/image-3".into(), Bytes::new());
        }
        let remote = client(storage.clone(), 1);

        remote.delete_all("A").await.unwrap();
        let left: Vec<_> = storage.objects.lock().unwrap().keys().cloned().collect();
        assert_eq!(left, vec!["AB/image-3".to_string()]);
    }

    #[tokio::test]
    async fn fetch_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/P/image-aaaaa"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"blob".to_vec()))
            .mount(&server)
            .await;

        let remote = client(Arc::new(MemoryStorage::default()), 1);
        let bytes = remote
            .fetch(&format!("{}/P/image-aaaaa", server.uri()))
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"blob");
    }

    #[tokio::test]
    async fn fetch_retries_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/P/missing"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let remote = client(Arc::new(MemoryStorage::default()), 3);
        let err = remote
            .fetch(&format!("{}/P/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::UnexpectedResponse(_)));
        server.verify().await;
    }
}
