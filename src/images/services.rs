use std::collections::HashSet;

use bytes::Bytes;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::naming::generate_image_name;
use super::remote::{RemoteImages, UploadedImage};
use super::repo::Image;
use crate::error::{AppError, AppResult, RemoteError};
use crate::projects::repo_types::Project;
use crate::state::AppState;

/// Uploads `files` one after another under `folder`.
///
/// Names are drawn fresh against `taken`. When any upload fails, blobs already
/// stored by this call are deleted (best effort) and the first error returned.
#[instrument(skip(remote, taken, files), fields(count = files.len()))]
pub async fn upload_batch(
    remote: &RemoteImages,
    folder: &str,
    taken: &mut HashSet<String>,
    files: Vec<Bytes>,
) -> Result<Vec<UploadedImage>, RemoteError> {
    let mut done = Vec::with_capacity(files.len());
    for content in files {
        let name = generate_image_name(taken);
        match remote.upload(content, folder, &name).await {
            Ok(uploaded) => done.push(uploaded),
            Err(e) => {
                discard(remote, &done).await;
                return Err(e);
            }
        }
    }
    Ok(done)
}

/// Best-effort removal of blobs that will not get a database row.
pub async fn discard(remote: &RemoteImages, uploaded: &[UploadedImage]) {
    for u in uploaded {
        if let Err(e) = remote.delete(&u.url).await {
            warn!(url = %u.url, error = %e, "orphaned blob left in storage");
        }
    }
}

/// Uploads images into an existing project and records them.
#[instrument(skip(st, files), fields(project_id = %project.id, count = files.len()))]
pub async fn add_images(st: &AppState, project: &Project, files: Vec<Bytes>) -> AppResult<Vec<Image>> {
    if files.is_empty() {
        return Err(AppError::BadRequest("at least one image is required".into()));
    }

    let mut taken: HashSet<String> = Image::list_filenames(&st.db, project.id)
        .await?
        .into_iter()
        .collect();
    let uploaded = upload_batch(&st.remote, &project.folder, &mut taken, files).await?;

    match insert_all(st, project.id, &uploaded).await {
        Ok(images) => {
            info!(count = images.len(), "images added");
            Ok(images)
        }
        Err(e) => {
            discard(&st.remote, &uploaded).await;
            Err(e)
        }
    }
}

async fn insert_all(st: &AppState, project_id: Uuid, uploaded: &[UploadedImage]) -> AppResult<Vec<Image>> {
    let mut tx = st.db.begin().await?;
    let mut images = Vec::with_capacity(uploaded.len());
    for u in uploaded {
        images.push(Image::insert_tx(&mut tx, project_id, u).await?);
    }
    tx.commit().await?;
    Ok(images)
}

/// Removes the blob, then the row (annotations cascade).
#[instrument(skip(st))]
pub async fn delete_image(st: &AppState, user_id: Uuid, image_id: Uuid) -> AppResult<()> {
    let image = Image::find_for_user(&st.db, image_id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Image", image_id))?;

    st.remote.delete(&image.url).await?;
    Image::delete(&st.db, image.id).await?;
    info!(%image_id, "image deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::images::remote::fixtures::png;
    use crate::retry::RetryPolicy;
    use crate::storage::testing::MemoryStorage;

    fn remote(storage: Arc<MemoryStorage>) -> RemoteImages {
        RemoteImages::new(storage, reqwest::Client::new(), RetryPolicy::immediate(1))
    }

    #[tokio::test]
    async fn batch_names_are_fresh_and_recorded() {
        let storage = Arc::new(MemoryStorage::default());
        let mut taken = HashSet::from(["image-aaaaa".to_string()]);

        let out = upload_batch(
            &remote(storage.clone()),
            "DOGS",
            &mut taken,
            vec![Bytes::from(png(4, 2)), Bytes::from(png(2, 4))],
        )
        .await
        .unwrap();

        assert_eq!(out.len(), 2);
        assert_ne!(out[0].filename, out[1].filename);
        assert!(out.iter().all(|u| u.filename.starts_with("image-")));
        assert_eq!((out[1].width, out[1].height), (2, 4));
        assert_eq!(taken.len(), 3);
        assert_eq!(storage.objects.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_file_rolls_back_earlier_uploads() {
        let storage = Arc::new(MemoryStorage::default());
        let mut taken = HashSet::new();

        let err = upload_batch(
            &remote(storage.clone()),
            "DOGS",
            &mut taken,
            vec![Bytes::from(png(1, 1)), Bytes::from_static(b"plain text")],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RemoteError::UnreadableImage(_)));
        assert!(storage.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_surfaces_after_cleanup() {
        let storage = Arc::new(MemoryStorage::failing(1));
        let mut taken = HashSet::new();

        let err = upload_batch(
            &remote(storage.clone()),
            "DOGS",
            &mut taken,
            vec![Bytes::from(png(1, 1))],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RemoteError::Storage(_)));
        assert_eq!(storage.calls(), 1);
    }
}
