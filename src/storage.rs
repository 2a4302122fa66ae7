use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    types::{Delete, ObjectIdentifier},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;

use crate::config::StorageConfig;

/// Object storage addressed by public ids of the form `{folder}/{name}`.
///
/// Public URLs handed out by [`StorageClient::put_object`] must end in
/// `/{folder}/{name}` optionally followed by a file extension, so that
/// [`StorageClient::public_id_from_url`] can recover the id when only the
/// URL was persisted.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Stores `body` and returns its public URL.
    async fn put_object(&self, public_id: &str, body: Bytes, content_type: &str)
        -> anyhow::Result<String>;

    /// Deletes one object. Deleting a missing object succeeds, matching the
    /// `204` S3 returns for absent keys.
    async fn delete_object(&self, public_id: &str) -> anyhow::Result<()>;

    /// Deletes every object below `folder/`. Returns how many were removed.
    async fn delete_prefix(&self, folder: &str) -> anyhow::Result<usize>;

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        public_id_from_url(url)
    }
}

/// Last two path segments of `url` with the extension of the final one stripped.
///
/// `https://cdn/x/PROJECT/image-abcde.jpg` → `PROJECT/image-abcde`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?.trim_end_matches('/');
    let mut segments = path.rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty())?;
    let folder = segments.next().filter(|s| !s.is_empty() && !s.ends_with(':'))?;
    let stem = match file.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file,
    };
    Some(format!("{folder}/{stem}"))
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, public_id: &str) -> String {
        format!("{}/{}", self.public_url, public_id)
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(
        &self,
        public_id: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let out = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(public_id)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        if out.e_tag().is_none() {
            anyhow::bail!("s3 put_object returned no etag for {public_id}");
        }
        Ok(self.url_for(public_id))
    }

    async fn delete_object(&self, public_id: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(public_id)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn delete_prefix(&self, folder: &str) -> anyhow::Result<usize> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        let mut removed = 0;
        let mut token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .context("s3 list_objects_v2")?;

            let ids = page
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(|k| ObjectIdentifier::builder().key(k).build())
                .collect::<Result<Vec<_>, _>>()
                .context("build object identifiers")?;

            if !ids.is_empty() {
                let count = ids.len();
                let delete = Delete::builder()
                    .set_objects(Some(ids))
                    .quiet(true)
                    .build()
                    .context("build delete request")?;
                let out = self
                    .client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .context("s3 delete_objects")?;
                if let Some(failed) = out.errors().first() {
                    anyhow::bail!(
                        "s3 delete_objects left {} object(s), first {:?}: {:?}",
                        out.errors().len(),
                        failed.key(),
                        failed.message()
                    );
                }
                removed += count;
            }

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string())
                }
                _ => break,
            }
        }

        debug!(folder, removed, "s3 prefix purged");
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory storage for tests.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: Mutex<BTreeMap<String, Bytes>>,
        pub calls: AtomicU32,
        /// Number of upcoming calls that fail before the store starts behaving.
        pub fail_next: AtomicU32,
    }

    impl MemoryStorage {
        pub fn failing(times: u32) -> Self {
            let s = Self::default();
            s.fail_next.store(times, Ordering::SeqCst);
            s
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn tick(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.fail_next.load(Ordering::SeqCst);
            if left > 0 {
                self.fail_next.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("injected storage failure");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StorageClient for MemoryStorage {
        async fn put_object(&self, public_id: &str, body: Bytes, _ct: &str) -> anyhow::Result<String> {
            self.tick()?;
            self.objects.lock().unwrap().insert(public_id.to_string(), body);
            Ok(format!("https://fake.local/bucket/{public_id}"))
        }

        async fn delete_object(&self, public_id: &str) -> anyhow::Result<()> {
            self.tick()?;
            self.objects.lock().unwrap().remove(public_id);
            Ok(())
        }

        async fn delete_prefix(&self, folder: &str) -> anyhow::Result<usize> {
            self.tick()?;
            let prefix = format!("{folder}/");
            let mut objects = self.objects.lock().unwrap();
            let before = objects.len();
            objects.retain(|k, _| !k.starts_with(&prefix));
            Ok(before - objects.len())
        }
    }
}
