//! All-or-nothing concurrent retrieval of image blobs.

use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::try_join_all;
use tracing::{debug, warn};

use super::remote::BlobSource;
use crate::error::RemoteError;

/// Fetches every url concurrently and returns the bodies in input order.
///
/// The batch shares one deadline. The first failure, or the deadline passing,
/// drops every outstanding fetch and fails the whole batch; no partial result
/// is ever returned.
pub async fn fetch_all<S>(
    source: &S,
    urls: &[String],
    timeout: Duration,
) -> Result<Vec<Bytes>, RemoteError>
where
    S: BlobSource + ?Sized,
{
    if urls.is_empty() {
        return Ok(Vec::new());
    }

    let started = Instant::now();
    let batch = try_join_all(urls.iter().map(|url| source.fetch(url)));

    match tokio::time::timeout(timeout, batch).await {
        Ok(Ok(blobs)) => {
            let total: usize = blobs.iter().map(Bytes::len).sum();
            debug!(
                count = blobs.len(),
                bytes = total,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "batch fetch complete"
            );
            Ok(blobs)
        }
        Ok(Err(e)) => {
            warn!(count = urls.len(), error = %e, "batch fetch failed");
            Err(e)
        }
        Err(_) => {
            warn!(count = urls.len(), ?timeout, "batch fetch timed out");
            Err(RemoteError::Timeout(timeout))
        }
    }
}
