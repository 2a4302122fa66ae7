use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket holding image blobs.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base that object keys are appended to when building public URLs.
    pub public_url: String,
}

/// Retry and timeout policy for every call that leaves the process.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            retries: 1,
            retry_backoff_ms: 250,
            fetch_timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "boxmark".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "boxmark-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let endpoint = std::env::var("STORAGE_ENDPOINT")?;
        let bucket = std::env::var("STORAGE_BUCKET")?;
        let public_url = std::env::var("STORAGE_PUBLIC_URL").unwrap_or_else(|_| {
            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
        });
        let storage = StorageConfig {
            access_key: std::env::var("STORAGE_ACCESS_KEY")?,
            secret_key: std::env::var("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        let defaults = RemoteConfig::default();
        let remote = RemoteConfig {
            retries: env_parse("STORAGE_RETRIES").unwrap_or(defaults.retries),
            retry_backoff_ms: env_parse("STORAGE_RETRY_BACKOFF_MS")
                .unwrap_or(defaults.retry_backoff_ms),
            fetch_timeout_secs: env_parse("EXPORT_FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
        };

        Ok(Self {
            database_url,
            jwt,
            storage,
            remote,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_defaults_match_single_attempt_and_thirty_second_batch() {
        let remote = RemoteConfig::default();
        assert_eq!(remote.retry_policy().attempts, 1);
        assert_eq!(remote.fetch_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn retry_policy_carries_backoff() {
        let remote = RemoteConfig {
            retries: 3,
            retry_backoff_ms: 10,
            fetch_timeout_secs: 5,
        };
        let policy = remote.retry_policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(10));
    }
}
