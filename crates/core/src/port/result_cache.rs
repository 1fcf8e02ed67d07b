// Result Cache Port (Interface)

use crate::domain::{Fingerprint, Report};
use crate::error::Result;
use async_trait::async_trait;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expiry after write, in seconds.
    pub ttl_seconds: i64,
    /// Namespace prefix prepended to every cache key.
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 3600,
            key_prefix: "codesift:".to_string(),
        }
    }
}

/// Fingerprint → report mapping shared between the submission front-end and
/// the workers (process-external storage).
///
/// Callers must not let a degraded cache take the pipeline down: a failed
/// `get` is treated as a miss at the call site, and a failed `put` is logged
/// and dropped. Writes for the same fingerprint are value-equivalent, so
/// last-writer-wins is safe. No negative caching.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, fp: &Fingerprint) -> Result<Option<Report>>;

    async fn put(&self, fp: &Fingerprint, report: &Report) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory cache (no TTL; tests control lifetime explicitly).
    #[derive(Default)]
    pub struct InMemoryCache {
        entries: Mutex<HashMap<String, Report>>,
    }

    impl InMemoryCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl ResultCache for InMemoryCache {
        async fn get(&self, fp: &Fingerprint) -> Result<Option<Report>> {
            Ok(self.entries.lock().unwrap().get(fp.as_str()).cloned())
        }

        async fn put(&self, fp: &Fingerprint, report: &Report) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(fp.as_str().to_string(), report.clone());
            Ok(())
        }
    }

    /// Cache whose backend is down; every call errors. Exercises the
    /// degraded-cache paths (get treated as miss, put logged and dropped).
    pub struct BrokenCache;

    #[async_trait]
    impl ResultCache for BrokenCache {
        async fn get(&self, _fp: &Fingerprint) -> Result<Option<Report>> {
            Err(AppError::Database("cache backend unavailable".to_string()))
        }

        async fn put(&self, _fp: &Fingerprint, _report: &Report) -> Result<()> {
            Err(AppError::Database("cache backend unavailable".to_string()))
        }
    }
}
