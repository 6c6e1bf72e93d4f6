//! Retry with exponential backoff for idempotent Drive reads.
//!
//! Copies are passed through untouched: repeating a duplicate request after
//! an ambiguous failure could leave two copies behind.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::models::{FilePage, RawFile};
use crate::transport::{DriveApi, ListQuery};

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Doubling delay for the given zero-based attempt, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay_ms
            .saturating_mul(1u64 << attempt.min(31));
        Duration::from_millis(base.min(self.max_delay_ms))
    }
}

pub struct RetryingDriveApi<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: DriveApi> RetryingDriveApi<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn retry<T>(&self, what: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay(attempt);
                    warn!(what, attempt, ?delay, error = %err, "retrying");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<A: DriveApi> DriveApi for RetryingDriveApi<A> {
    fn list_page(
        &self,
        query: &ListQuery,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FilePage> {
        self.retry("list", || self.inner.list_page(query, page_size, page_token))
    }

    fn copy_file(&self, file_id: &str, name: &str, dest_folder_id: &str) -> Result<String> {
        self.inner.copy_file(file_id, name, dest_folder_id)
    }

    fn file_metadata(&self, file_id: &str) -> Result<RawFile> {
        self.retry("metadata", || self.inner.file_metadata(file_id))
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        self.retry("download", || self.inner.download(file_id))
    }
}
