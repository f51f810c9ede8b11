//! Lazily populated value with explicit invalidation

use std::future::Future;

/// A value fetched on first use and kept until invalidated.
///
/// Mutating API calls invalidate the caches they affect, so a read after a
/// write always goes back to the API.
#[derive(Debug)]
pub struct Cached<T> {
    value: Option<T>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> Cached<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, fetching it first if needed.
    ///
    /// A failed fetch leaves the cache empty.
    pub async fn get_or_try_fetch<F, Fut, E>(&mut self, fetch: F) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let value = match self.value.take() {
            Some(value) => value,
            None => fetch().await?,
        };
        Ok(self.value.insert(value))
    }

    /// Drop the cached value so the next read fetches again
    pub fn invalidate(&mut self) {
        self.value = None;
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }
}
