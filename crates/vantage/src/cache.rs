//! Single-writer snapshot cache.
//!
//! Readers always get the last complete snapshot. At most one refresh runs
//! at a time; a second caller gets [`VantageError::RefreshInProgress`]
//! instead of waiting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};
use vantage_traits::{Result, VantageError};

/// Observable state of a [`SnapshotCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// A snapshot is available to readers.
    pub ready: bool,
    /// A refresh is running.
    pub refreshing: bool,
    /// When the current snapshot was installed.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Error of the last failed refresh, cleared by a successful one.
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct Snapshot<T> {
    value: Arc<T>,
    refreshed_at: DateTime<Utc>,
}

/// Holds the latest snapshot of `T`, swapped atomically on refresh.
#[derive(Debug)]
pub struct SnapshotCache<T> {
    current: RwLock<Option<Snapshot<T>>>,
    last_error: RwLock<Option<String>>,
    refreshing: AtomicBool,
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the in-flight flag, also when the loader panics.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T> SnapshotCache<T> {
    /// An empty cache.
    pub const fn new() -> Self {
        Self {
            current: RwLock::new(None),
            last_error: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Current state.
    pub fn status(&self) -> CacheStatus {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        CacheStatus {
            ready: current.is_some(),
            refreshing: self.refreshing.load(Ordering::Acquire),
            refreshed_at: current.as_ref().map(|s| s.refreshed_at),
            last_error: self
                .last_error
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// The last complete snapshot.
    pub fn read(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| Arc::clone(&s.value))
    }

    /// Build a new snapshot with `loader` and install it.
    ///
    /// Readers keep seeing the previous snapshot until the loader succeeds.
    /// A failed load leaves the previous snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::RefreshInProgress`] if another refresh is
    /// running, or the loader's error.
    pub fn refresh(&self, loader: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(VantageError::RefreshInProgress);
        }
        let _guard = RefreshGuard(&self.refreshing);

        match loader() {
            Ok(value) => {
                let value = Arc::new(value);
                let snapshot = Snapshot {
                    value: Arc::clone(&value),
                    refreshed_at: Utc::now(),
                };
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
                *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = None;
                info!("snapshot refreshed");
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "snapshot refresh failed, keeping previous snapshot");
                *self.last_error.write().unwrap_or_else(PoisonError::into_inner) = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// The current snapshot, loading one first if the cache is empty.
    pub fn read_or_refresh(&self, loader: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
        match self.read() {
            Some(value) => Ok(value),
            None => self.refresh(loader),
        }
    }

    /// Drop the current snapshot.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
