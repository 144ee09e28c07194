//! Cache Envelope Module
//!
//! Wraps any [`Backend`] with sliding TTL expiry, type/id coercion and uniform
//! logging. Storage itself is always delegated to the backend.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use super::callback::spawn_with_handler;
use super::registry::{TimeoutRegistry, Timer};
use super::Payload;
use crate::backend::{AnyBackend, Backend};
use crate::config::{BackendKind, CacheConfig, DEFAULT_LOGGER};
use crate::error::Result;
use crate::tasks::{duration_millis, spawn_expiry_timer};

// == Cache ==
/// A named cache instance over backend `B`.
///
/// Cloning is cheap and every clone shares the same backend and timers. When
/// TTL is enabled, `store` and `fetch` restart the expiry of an entry and
/// `remove`/`clear` cancel it. Dropping the last clone cancels all pending
/// expiries.
pub struct Cache<B: Backend> {
    inner: Arc<Inner<B>>,
}

struct Inner<B> {
    name: String,
    logger: String,
    /// In-process TTL, `None` when disabled or handled by the backend
    ttl: Option<Duration>,
    backend: B,
    timeouts: Mutex<TimeoutRegistry>,
}

impl<B> Drop for Inner<B> {
    fn drop(&mut self) {
        self.timeouts.get_mut().cancel_all();
    }
}

impl<B: Backend> Clone for Cache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("type", &self.inner.backend.kind())
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

impl Cache<AnyBackend> {
    /// Builds an instance with the backend selected by `config.type`.
    ///
    /// Unknown backend types fail here with a configuration error.
    pub fn open(name: impl Into<String>, config: &CacheConfig) -> Result<Self> {
        let backend = AnyBackend::from_config(config)?;
        Ok(Self::from_config(name, config, backend))
    }
}

impl<B: Backend> Cache<B> {
    // == Constructors ==
    /// Creates a cache named `name` over `backend`.
    ///
    /// A zero `ttl` disables expiry, as does a backend that expires entries
    /// natively.
    pub fn new(name: impl Into<String>, backend: B, ttl: Option<Duration>) -> Self {
        Self::build(name.into(), DEFAULT_LOGGER.to_string(), backend, ttl)
    }

    /// Creates a cache using the `ttl` (seconds) and `logger` options of `config`.
    pub fn from_config(name: impl Into<String>, config: &CacheConfig, backend: B) -> Self {
        let ttl = Some(Duration::from_secs(config.ttl_seconds()));
        Self::build(name.into(), config.logger().to_string(), backend, ttl)
    }

    fn build(name: String, logger: String, backend: B, ttl: Option<Duration>) -> Self {
        let ttl = ttl.filter(|ttl| !ttl.is_zero() && !backend.native_ttl());
        info!(
            cache = %name,
            logger = %logger,
            kind = %backend.kind(),
            ttl_ms = ttl.map(duration_millis),
            native_ttl = backend.native_ttl(),
            "Cache instance created"
        );

        Self {
            inner: Arc::new(Inner {
                name,
                logger,
                ttl,
                backend,
                timeouts: Mutex::new(TimeoutRegistry::new()),
            }),
        }
    }

    // == Accessors ==
    /// The instance name given at construction.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The backend kind this instance stores into.
    pub fn kind(&self) -> BackendKind {
        self.inner.backend.kind()
    }

    /// The in-process TTL, `None` when this envelope runs no timers.
    pub fn ttl(&self) -> Option<Duration> {
        self.inner.ttl
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Number of entries with a pending expiry timer.
    pub async fn pending_expiries(&self) -> usize {
        self.inner.timeouts.lock().await.len()
    }

    /// True if `(type_, id)` has a pending expiry timer.
    pub async fn has_pending_expiry(&self, type_: impl Display, id: impl Display) -> bool {
        self.inner
            .timeouts
            .lock()
            .await
            .contains(&type_.to_string(), &id.to_string())
    }

    // == Store ==
    /// Stores `payload` under `(type_, id)` and returns it.
    ///
    /// Restarts the entry's TTL. If the backend write fails, an entry that
    /// already had a timer gets a fresh one so it still expires.
    pub async fn store(
        &self,
        type_: impl Display,
        id: impl Display,
        payload: Payload,
    ) -> Result<Payload> {
        let (type_, id) = (type_.to_string(), id.to_string());
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, id = %id, "store");

        let Some(ttl) = self.inner.ttl else {
            return self
                .inner
                .backend
                .store(&type_, &id, payload)
                .await
                .inspect_err(|err| self.log_failure("store", &type_, err));
        };

        let had_timer = self.cancel_before_write(&type_, &id).await;
        let result = self.inner.backend.store(&type_, &id, payload).await;
        if result.is_ok() || had_timer {
            let mut timeouts = self.inner.timeouts.lock().await;
            self.arm(&mut timeouts, &type_, &id, ttl);
        }
        result.inspect_err(|err| self.log_failure("store", &type_, err))
    }

    // == Fetch ==
    /// Returns the payload stored under `(type_, id)`, `None` if there is none.
    ///
    /// A hit restarts the entry's TTL, but only when this instance already
    /// tracks timers for `type_`. Entries written by another process, or before
    /// a restart, are left to expire however they were scheduled. A miss never
    /// creates a timer.
    pub async fn fetch(&self, type_: impl Display, id: impl Display) -> Result<Option<Payload>> {
        let (type_, id) = (type_.to_string(), id.to_string());
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, id = %id, "fetch");

        let found = self
            .inner
            .backend
            .fetch(&type_, &id)
            .await
            .inspect_err(|err| self.log_failure("fetch", &type_, err))?;

        if let (Some(_), Some(ttl)) = (&found, self.inner.ttl) {
            let mut timeouts = self.inner.timeouts.lock().await;
            if timeouts.has_type(&type_) {
                self.arm(&mut timeouts, &type_, &id, ttl);
            }
        }
        Ok(found)
    }

    // == List ==
    /// Returns every payload stored under `type_`, in no particular order.
    ///
    /// Does not touch TTLs.
    pub async fn list(&self, type_: impl Display) -> Result<Vec<Payload>> {
        let type_ = type_.to_string();
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, "list");

        self.inner
            .backend
            .list(&type_)
            .await
            .inspect_err(|err| self.log_failure("list", &type_, err))
    }

    // == Map ==
    /// Returns the `id -> payload` associations stored under `type_`.
    ///
    /// Does not touch TTLs.
    pub async fn map(&self, type_: impl Display) -> Result<HashMap<String, Payload>> {
        let type_ = type_.to_string();
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, "map");

        self.inner
            .backend
            .map(&type_)
            .await
            .inspect_err(|err| self.log_failure("map", &type_, err))
    }

    // == Remove ==
    /// Deletes `(type_, id)` and returns its previous payload, if any.
    ///
    /// The entry's timer is cancelled before the backend delete runs.
    pub async fn remove(&self, type_: impl Display, id: impl Display) -> Result<Option<Payload>> {
        let (type_, id) = (type_.to_string(), id.to_string());
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, id = %id, "remove");

        if self.inner.ttl.is_some() {
            self.inner.timeouts.lock().await.cancel(&type_, &id);
        }
        self.inner
            .backend
            .remove(&type_, &id)
            .await
            .inspect_err(|err| self.log_failure("remove", &type_, err))
    }

    // == Clear ==
    /// Deletes every entry under `type_` and cancels their timers.
    ///
    /// Clearing an empty or unknown type succeeds.
    pub async fn clear(&self, type_: impl Display) -> Result<()> {
        let type_ = type_.to_string();
        trace!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, "clear");

        if self.inner.ttl.is_some() {
            let cancelled = self.inner.timeouts.lock().await.cancel_type(&type_);
            debug!(cache = %self.inner.name, entry_type = %type_, cancelled, "Cancelled expiry timers");
        }
        self.inner
            .backend
            .clear(&type_)
            .await
            .inspect_err(|err| self.log_failure("clear", &type_, err))
    }

    // == Completion Handler Variants ==
    /// [`Cache::store`] delivering its result to `handler`.
    pub fn store_with<F>(
        &self,
        type_: impl Display,
        id: impl Display,
        payload: Payload,
        handler: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        let cache = self.clone();
        let (type_, id) = (type_.to_string(), id.to_string());
        spawn_with_handler(async move { cache.store(type_, id, payload).await }, handler)
    }

    /// [`Cache::fetch`] delivering its result to `handler`.
    pub fn fetch_with<F>(&self, type_: impl Display, id: impl Display, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Option<Payload>>) + Send + 'static,
    {
        let cache = self.clone();
        let (type_, id) = (type_.to_string(), id.to_string());
        spawn_with_handler(async move { cache.fetch(type_, id).await }, handler)
    }

    /// [`Cache::list`] delivering its result to `handler`.
    pub fn list_with<F>(&self, type_: impl Display, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Vec<Payload>>) + Send + 'static,
    {
        let cache = self.clone();
        let type_ = type_.to_string();
        spawn_with_handler(async move { cache.list(type_).await }, handler)
    }

    /// [`Cache::map`] delivering its result to `handler`.
    pub fn map_with<F>(&self, type_: impl Display, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<HashMap<String, Payload>>) + Send + 'static,
    {
        let cache = self.clone();
        let type_ = type_.to_string();
        spawn_with_handler(async move { cache.map(type_).await }, handler)
    }

    /// [`Cache::remove`] delivering its result to `handler`.
    pub fn remove_with<F>(&self, type_: impl Display, id: impl Display, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Option<Payload>>) + Send + 'static,
    {
        let cache = self.clone();
        let (type_, id) = (type_.to_string(), id.to_string());
        spawn_with_handler(async move { cache.remove(type_, id).await }, handler)
    }

    /// [`Cache::clear`] delivering its result to `handler`.
    pub fn clear_with<F>(&self, type_: impl Display, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let cache = self.clone();
        let type_ = type_.to_string();
        spawn_with_handler(async move { cache.clear(type_).await }, handler)
    }

    // == Expiry ==
    /// Schedules expiry of `(type_, id)`, replacing any pending timer.
    fn arm(&self, timeouts: &mut TimeoutRegistry, type_: &str, id: &str, ttl: Duration) {
        let generation = timeouts.next_generation();
        let weak = Arc::downgrade(&self.inner);
        let (timer_type, timer_id) = (type_.to_string(), id.to_string());

        let handle = spawn_expiry_timer(ttl, move || async move {
            if let Some(inner) = weak.upgrade() {
                Cache { inner }.expire(timer_type, timer_id, generation).await;
            }
        });
        timeouts.insert(type_, id, Timer::new(generation, handle.abort_handle()));
        debug!(cache = %self.inner.name, entry_type = %type_, id = %id, generation, "Armed expiry timer");
    }

    /// Deletes an entry whose timer fired.
    ///
    /// The registry is released before the backend delete runs; only a store
    /// of this same entry waits for it, through the expiry gate. Failures are
    /// logged, never returned: nobody awaits a timer.
    async fn expire(&self, type_: String, id: String, generation: u64) {
        let held = {
            let mut timeouts = self.inner.timeouts.lock().await;
            timeouts.begin_expiry(&type_, &id, generation)
        };
        let Some(held) = held else {
            return;
        };

        debug!(cache = %self.inner.name, logger = %self.inner.logger, entry_type = %type_, id = %id, "TTL expired, removing entry");
        if let Err(err) = self.inner.backend.remove(&type_, &id).await {
            error!(
                cache = %self.inner.name,
                logger = %self.inner.logger,
                entry_type = %type_,
                id = %id,
                error = %err,
                "Failed to remove expired entry"
            );
        }

        self.inner
            .timeouts
            .lock()
            .await
            .finish_expiry(&type_, &id, &held);
    }

    /// Cancels the timer of `(type_, id)` ahead of a write.
    ///
    /// Waits out an expiry that is still deleting the entry, so the delete
    /// cannot land after the write. Returns true if a timer was pending.
    async fn cancel_before_write(&self, type_: &str, id: &str) -> bool {
        loop {
            let gate = {
                let mut timeouts = self.inner.timeouts.lock().await;
                match timeouts.expiry_in_flight(type_, id) {
                    Some(gate) => gate,
                    None => return timeouts.cancel(type_, id),
                }
            };
            debug!(cache = %self.inner.name, entry_type = %type_, id = %id, "Waiting for in-flight expiry");
            drop(gate.lock().await);
        }
    }

    fn log_failure(&self, operation: &str, type_: &str, err: &crate::error::CacheError) {
        error!(
            cache = %self.inner.name,
            logger = %self.inner.logger,
            entry_type = %type_,
            operation,
            error = %err,
            "Cache operation failed"
        );
    }
}
