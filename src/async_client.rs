//! Async wrapper around [`CardGenSdk`] for use in async runtimes (Tokio, etc.).
//!
//! Runs all SDK operations on a blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free. Model
//! calls and image downloads use a blocking HTTP client, so they must never
//! run on the event loop itself.
//!
//! # Example
//!
//! ```no_run
//! use cardgen_sdk::AsyncCardGenSdk;
//!
//! #[tokio::main]
//! async fn main() {
//!     let sdk = AsyncCardGenSdk::builder().offline(true).build().await.unwrap();
//!
//!     let drawn = sdk.draw("photos/cat.jpg").await.unwrap();
//!
//!     // Run any sync SDK method via closure
//!     let total = sdk.run(|s| s.library().count()).await.unwrap();
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Settings;
use crate::error::{CardGenError, Result};
use crate::generator::CardGenerator;
use crate::models::{DrawResult, Pack};
use crate::queries::packs::OpenedPack;
use crate::worker::GenerationEvent;
use crate::CardGenSdk;

// ---------------------------------------------------------------------------
// AsyncCardGenSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`AsyncCardGenSdk`] instance.
#[derive(Default)]
pub struct AsyncCardGenSdkBuilder {
    data_dir: Option<PathBuf>,
    in_memory: bool,
    settings: Option<Settings>,
    offline: bool,
    timeout: Option<Duration>,
    generator: Option<Arc<dyn CardGenerator>>,
}

impl AsyncCardGenSdkBuilder {
    /// Set a custom data directory.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep the card store in memory instead of on disk.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Generate cards locally instead of calling the API.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Set the HTTP request timeout for API calls and image downloads.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn CardGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the async SDK, opening the store and starting the worker.
    ///
    /// Initialization runs on the blocking thread pool so it won't block
    /// the async event loop.
    pub async fn build(self) -> Result<AsyncCardGenSdk> {
        tokio::task::spawn_blocking(move || {
            let mut builder = CardGenSdk::builder()
                .in_memory(self.in_memory)
                .offline(self.offline);
            if let Some(dir) = self.data_dir {
                builder = builder.data_dir(dir);
            }
            if let Some(settings) = self.settings {
                builder = builder.settings(settings);
            }
            if let Some(timeout) = self.timeout {
                builder = builder.timeout(timeout);
            }
            if let Some(generator) = self.generator {
                builder = builder.generator(generator);
            }
            let sdk = builder.build()?;
            Ok(AsyncCardGenSdk {
                inner: Arc::new(Mutex::new(sdk)),
            })
        })
        .await
        .map_err(|e| CardGenError::InvalidState(format!("Task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// AsyncCardGenSdk
// ---------------------------------------------------------------------------

/// Async wrapper around [`CardGenSdk`].
///
/// All operations are dispatched to a blocking thread pool via
/// [`tokio::task::spawn_blocking`]. The underlying [`CardGenSdk`] is
/// protected by a [`Mutex`] since its DuckDB handle is not `Sync`.
#[derive(Clone)]
pub struct AsyncCardGenSdk {
    inner: Arc<Mutex<CardGenSdk>>,
}

impl AsyncCardGenSdk {
    /// Create a new builder for configuring the async SDK.
    pub fn builder() -> AsyncCardGenSdkBuilder {
        AsyncCardGenSdkBuilder::default()
    }

    /// Run a sync SDK operation on the blocking thread pool.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use cardgen_sdk::AsyncCardGenSdk;
    /// # async fn example() -> cardgen_sdk::Result<()> {
    /// # let sdk = AsyncCardGenSdk::builder().build().await?;
    /// let packs = sdk.run(|s| s.packs().list()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&CardGenSdk) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sdk = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = sdk
                .lock()
                .map_err(|_| CardGenError::InvalidState("SDK lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CardGenError::InvalidState(format!("Task join error: {e}")))?
    }

    /// Draw one card asynchronously.
    pub async fn draw(&self, locator: &str) -> Result<DrawResult> {
        let locator = locator.to_string();
        self.run(move |s| s.draw(&locator)).await
    }

    /// Create a pack asynchronously. See [`CardGenSdk::create_pack`].
    pub async fn create_pack(&self, locators: Vec<String>) -> Result<Pack> {
        self.run(move |s| s.create_pack(&locators)).await
    }

    /// Open a pack asynchronously. See [`CardGenSdk::open_pack`].
    pub async fn open_pack(&self, id: &str) -> Result<OpenedPack> {
        let id = id.to_string();
        self.run(move |s| s.open_pack(&id)).await
    }

    /// Re-queue a pack's uncached images. See [`CardGenSdk::retry_pack`].
    pub async fn retry_pack(&self, id: &str) -> Result<usize> {
        let id = id.to_string();
        self.run(move |s| s.retry_pack(&id)).await
    }

    /// Receive worker notifications; use `recv().await` on the receiver.
    pub async fn subscribe(&self) -> Result<broadcast::Receiver<GenerationEvent>> {
        self.run(|s| Ok(s.subscribe())).await
    }

    pub async fn pending(&self) -> Result<usize> {
        self.run(|s| Ok(s.pending())).await
    }

    /// Close the SDK, waiting for queued generation work to finish.
    ///
    /// Other clones keep the SDK alive; it is closed when the last one goes.
    pub async fn close(self) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            if let Ok(mutex) = Arc::try_unwrap(self.inner) {
                let sdk = mutex
                    .into_inner()
                    .map_err(|_| CardGenError::InvalidState("SDK lock poisoned".into()))?;
                sdk.close();
            }
            Ok(())
        })
        .await
        .map_err(|e| CardGenError::InvalidState(format!("Task join error: {e}")))?
    }
}
