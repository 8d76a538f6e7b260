//! Card generation SDK for Rust.
//!
//! Turns photos into AI-generated trading cards. Each distinct image (by
//! content hash) is sent to a vision-language model at most once; the result
//! is cached in a local DuckDB store together with packs of pending images
//! and the user's card library. Packs are filled in the background by a
//! single generation worker thread.
//!
//! # Quick start
//!
//! ```no_run
//! use cardgen_sdk::CardGenSdk;
//!
//! let sdk = CardGenSdk::builder().build().unwrap();
//!
//! // Draw one card right away
//! let drawn = sdk.draw("photos/cat.jpg").unwrap();
//! println!("{} [{}]", drawn.card.name, drawn.card.rarity);
//!
//! // Or queue a pack and open it once the worker has filled it
//! let pack = sdk.create_pack(&["photos/a.jpg", "photos/b.jpg"]).unwrap();
//! let opened = sdk.open_pack(&pack.id);
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod config;
pub mod connection;
pub mod error;
pub mod generator;
pub mod hash;
pub mod image;
pub mod models;
pub mod queries;
pub mod sql_builder;
pub mod worker;

#[cfg(feature = "async")]
pub use async_client::AsyncCardGenSdk;
pub use config::{PromptMode, Settings};
pub use connection::Connection;
pub use error::{CardGenError, Result};
pub use generator::{CardGenerator, StubGenerator, VlmClient};
pub use queries::packs::OpenedPack;
pub use sql_builder::SqlBuilder;
pub use worker::{GenerationEvent, GenerationTask, GenerationWorker};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::image::ImageLoader;
use crate::models::{DrawResult, Pack, PackItem, PackStatus};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CardGenSdkBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`CardGenSdk`] instance.
///
/// Use [`CardGenSdk::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](CardGenSdkBuilder::build) to create the SDK.
pub struct CardGenSdkBuilder {
    data_dir: Option<PathBuf>,
    in_memory: bool,
    settings: Option<Settings>,
    offline: bool,
    timeout: Duration,
    generator: Option<Arc<dyn CardGenerator>>,
}

impl Default for CardGenSdkBuilder {
    fn default() -> Self {
        Self {
            data_dir: None,
            in_memory: false,
            settings: None,
            offline: false,
            timeout: Duration::from_secs(120),
            generator: None,
        }
    }
}

impl CardGenSdkBuilder {
    /// Set a custom data directory.
    ///
    /// If not set, the platform-appropriate data directory is used
    /// (e.g. `~/.local/share/cardgen-sdk` on Linux).
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep the card store in memory instead of on disk.
    ///
    /// Nothing survives the SDK; settings are not read from disk either.
    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    /// Use these settings instead of `settings.json` plus environment overrides.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Generate cards locally with [`StubGenerator`] instead of calling the API.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Set the HTTP request timeout for API calls and image downloads.
    ///
    /// Defaults to 120 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom card generator. Takes precedence over `offline`.
    pub fn generator(mut self, generator: Arc<dyn CardGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the SDK: open the store, start the worker and resume any packs
    /// left in `processing` by a previous run.
    pub fn build(self) -> Result<CardGenSdk> {
        let data_dir = self.data_dir.unwrap_or_else(config::default_data_dir);

        let settings = match self.settings {
            Some(settings) => settings,
            None if self.in_memory => Settings::default().with_env_overrides(),
            None => Settings::load(&data_dir.join(config::SETTINGS_FILE))?.with_env_overrides(),
        };

        let conn = if self.in_memory {
            Connection::open_in_memory()?
        } else {
            Connection::open(&data_dir.join(config::DATABASE_FILE))?
        };

        let generator: Arc<dyn CardGenerator> = match self.generator {
            Some(generator) => generator,
            None if self.offline => Arc::new(StubGenerator::new()),
            None => Arc::new(VlmClient::new(settings.clone(), self.timeout)),
        };

        let worker = GenerationWorker::start(
            conn.try_clone()?,
            Arc::clone(&generator),
            ImageLoader::new(self.timeout),
        )?;

        let sdk = CardGenSdk {
            conn,
            worker,
            generator,
            loader: ImageLoader::new(self.timeout),
            settings,
            data_dir: (!self.in_memory).then_some(data_dir),
            offline: self.offline,
        };
        sdk.resume()?;
        Ok(sdk)
    }
}

// ---------------------------------------------------------------------------
// CardGenSdk
// ---------------------------------------------------------------------------

/// The main entry point for the card generation SDK.
///
/// Owns the DuckDB [`Connection`], the [`GenerationWorker`] and the card
/// generator, and exposes the card cache, pack store and library as
/// lightweight borrowing query wrappers.
///
/// Created via [`CardGenSdk::builder()`].
pub struct CardGenSdk {
    conn: Connection,
    worker: GenerationWorker,
    generator: Arc<dyn CardGenerator>,
    loader: ImageLoader,
    settings: Settings,
    data_dir: Option<PathBuf>,
    offline: bool,
}

impl CardGenSdk {
    /// Create a new builder for configuring the SDK.
    pub fn builder() -> CardGenSdkBuilder {
        CardGenSdkBuilder::default()
    }

    // -- Query accessors ---------------------------------------------------

    /// Access the card cache.
    pub fn cards(&self) -> queries::cards::CardQuery<'_> {
        queries::cards::CardQuery::new(&self.conn)
    }

    /// Access the pack store.
    pub fn packs(&self) -> queries::packs::PackQuery<'_> {
        queries::packs::PackQuery::new(&self.conn)
    }

    /// Access the card library (draw history).
    pub fn library(&self) -> queries::library::LibraryQuery<'_> {
        queries::library::LibraryQuery::new(&self.conn)
    }

    // -- Drawing -----------------------------------------------------------

    /// Draw one card for the image at `locator`, generating it on a cache
    /// miss, and record it in the library.
    ///
    /// Runs on the calling thread.
    pub fn draw(&self, locator: &str) -> Result<DrawResult> {
        let image = self.loader.load(locator)?;
        let hash = hash::content_hash(&image.bytes);
        let cards = self.cards();

        let (card, cached) = match cards.get(&hash)? {
            Some(card) => {
                log::debug!("Cache hit for {}", hash);
                (card, true)
            }
            None => {
                log::info!("Cache miss for {}, generating", hash);
                let card = self.generator.generate(&image)?;
                cards.insert(&hash, &card)?;
                if let Err(e) = self.promote_packs(&hash) {
                    log::warn!("Readiness check for {} failed: {}", hash, e);
                }
                (cards.get(&hash)?.unwrap_or(card), false)
            }
        };

        self.library().add(&hash, &card, locator)?;
        Ok(DrawResult {
            locator: locator.to_string(),
            hash,
            card,
            cached,
        })
    }

    /// Draw each image in order. A failed draw does not stop the rest.
    pub fn draw_batch<S: AsRef<str>>(&self, locators: &[S]) -> Vec<Result<DrawResult>> {
        locators.iter().map(|l| self.draw(l.as_ref())).collect()
    }

    /// Draw `count` random images from the configured random-image endpoint.
    ///
    /// Defaults to [`config::DEFAULT_GOD_DRAW_COUNT`] images.
    pub fn god_draw(&self, count: Option<usize>) -> Vec<Result<DrawResult>> {
        let count = count.unwrap_or(config::DEFAULT_GOD_DRAW_COUNT);
        let endpoint = &self.settings.god_draw_url;
        (0..count)
            .map(|_| {
                let url = self.loader.random_image_url(endpoint)?;
                self.draw(&url)
            })
            .collect()
    }

    // -- Packs -------------------------------------------------------------

    /// Create a pack from the given images and queue every uncached one.
    ///
    /// The returned pack is already `ready` when every image was cached;
    /// otherwise the worker publishes [`GenerationEvent::PackReady`] once it
    /// has filled the pack.
    pub fn create_pack<S: AsRef<str>>(&self, locators: &[S]) -> Result<Pack> {
        if locators.is_empty() {
            return Err(CardGenError::InvalidArgument(
                "A pack needs at least one image".into(),
            ));
        }

        let mut items = Vec::with_capacity(locators.len());
        for locator in locators {
            let locator = locator.as_ref();
            let hash = if image::is_remote(locator) {
                hash::content_hash(&self.loader.load(locator)?.bytes)
            } else {
                hash::file_hash(Path::new(locator))?
            };
            items.push(PackItem {
                locator: locator.to_string(),
                hash,
            });
        }

        let mut pack = self.packs().create(items)?;
        // With work queued, the worker promotes the pack and announces it.
        if self.enqueue_missing(&pack)? == 0 {
            pack.status = self.packs().check_readiness(&pack.id)?;
        }
        Ok(pack)
    }

    /// Open a `ready` pack, or view an opened one again.
    ///
    /// The first open also adds every card to the library.
    pub fn open_pack(&self, id: &str) -> Result<OpenedPack> {
        let opened = self.packs().open(id)?;
        if opened.first_open {
            let library = self.library();
            for (item, card) in &opened.cards {
                library.add(&item.hash, card, &item.locator)?;
            }
        }
        Ok(opened)
    }

    /// Queue the uncached images of a `processing` pack again, for example
    /// after a [`GenerationEvent::CardFailed`]. Returns the number of tasks
    /// queued.
    ///
    /// A pack whose cards are all cached by now is promoted on the spot and
    /// announced with [`GenerationEvent::PackReady`].
    pub fn retry_pack(&self, id: &str) -> Result<usize> {
        let pack = self
            .packs()
            .get(id)?
            .ok_or_else(|| CardGenError::NotFound(format!("Pack {}", id)))?;
        if pack.status != PackStatus::Processing {
            return Ok(0);
        }
        let queued = self.enqueue_missing(&pack)?;
        if queued == 0 && self.packs().check_readiness(id)? == PackStatus::Ready {
            self.worker.publish(GenerationEvent::PackReady {
                pack_id: id.to_string(),
            });
        }
        Ok(queued)
    }

    // -- Worker ------------------------------------------------------------

    /// Receive worker notifications published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.worker.subscribe()
    }

    /// Generation tasks queued or in progress.
    pub fn pending(&self) -> usize {
        self.worker.pending()
    }

    /// Queue a single generation task directly.
    pub fn enqueue(&self, task: GenerationTask) -> Result<()> {
        self.worker.enqueue(task)
    }

    // -- Settings and utility methods --------------------------------------

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Write the current settings to `settings.json` in the data directory.
    ///
    /// Does nothing for an in-memory SDK.
    pub fn save_settings(&self) -> Result<()> {
        match &self.data_dir {
            Some(dir) => self.settings.save(&dir.join(config::SETTINGS_FILE)),
            None => Ok(()),
        }
    }

    /// The data directory, or `None` for an in-memory store.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Finish queued work, stop the worker and release the store.
    ///
    /// Dropping the SDK does the same; this makes the wait explicit.
    pub fn close(mut self) {
        self.worker.shutdown();
    }

    /// Return a reference to the underlying [`Connection`] for advanced usage.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -- Private helpers ---------------------------------------------------

    /// Queue the pack's uncached hashes, once each.
    fn enqueue_missing(&self, pack: &Pack) -> Result<usize> {
        let hashes: Vec<&str> = pack.hashes().collect();
        let mut missing = self.cards().missing(&hashes)?;
        let mut tasks = Vec::with_capacity(missing.len());
        for item in &pack.items {
            if let Some(pos) = missing.iter().position(|h| *h == item.hash) {
                missing.swap_remove(pos);
                tasks.push(
                    GenerationTask::new(&item.locator, &item.hash).with_request_id(&pack.id),
                );
            }
        }
        let queued = tasks.len();
        self.worker.enqueue_all(tasks)?;
        Ok(queued)
    }

    /// Promote `processing` packs that `hash` completed and announce them.
    fn promote_packs(&self, hash: &str) -> Result<()> {
        let packs = self.packs();
        for pack_id in packs.packs_containing(hash)? {
            if packs.check_readiness(&pack_id)? == PackStatus::Ready {
                self.worker.publish(GenerationEvent::PackReady { pack_id });
            }
        }
        Ok(())
    }

    /// Pick up packs a previous run left in `processing`.
    fn resume(&self) -> Result<()> {
        let packs = self.packs();
        for pack in packs.list_by_status(PackStatus::Processing)? {
            packs.check_readiness(&pack.id)?;
        }

        let pending = packs.pending_items()?;
        if !pending.is_empty() {
            log::info!("Resuming {} pending generation tasks", pending.len());
        }
        self.worker.enqueue_all(
            pending
                .into_iter()
                .map(|item| GenerationTask::new(item.locator, item.hash))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for CardGenSdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = match &self.data_dir {
            Some(dir) => dir.display().to_string(),
            None => ":memory:".to_string(),
        };
        write!(
            f,
            "CardGenSdk(data_dir={}, model={}, offline={}, pending={})",
            store,
            self.settings.model,
            self.offline,
            self.worker.pending()
        )
    }
}
