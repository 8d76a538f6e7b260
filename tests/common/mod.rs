//! Shared test fixtures for the card generation SDK integration tests.
//!
//! Provides a counting card generator, temp image files and helpers that
//! wait for the background worker.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cardgen_sdk::image::ImageData;
use cardgen_sdk::models::{CardData, Rarity};
use cardgen_sdk::{CardGenError, CardGenSdk, CardGenerator, GenerationEvent, Result};
use tokio::sync::broadcast;

/// Generator that returns a fixed card and counts its calls.
///
/// Images whose bytes start with `FAIL` produce an API error.
pub struct CountingGenerator {
    calls: AtomicUsize,
}

impl CountingGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CardGenerator for CountingGenerator {
    fn generate(&self, image: &ImageData) -> Result<CardData> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if image.bytes.starts_with(b"FAIL") {
            return Err(CardGenError::Api {
                status: 500,
                body: "model unavailable".into(),
            });
        }
        Ok(sample_card(&format!("Card {}", n), Rarity::R))
    }
}

/// Generator whose first `failures` calls return an API error.
pub struct FlakyGenerator {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CardGenerator for FlakyGenerator {
    fn generate(&self, _image: &ImageData) -> Result<CardData> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            return Err(CardGenError::Api {
                status: 503,
                body: "try again later".into(),
            });
        }
        Ok(sample_card(&format!("Card {}", n), Rarity::SR))
    }
}

/// In-memory SDK driven by `generator`.
pub fn sdk_with(generator: Arc<dyn CardGenerator>) -> CardGenSdk {
    CardGenSdk::builder()
        .in_memory(true)
        .generator(generator)
        .build()
        .unwrap()
}

pub fn sample_card(name: &str, rarity: Rarity) -> CardData {
    CardData {
        rarity,
        name: name.to_string(),
        description: "Draw two cards.".to_string(),
        atk: "1200".to_string(),
        def: "800".to_string(),
    }
}

/// Write `bytes` to `dir/name` and return the path as a locator string.
pub fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> String {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

/// In-memory SDK driven by a [`CountingGenerator`].
///
/// Returns `(sdk, generator, TempDir)`. Keep the `TempDir` alive for images
/// written with [`write_image`].
pub fn setup_sdk() -> (CardGenSdk, Arc<CountingGenerator>, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let generator = CountingGenerator::new();
    let sdk = CardGenSdk::builder()
        .in_memory(true)
        .generator(generator.clone())
        .build()
        .unwrap();
    (sdk, generator, tmp_dir)
}

/// Collect worker events until the queue drains.
pub fn wait_for_drain(rx: &mut broadcast::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
    let mut events = Vec::new();
    loop {
        let event = rx.blocking_recv().unwrap();
        let done = event == GenerationEvent::QueueDrained;
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Poll `cond` until it holds, panicking after five seconds.
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(10));
    }
}
