//! Background generation worker.
//!
//! A single dedicated thread drains a FIFO queue of [`GenerationTask`]s one at
//! a time. For each task it consults the card cache, re-hashes the image and
//! calls the generator on a miss, stores the result, and promotes any
//! `processing` pack that the new card completes. Progress is published on a
//! broadcast channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::{broadcast, mpsc};

use crate::connection::Connection;
use crate::error::{CardGenError, Result};
use crate::generator::CardGenerator;
use crate::hash::content_hash;
use crate::image::ImageLoader;
use crate::models::{CardData, PackStatus};
use crate::queries::{CardQuery, PackQuery};

const EVENT_CAPACITY: usize = 256;

/// One image waiting for a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub locator: String,
    pub hash: String,
    /// Caller-chosen tag echoed back in the task's events.
    pub request_id: Option<String>,
}

impl GenerationTask {
    pub fn new(locator: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            hash: hash.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Notifications published by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// A card is available for `hash`. `cached` is `true` when no generation
    /// call was needed.
    CardReady {
        request_id: Option<String>,
        hash: String,
        card: CardData,
        cached: bool,
    },
    /// The task failed; nothing was cached, so enqueueing it again retries.
    CardFailed {
        request_id: Option<String>,
        hash: String,
        error: String,
    },
    /// Every item of the pack now has a card.
    PackReady { pack_id: String },
    /// The queue became empty.
    QueueDrained,
}

// ---------------------------------------------------------------------------
// GenerationWorker
// ---------------------------------------------------------------------------

/// Handle to the worker thread.
///
/// Dropping the handle stops accepting tasks, lets the thread finish what is
/// already queued, and joins it.
pub struct GenerationWorker {
    sender: Option<mpsc::UnboundedSender<GenerationTask>>,
    events: broadcast::Sender<GenerationEvent>,
    pending: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Start the worker thread.
    ///
    /// `conn` should be a dedicated handle (see [`Connection::try_clone`]).
    pub fn start(
        conn: Connection,
        generator: Arc<dyn CardGenerator>,
        loader: ImageLoader,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = WorkerLoop {
            conn,
            generator,
            loader,
            events: events.clone(),
            pending: Arc::clone(&pending),
        };
        let handle = thread::Builder::new()
            .name("cardgen-worker".into())
            .spawn(move || worker.run(receiver))?;

        Ok(Self {
            sender: Some(sender),
            events,
            pending,
            handle: Some(handle),
        })
    }

    /// Append a task to the queue.
    pub fn enqueue(&self, task: GenerationTask) -> Result<()> {
        self.enqueue_all(vec![task])
    }

    /// Append several tasks in order.
    ///
    /// The whole batch counts as pending before the first task is sent, so
    /// `QueueDrained` is not published halfway through it.
    pub fn enqueue_all(&self, tasks: Vec<GenerationTask>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| CardGenError::InvalidState("Generation worker is stopped".into()))?;
        if tasks.is_empty() {
            return Ok(());
        }

        let mut unsent = tasks.len();
        self.pending.fetch_add(unsent, Ordering::SeqCst);
        for task in tasks {
            log::info!("Queued {} ({})", task.hash, task.locator);
            if sender.send(task).is_err() {
                self.pending.fetch_sub(unsent, Ordering::SeqCst);
                return Err(CardGenError::InvalidState(
                    "Generation worker is stopped".into(),
                ));
            }
            unsent -= 1;
        }
        Ok(())
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    /// Tasks queued or in progress.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Publish `event` to subscribers alongside the worker's own events.
    pub(crate) fn publish(&self, event: GenerationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Stop accepting tasks, finish the queued ones and join the thread.
    pub fn shutdown(&mut self) {
        // Closing the channel ends the loop once the queue is empty.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Generation worker thread panicked");
            }
        }
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Worker thread
// ---------------------------------------------------------------------------

struct WorkerLoop {
    conn: Connection,
    generator: Arc<dyn CardGenerator>,
    loader: ImageLoader,
    events: broadcast::Sender<GenerationEvent>,
    pending: Arc<AtomicUsize>,
}

impl WorkerLoop {
    fn run(self, mut receiver: mpsc::UnboundedReceiver<GenerationTask>) {
        log::debug!("Generation worker started");
        while let Some(task) = receiver.blocking_recv() {
            self.handle(task);
            if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                log::info!("Generation queue drained");
                self.emit(GenerationEvent::QueueDrained);
            }
        }
        log::debug!("Generation worker stopped");
    }

    fn handle(&self, task: GenerationTask) {
        match self.generate(&task) {
            Ok((card, cached)) => {
                self.emit(GenerationEvent::CardReady {
                    request_id: task.request_id,
                    hash: task.hash.clone(),
                    card,
                    cached,
                });
                if let Err(e) = self.promote_packs(&task.hash) {
                    log::warn!("Readiness check for {} failed: {}", task.hash, e);
                }
            }
            Err(e) => {
                log::warn!("Generation for {} failed: {}", task.locator, e);
                self.emit(GenerationEvent::CardFailed {
                    request_id: task.request_id,
                    hash: task.hash,
                    error: e.to_string(),
                });
            }
        }
    }

    fn generate(&self, task: &GenerationTask) -> Result<(CardData, bool)> {
        let cards = CardQuery::new(&self.conn);
        if let Some(card) = cards.get(&task.hash)? {
            log::debug!("Cache hit for {}", task.hash);
            return Ok((card, true));
        }

        log::info!("Cache miss for {}, generating", task.hash);
        let image = self.loader.load(&task.locator)?;
        let actual = content_hash(&image.bytes);
        if actual != task.hash {
            return Err(CardGenError::InvalidState(format!(
                "Image at {} changed since it was queued (expected {}, found {})",
                task.locator, task.hash, actual
            )));
        }
        let card = self.generator.generate(&image)?;
        cards.insert(&task.hash, &card)?;

        // Another writer may have cached this hash first; its card wins.
        let stored = cards.get(&task.hash)?.unwrap_or(card);
        Ok((stored, false))
    }

    fn promote_packs(&self, hash: &str) -> Result<()> {
        let packs = PackQuery::new(&self.conn);
        for pack_id in packs.packs_containing(hash)? {
            if packs.check_readiness(&pack_id)? == PackStatus::Ready {
                self.emit(GenerationEvent::PackReady { pack_id });
            }
        }
        Ok(())
    }

    fn emit(&self, event: GenerationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageData;
    use crate::models::{PackItem, Rarity};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Counting {
        calls: AtomicUsize,
    }

    impl CardGenerator for Counting {
        fn generate(&self, _image: &ImageData) -> Result<CardData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CardData {
                rarity: Rarity::SR,
                name: "Test Card".into(),
                description: "Does things.".into(),
                atk: "100".into(),
                def: "200".into(),
            })
        }
    }

    fn drain(rx: &mut broadcast::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
        let mut seen = Vec::new();
        loop {
            let event = rx.blocking_recv().unwrap();
            let done = event == GenerationEvent::QueueDrained;
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    #[test]
    fn duplicate_tasks_generate_once_and_promote_pack() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        std::fs::write(&image, b"image-a").unwrap();
        let locator = image.to_string_lossy().into_owned();
        let h1 = content_hash(b"image-a");

        let conn = Connection::open_in_memory().unwrap();
        let pack = PackQuery::new(&conn)
            .create(vec![
                PackItem { locator: locator.clone(), hash: h1.clone() },
                PackItem { locator: locator.clone(), hash: h1.clone() },
            ])
            .unwrap();

        let generator = Arc::new(Counting { calls: AtomicUsize::new(0) });
        let worker = GenerationWorker::start(
            conn.try_clone().unwrap(),
            generator.clone(),
            ImageLoader::new(Duration::from_secs(5)),
        )
        .unwrap();
        let mut rx = worker.subscribe();

        worker
            .enqueue_all(vec![
                GenerationTask::new(&locator, &h1),
                GenerationTask::new(&locator, &h1),
            ])
            .unwrap();
        let events = drain(&mut rx);

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(events.contains(&GenerationEvent::PackReady { pack_id: pack.id.clone() }));
        let cached: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                GenerationEvent::CardReady { cached, .. } => Some(*cached),
                _ => None,
            })
            .collect();
        assert_eq!(cached, vec![false, true]);
        assert_eq!(worker.pending(), 0);
        assert_eq!(
            PackQuery::new(&conn).get(&pack.id).unwrap().unwrap().status,
            PackStatus::Ready
        );
    }

    #[test]
    fn failure_is_reported_and_not_cached() {
        let conn = Connection::open_in_memory().unwrap();
        let generator = Arc::new(Counting { calls: AtomicUsize::new(0) });
        let worker = GenerationWorker::start(
            conn.try_clone().unwrap(),
            generator.clone(),
            ImageLoader::new(Duration::from_secs(5)),
        )
        .unwrap();
        let mut rx = worker.subscribe();

        worker
            .enqueue(GenerationTask::new("/no/such/file.jpg", "h2").with_request_id("r1"))
            .unwrap();
        let events = drain(&mut rx);

        assert!(matches!(
            &events[0],
            GenerationEvent::CardFailed { request_id: Some(id), hash, .. } if id == "r1" && hash == "h2"
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(!CardQuery::new(&conn).contains("h2").unwrap());
    }

    #[test]
    fn changed_image_is_rejected_without_generating() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("b.jpg");
        std::fs::write(&image, b"replaced").unwrap();
        let locator = image.to_string_lossy().into_owned();
        let queued_hash = content_hash(b"original");

        let conn = Connection::open_in_memory().unwrap();
        let pack = PackQuery::new(&conn)
            .create(vec![PackItem { locator: locator.clone(), hash: queued_hash.clone() }])
            .unwrap();
        let generator = Arc::new(Counting { calls: AtomicUsize::new(0) });
        let worker = GenerationWorker::start(
            conn.try_clone().unwrap(),
            generator.clone(),
            ImageLoader::new(Duration::from_secs(5)),
        )
        .unwrap();
        let mut rx = worker.subscribe();

        worker.enqueue(GenerationTask::new(&locator, &queued_hash)).unwrap();
        let events = drain(&mut rx);

        assert!(matches!(
            &events[0],
            GenerationEvent::CardFailed { hash, .. } if *hash == queued_hash
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        let cards = CardQuery::new(&conn);
        assert!(!cards.contains(&queued_hash).unwrap());
        assert!(!cards.contains(&content_hash(b"replaced")).unwrap());
        assert_eq!(
            PackQuery::new(&conn).get(&pack.id).unwrap().unwrap().status,
            PackStatus::Processing
        );
    }

    #[test]
    fn enqueue_after_shutdown_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let mut worker = GenerationWorker::start(
            conn.try_clone().unwrap(),
            Arc::new(Counting { calls: AtomicUsize::new(0) }),
            ImageLoader::new(Duration::from_secs(5)),
        )
        .unwrap();
        worker.shutdown();
        assert!(!worker.is_running());
        assert!(matches!(
            worker.enqueue(GenerationTask::new("x", "y")),
            Err(CardGenError::InvalidState(_))
        ));
    }
}
