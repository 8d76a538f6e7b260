//! Card generators: the seam between the pipeline and the remote model.
//!
//! [`VlmClient`] talks to an OpenAI-compatible chat completions endpoint.
//! [`StubGenerator`] produces random cards locally for offline use.

pub mod stub;
pub mod vlm;

pub use stub::StubGenerator;
pub use vlm::VlmClient;

use crate::error::Result;
use crate::image::ImageData;
use crate::models::CardData;

/// Turns an image into a card. Implementations are shared between the
/// foreground draw path and the background worker thread.
pub trait CardGenerator: Send + Sync {
    fn generate(&self, image: &ImageData) -> Result<CardData>;
}
