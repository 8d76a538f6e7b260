//! Image loading from local paths or remote URLs.

use std::fs;
use std::sync::OnceLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;

use crate::error::{CardGenError, Result};

/// Raw image bytes plus the MIME type sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self { bytes, mime }
    }

    /// Inline `data:` URL suitable for an `image_url` content part.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Guess the image type from its magic bytes. Unknown formats are sent as JPEG.
fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

// ---------------------------------------------------------------------------
// ImageLoader
// ---------------------------------------------------------------------------

/// Reads image bytes from disk or over HTTP.
pub struct ImageLoader {
    timeout: Duration,
    client: OnceLock<Client>,
}

impl ImageLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            client: OnceLock::new(),
        }
    }

    /// Lazy HTTP client, created on first remote load.
    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Load the image behind `locator` (a filesystem path or an `http(s)` URL).
    pub fn load(&self, locator: &str) -> Result<ImageData> {
        let bytes = if is_remote(locator) {
            log::debug!("Downloading image {}", locator);
            let resp = self.client()?.get(locator).send()?.error_for_status()?;
            resp.bytes()?.to_vec()
        } else {
            fs::read(locator)?
        };
        if bytes.is_empty() {
            return Err(CardGenError::InvalidArgument(format!(
                "Failed to load image: {} is empty",
                locator
            )));
        }
        Ok(ImageData::new(bytes))
    }

    /// Ask a random-image endpoint for one image URL.
    ///
    /// The endpoint answers with a JSON object carrying an `image_url` field.
    pub fn random_image_url(&self, endpoint: &str) -> Result<String> {
        let resp = self.client()?.get(endpoint).send()?.error_for_status()?;
        let data: serde_json::Value = resp.json()?;
        data.get("image_url")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                CardGenError::NotFound(format!("No image_url in response from {}", endpoint))
            })
    }
}
