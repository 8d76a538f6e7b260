//! Client for OpenAI-compatible vision chat completion endpoints.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};

use super::CardGenerator;
use crate::config::{self, PromptMode, Settings};
use crate::error::{CardGenError, Result};
use crate::image::ImageData;
use crate::models::{clean_stat, CardData, Rarity};

/// Generates cards by sending the image to a vision-language model.
pub struct VlmClient {
    settings: Settings,
    endpoint: String,
    timeout: Duration,
    client: OnceLock<Client>,
}

impl VlmClient {
    pub fn new(settings: Settings, timeout: Duration) -> Self {
        let endpoint = endpoint_url(&settings.api_url);
        Self {
            settings,
            endpoint,
            timeout,
            client: OnceLock::new(),
        }
    }

    /// The fully resolved chat completions URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Send one prompt with the image attached and return the message text.
    fn chat(&self, image: &ImageData, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.settings.model,
            "max_tokens": config::MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image.data_url() } },
                ],
            }],
        });

        let resp = self
            .client()?
            .post(&self.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(CardGenError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        message_content(&text).ok_or(CardGenError::Parse(text))
    }

    fn generate_single(&self, image: &ImageData) -> Result<CardData> {
        let content = self.chat(image, &self.settings.single_call_prompt())?;
        parse_card_content(&content)
    }

    fn generate_per_field(&self, image: &ImageData) -> Result<CardData> {
        let mut answers = Vec::with_capacity(config::CARD_FIELDS.len());
        for field in config::CARD_FIELDS {
            let answer = self.chat(image, &self.settings.field_prompt(field))?;
            answers.push(answer.trim().to_string());
        }
        let or = |s: &str, fallback: &str| {
            if s.is_empty() {
                fallback.to_string()
            } else {
                s.to_string()
            }
        };
        Ok(CardData {
            rarity: Rarity::from_model_text(&answers[0]),
            name: or(&answers[1], "Unknown Entity"),
            description: or(&answers[2], "No effect."),
            atk: clean_stat(&answers[3]),
            def: clean_stat(&answers[4]),
        })
    }
}

impl CardGenerator for VlmClient {
    fn generate(&self, image: &ImageData) -> Result<CardData> {
        if self.settings.api_key.trim().is_empty() {
            return Err(CardGenError::MissingApiKey);
        }
        log::info!(
            "Requesting card from {} (model {}, {:?} mode)",
            self.endpoint,
            self.settings.model,
            self.settings.prompt_mode
        );
        match self.settings.prompt_mode {
            PromptMode::Single => self.generate_single(image),
            PromptMode::PerField => self.generate_per_field(image),
        }
    }
}

// ---------------------------------------------------------------------------
// Free-standing helpers
// ---------------------------------------------------------------------------

/// Resolve a user-entered API base into the chat completions endpoint.
pub fn endpoint_url(api_url: &str) -> String {
    let api_url = api_url.trim();
    if api_url.contains("api.openai.com") && !api_url.contains("v1") {
        return config::OPENAI_CHAT_URL.to_string();
    }
    if api_url.ends_with(config::CHAT_COMPLETIONS_PATH) {
        return api_url.to_string();
    }
    format!(
        "{}{}",
        api_url.trim_end_matches('/'),
        config::CHAT_COMPLETIONS_PATH
    )
}

/// Extract `choices[0].message.content` from a chat completion body.
fn message_content(body: &str) -> Option<String> {
    let data: Value = serde_json::from_str(body).ok()?;
    data.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse the model's JSON answer into a card, filling in defaults for
/// missing fields.
pub fn parse_card_content(content: &str) -> Result<CardData> {
    let card: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|_| CardGenError::Parse(content.to_string()))?;
    if !card.is_object() {
        return Err(CardGenError::Parse(content.to_string()));
    }

    let field = |key: &str, fallback: &str| match card.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    };

    Ok(CardData {
        rarity: Rarity::from_model_text(&field("rarity", "N")),
        name: field("name", "Unknown"),
        description: field("description", "No Data"),
        atk: clean_stat(&field("atk", "0")),
        def: clean_stat(&field("def", "0")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_path() {
        assert_eq!(
            endpoint_url("http://10.0.0.2:8080"),
            "http://10.0.0.2:8080/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url("http://10.0.0.2:8080/"),
            "http://10.0.0.2:8080/v1/chat/completions"
        );
        assert_eq!(
            endpoint_url("http://host/v1/chat/completions"),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn bare_openai_host_maps_to_canonical_url() {
        assert_eq!(endpoint_url("https://api.openai.com"), config::OPENAI_CHAT_URL);
        assert_eq!(endpoint_url("https://api.openai.com/"), config::OPENAI_CHAT_URL);
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_full_card() {
        let card = parse_card_content(
            r#"```json
            {"rarity": "SSR", "name": "Cat", "description": "Meow.", "atk": 3000, "def": "2,500"}
            ```"#,
        )
        .unwrap();
        assert_eq!(card.rarity, Rarity::SSR);
        assert_eq!(card.name, "Cat");
        assert_eq!(card.atk, "3000");
        assert_eq!(card.def, "2500");
    }

    #[test]
    fn missing_fields_get_defaults() {
        let card = parse_card_content(r#"{"name": "Lonely"}"#).unwrap();
        assert_eq!(card.rarity, Rarity::N);
        assert_eq!(card.description, "No Data");
        assert_eq!(card.atk, "0");
        assert_eq!(card.def, "0");
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            parse_card_content("I cannot help with that."),
            Err(CardGenError::Parse(_))
        ));
        assert!(matches!(parse_card_content("[1, 2]"), Err(CardGenError::Parse(_))));
    }

    #[test]
    fn message_content_reads_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        assert_eq!(message_content(body).as_deref(), Some("hi"));
        assert!(message_content(r#"{"choices":[]}"#).is_none());
    }

    #[test]
    fn missing_key_fails_before_network() {
        let client = VlmClient::new(Settings::default(), Duration::from_secs(1));
        let err = client.generate(&ImageData::new(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, CardGenError::MissingApiKey));
    }
}
