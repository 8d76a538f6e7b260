use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PROMPT: &str = "Create a funny and creative name and ability description.";
pub const MAX_TOKENS: u32 = 1000;

pub const DEFAULT_GOD_DRAW_URL: &str = "https://api.tcslw.cn/api/img/tbmjx?type=json";
pub const DEFAULT_GOD_DRAW_COUNT: usize = 6;

pub const DATABASE_FILE: &str = "cardgen.duckdb";
pub const SETTINGS_FILE: &str = "settings.json";

pub const ENV_API_URL: &str = "CARDGEN_API_URL";
pub const ENV_API_KEY: &str = "CARDGEN_API_KEY";
pub const ENV_MODEL: &str = "CARDGEN_MODEL";

/// Output contract appended to every single-call prompt.
pub const OUTPUT_FORMAT: &str = "MANDATORY OUTPUT FORMAT:
You must analyze the image and return a JSON object with the following keys:
- \"rarity\": Choose one from [N, R, SR, SSR, UR] based on how epic the image looks.
- \"name\": The name of the card.
- \"description\": The ability text.
- \"atk\": Number 0-5000.
- \"def\": Number 0-5000.

Return ONLY the raw JSON string. Do not include markdown formatting like ```json.";

/// Card fields queried one at a time in [`PromptMode::PerField`].
pub const CARD_FIELDS: [&str; 5] = ["rarity", "name", "description", "atk", "def"];

pub fn default_field_prompts() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        (
            "rarity",
            "Analyze this image and determine its rarity. Choose one from: N, R, SR, SSR, UR. \
             Output only the rarity code (e.g., SSR).",
        ),
        (
            "name",
            "Create a funny and creative name for a trading card based on this image. \
             Output only the name.",
        ),
        (
            "description",
            "Write a creative and funny ability description for this trading card based on the \
             image, in the style of Yu-Gi-Oh. KEEP IT SHORT (max 2 sentences). \
             Output only the description.",
        ),
        (
            "atk",
            "Determine an ATK (Attack) value for this card between 0 and 5000 based on its \
             power level. Output only the number.",
        ),
        (
            "def",
            "Determine a DEF (Defense) value for this card between 0 and 5000 based on its \
             toughness. Output only the number.",
        ),
    ])
}

pub fn default_data_dir() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("cardgen-sdk")
    } else {
        PathBuf::from(".cardgen-sdk")
    }
}

/// How the generator phrases its requests to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// One request returning the whole card as JSON.
    #[default]
    Single,
    /// One request per card field. Works better with small models.
    PerField,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User-editable generation settings, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub custom_prompt: String,
    pub prompt_mode: PromptMode,
    /// Per-field prompt overrides. Blank values keep the default prompt.
    pub field_prompts: HashMap<String, String>,
    pub god_draw_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            custom_prompt: DEFAULT_PROMPT.to_string(),
            prompt_mode: PromptMode::Single,
            field_prompts: HashMap::new(),
            god_draw_url: DEFAULT_GOD_DRAW_URL.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `CARDGEN_API_URL`, `CARDGEN_API_KEY` and `CARDGEN_MODEL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.api_url = url;
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            self.model = model;
        }
        self
    }

    /// The prompt for a single card field, honouring non-blank overrides.
    pub fn field_prompt(&self, field: &str) -> String {
        match self.field_prompts.get(field) {
            Some(custom) if !custom.trim().is_empty() => custom.clone(),
            _ => default_field_prompts()
                .get(field)
                .copied()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Full single-call prompt: custom instructions followed by the output contract.
    pub fn single_call_prompt(&self) -> String {
        let instructions = if self.custom_prompt.trim().is_empty() {
            DEFAULT_PROMPT
        } else {
            self.custom_prompt.as_str()
        };
        format!("{}\n\n{}", instructions, OUTPUT_FORMAT)
    }
}
