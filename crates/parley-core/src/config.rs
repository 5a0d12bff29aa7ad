use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ParleyError, Result};

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml` by default. Each section corresponds
/// to one crate of the workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl ParleyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParleyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ParleyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Full path of the persisted dictionary document.
    pub fn dictionary_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.dictionary.file_name)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the dictionary document.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.parley".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Command dictionary configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// File name of the dictionary document inside `general.data_dir`.
    pub file_name: String,
    /// Minimum normalized similarity for a fuzzy (tier 2) match. Inclusive.
    pub fuzzy_threshold: f32,
    /// Persist the dictionary after every learning mutation.
    pub autosave: bool,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            file_name: "commands.json".to_string(),
            fuzzy_threshold: 0.7,
            autosave: true,
        }
    }
}

/// Intent resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Longest utterance (in words) still considered a possible command.
    pub max_command_words: usize,
    /// How long a tier 3 answer is reused for the same utterance.
    pub cache_ttl_secs: u64,
    /// Upper bound on a single external classification call.
    pub classifier_timeout_ms: u64,
    /// Whether tier 3 is consulted at all.
    pub ai_enabled: bool,
    /// Confidence at or above which a result is executed immediately.
    pub execute_threshold: f32,
    /// Confidence at or above which (and below `execute_threshold`) the
    /// user is asked to confirm.
    pub confirm_threshold: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_command_words: 7,
            cache_ttl_secs: 300,
            classifier_timeout_ms: 3000,
            ai_enabled: true,
            execute_threshold: 0.7,
            confirm_threshold: 0.5,
        }
    }
}

impl ResolverConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }
}

/// Feedback constants for the learning loop.
///
/// All deltas are added to an entry's confidence and the result is clamped
/// into `[0.0, 1.0]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Nudge applied when an observed action is not contradicted in time.
    pub implicit_positive: f32,
    /// Boost applied when the user affirms a confirmation prompt.
    pub explicit_confirm: f32,
    /// Penalty applied on "no", "wrong" or a correction phrase.
    pub explicit_reject: f32,
    /// Penalty applied when the user says "undo" right after an action.
    pub immediate_undo: f32,
    /// Non-default entries whose confidence drops below this are forgotten.
    pub remove_learned_below: f32,
    /// Tier 3 results at or above this confidence become `learned` entries
    /// once implicitly accepted.
    pub auto_learn_threshold: f32,
    /// Window after an action during which undo/correction is watched for.
    pub positive_window_ms: u64,
    /// How long a confirmation question stays open.
    pub confirmation_timeout_ms: u64,
    /// How long the loop waits for the intended phrase after a correction.
    pub correction_timeout_ms: u64,
    /// Learned entries unused for longer than this decay.
    pub stale_after_days: u32,
    /// Confidence removed from a stale learned entry per cleanup pass.
    pub stale_decay: f32,
    /// Interval between background cleanup passes.
    pub cleanup_interval_secs: u64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            implicit_positive: 0.05,
            explicit_confirm: 0.15,
            explicit_reject: -0.20,
            immediate_undo: -0.30,
            remove_learned_below: 0.30,
            auto_learn_threshold: 0.85,
            positive_window_ms: 5_000,
            confirmation_timeout_ms: 10_000,
            correction_timeout_ms: 15_000,
            stale_after_days: 30,
            stale_decay: 0.10,
            cleanup_interval_secs: 3_600,
        }
    }
}

impl LearningConfig {
    pub fn positive_window(&self) -> Duration {
        Duration::from_millis(self.positive_window_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn correction_timeout(&self) -> Duration {
        Duration::from_millis(self.correction_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// External LLM classifier settings (tier 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "PARLEY_LLM_API_KEY".to_string(),
        }
    }
}
