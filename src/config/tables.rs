use super::defaults;
use super::models::{AppConfig, LogLevel};
use narrator_core::{ReadMode, VoicePreference};
use serde::Deserialize;

/// Sectioned layout of `conf/config.toml`; flattened into `AppConfig`.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    tts: TtsConfig,
    #[serde(default)]
    document: DocumentConfig,
    #[serde(default)]
    narration: NarrationConfig,
    #[serde(default)]
    keys: KeysConfig,
}

pub(super) const TABLE_NAMES: &[&str] = &["logging", "tts", "document", "narration", "keys"];

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            tts_model_path: tables.tts.model_path,
            tts_voices_dir: tables.tts.voices_dir,
            tts_espeak_path: tables.tts.espeak_path,
            tts_speed: tables.tts.speed,
            tts_volume: tables.tts.volume,
            cache_dir: tables.tts.cache_dir,
            lines_per_page: tables.document.lines_per_page,
            read_mode: tables.narration.read_mode,
            narration_loop: tables.narration.loop_reading,
            narration_page_gap_ms: tables.narration.page_gap_ms,
            narration_stop_timeout_ms: tables.narration.stop_timeout_ms,
            voice_preference: tables.narration.voice_preference,
            key_pause: tables.keys.pause,
            key_resume: tables.keys.resume,
            key_stop: tables.keys.stop,
            key_quit: tables.keys.quit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TtsConfig {
    #[serde(default = "defaults::default_tts_model")]
    model_path: String,
    #[serde(default)]
    voices_dir: Option<String>,
    #[serde(default = "defaults::default_tts_espeak_path")]
    espeak_path: String,
    #[serde(default = "defaults::default_tts_speed")]
    speed: f32,
    #[serde(default = "defaults::default_tts_volume")]
    volume: f32,
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model_path: defaults::default_tts_model(),
            voices_dir: None,
            espeak_path: defaults::default_tts_espeak_path(),
            speed: defaults::default_tts_speed(),
            volume: defaults::default_tts_volume(),
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DocumentConfig {
    #[serde(default = "defaults::default_lines_per_page")]
    lines_per_page: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            lines_per_page: defaults::default_lines_per_page(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NarrationConfig {
    #[serde(default)]
    read_mode: ReadMode,
    #[serde(default, rename = "loop")]
    loop_reading: bool,
    #[serde(default = "defaults::default_narration_page_gap_ms")]
    page_gap_ms: u64,
    #[serde(default = "defaults::default_narration_stop_timeout_ms")]
    stop_timeout_ms: u64,
    #[serde(default)]
    voice_preference: Option<VoicePreference>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            read_mode: ReadMode::default(),
            loop_reading: false,
            page_gap_ms: defaults::default_narration_page_gap_ms(),
            stop_timeout_ms: defaults::default_narration_stop_timeout_ms(),
            voice_preference: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct KeysConfig {
    #[serde(default = "defaults::default_key_pause")]
    pause: String,
    #[serde(default = "defaults::default_key_resume")]
    resume: String,
    #[serde(default = "defaults::default_key_stop")]
    stop: String,
    #[serde(default = "defaults::default_key_quit")]
    quit: String,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            pause: defaults::default_key_pause(),
            resume: defaults::default_key_resume(),
            stop: defaults::default_key_stop(),
            quit: defaults::default_key_quit(),
        }
    }
}
