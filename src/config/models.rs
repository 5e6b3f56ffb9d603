use narrator_core::{NarrationSettings, ReadMode, VoicePreference};
use serde::Deserialize;
use std::time::Duration;

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_tts_model")]
    pub tts_model_path: String,
    /// Directory scanned for additional `*.onnx` voices.
    #[serde(default)]
    pub tts_voices_dir: Option<String>,
    #[serde(default = "crate::config::defaults::default_tts_espeak_path")]
    pub tts_espeak_path: String,
    #[serde(default = "crate::config::defaults::default_tts_speed")]
    pub tts_speed: f32,
    #[serde(default = "crate::config::defaults::default_tts_volume")]
    pub tts_volume: f32,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "crate::config::defaults::default_lines_per_page")]
    pub lines_per_page: usize,
    #[serde(default)]
    pub read_mode: ReadMode,
    #[serde(default)]
    pub narration_loop: bool,
    #[serde(default = "crate::config::defaults::default_narration_page_gap_ms")]
    pub narration_page_gap_ms: u64,
    #[serde(default = "crate::config::defaults::default_narration_stop_timeout_ms")]
    pub narration_stop_timeout_ms: u64,
    #[serde(default)]
    pub voice_preference: Option<VoicePreference>,
    #[serde(default = "crate::config::defaults::default_key_pause")]
    pub key_pause: String,
    #[serde(default = "crate::config::defaults::default_key_resume")]
    pub key_resume: String,
    #[serde(default = "crate::config::defaults::default_key_stop")]
    pub key_stop: String,
    #[serde(default = "crate::config::defaults::default_key_quit")]
    pub key_quit: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            tts_model_path: crate::config::defaults::default_tts_model(),
            tts_voices_dir: None,
            tts_espeak_path: crate::config::defaults::default_tts_espeak_path(),
            tts_speed: crate::config::defaults::default_tts_speed(),
            tts_volume: crate::config::defaults::default_tts_volume(),
            cache_dir: crate::config::defaults::default_cache_dir(),
            lines_per_page: crate::config::defaults::default_lines_per_page(),
            read_mode: ReadMode::default(),
            narration_loop: false,
            narration_page_gap_ms: crate::config::defaults::default_narration_page_gap_ms(),
            narration_stop_timeout_ms:
                crate::config::defaults::default_narration_stop_timeout_ms(),
            voice_preference: None,
            key_pause: crate::config::defaults::default_key_pause(),
            key_resume: crate::config::defaults::default_key_resume(),
            key_stop: crate::config::defaults::default_key_stop(),
            key_quit: crate::config::defaults::default_key_quit(),
        }
    }
}

impl AppConfig {
    pub fn narration_settings(&self) -> NarrationSettings {
        NarrationSettings {
            page_gap: Duration::from_millis(self.narration_page_gap_ms),
            stop_timeout: Duration::from_millis(self.narration_stop_timeout_ms.max(1)),
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
