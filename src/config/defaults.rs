pub(crate) fn default_tts_model() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

pub(crate) fn default_tts_speed() -> f32 {
    1.0
}

pub(crate) fn default_tts_volume() -> f32 {
    1.0
}

pub(crate) fn default_tts_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_lines_per_page() -> usize {
    60
}

pub(crate) fn default_narration_page_gap_ms() -> u64 {
    100
}

pub(crate) fn default_narration_stop_timeout_ms() -> u64 {
    2000
}

pub(crate) fn default_key_pause() -> String {
    "p".to_string()
}

pub(crate) fn default_key_resume() -> String {
    "r".to_string()
}

pub(crate) fn default_key_stop() -> String {
    "s".to_string()
}

pub(crate) fn default_key_quit() -> String {
    "q".to_string()
}
