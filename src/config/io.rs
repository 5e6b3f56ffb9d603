use super::models::AppConfig;
use super::tables::{ConfigTables, TABLE_NAMES};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

/// Parse either the sectioned layout (`[tts]`, `[narration]`, ...) or the
/// flat key layout.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let raw: toml::Table = toml::from_str(contents).context("Parsing TOML")?;
    let sectioned = raw
        .iter()
        .any(|(key, value)| value.is_table() && TABLE_NAMES.contains(&key.as_str()));
    if sectioned {
        let tables: ConfigTables =
            toml::from_str(contents).context("Reading sectioned configuration")?;
        return Ok(tables.into());
    }
    toml::from_str(contents).context("Reading flat configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use narrator_core::{ReadMode, VoicePreference};
    use std::time::Duration;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.read_mode, ReadMode::FromCurrent);
        assert_eq!(cfg.narration_settings().page_gap, Duration::from_millis(100));
        assert_eq!(cfg.narration_settings().stop_timeout, Duration::from_secs(2));
    }

    #[test]
    fn parses_flat_layout() {
        let cfg = parse_config(
            r#"
            log_level = "debug"
            narration_loop = true
            read_mode = "all"
            voice_preference = "female"
            key_pause = "x"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert!(cfg.narration_loop);
        assert_eq!(cfg.read_mode, ReadMode::All);
        assert_eq!(cfg.voice_preference, Some(VoicePreference::Female));
        assert_eq!(cfg.key_pause, "x");
        assert_eq!(cfg.key_quit, "q");
    }

    #[test]
    fn parses_sectioned_layout() {
        let cfg = parse_config(
            r#"
            [tts]
            model_path = "/voices/ru_RU-irina-medium.onnx"
            speed = 1.5

            [narration]
            loop = true
            page_gap_ms = 250
            read_mode = { range = { from = 2, to = 6 } }

            [keys]
            stop = "x"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tts_model_path, "/voices/ru_RU-irina-medium.onnx");
        assert!((cfg.tts_speed - 1.5).abs() < f32::EPSILON);
        assert!(cfg.narration_loop);
        assert_eq!(cfg.narration_page_gap_ms, 250);
        assert_eq!(cfg.read_mode, ReadMode::Range { from: 2, to: 6 });
        assert_eq!(cfg.key_stop, "x");
        assert_eq!(cfg.cache_dir, ".cache");
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(parse_config("log_level = \"loud\"").is_err());
        assert!(parse_config("not toml at all [").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_config(Path::new("/nonexistent/pdf-narrator/config.toml"));
        assert_eq!(cfg.key_quit, "q");
    }
}
