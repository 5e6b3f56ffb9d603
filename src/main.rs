//! Entry point for the PDF narrator.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Load the document text and the Piper speech service.
//! - Hand both to the terminal host.

mod config;
mod document;
mod host;
mod speech;

use crate::config::load_config;
use crate::document::TextDocument;
use crate::host::LaunchPlan;
use crate::speech::{PiperOptions, PiperSpeech};
use anyhow::{Context, Result, anyhow, bail};
use narrator_core::ReadMode;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: pdf-narrator <text-export> [--from N] [--to N] [--loop] \
                     [--mode all|current|only-current]";

#[derive(Debug, Clone, PartialEq)]
struct CliArgs {
    path: PathBuf,
    from: Option<usize>,
    to: Option<usize>,
    loop_reading: bool,
    mode: Option<ReadMode>,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    if !args.path.exists() {
        bail!("File not found: {}", args.path.display());
    }
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.path.display(),
        level = %config.log_level,
        "Starting PDF narrator"
    );
    info!(
        model = %config.tts_model_path,
        espeak = %config.tts_espeak_path,
        speed = config.tts_speed,
        "Active TTS configuration"
    );

    let document = TextDocument::open(&args.path, config.lines_per_page)?;
    let speech = PiperSpeech::new(PiperOptions {
        model_path: PathBuf::from(&config.tts_model_path),
        voices_dir: config.tts_voices_dir.as_ref().map(PathBuf::from),
        espeak_path: PathBuf::from(&config.tts_espeak_path),
        cache_dir: PathBuf::from(&config.cache_dir),
        speed: config.tts_speed,
        volume: config.tts_volume,
    });
    let plan = launch_plan(&args, config.read_mode);
    host::run(Arc::new(document), Arc::new(speech), &config, plan).context("Narration failed")
}

/// CLI arguments are one-based page numbers; the controller works zero-based.
fn launch_plan(args: &CliArgs, configured: ReadMode) -> LaunchPlan {
    let current_page = args.from.unwrap_or(1).saturating_sub(1);
    let mode = match (args.mode, args.to) {
        (Some(mode), _) => mode,
        (None, Some(to)) => ReadMode::Range {
            from: current_page,
            to: to.saturating_sub(1),
        },
        (None, None) if args.from.is_some() => ReadMode::FromCurrent,
        (None, None) => configured,
    };
    LaunchPlan {
        mode,
        current_page,
        loop_override: args.loop_reading.then_some(true),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut path = None;
    let mut from = None;
    let mut to = None;
    let mut loop_reading = false;
    let mut mode = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--from" => from = Some(parse_page(args.next(), "--from")?),
            "--to" => to = Some(parse_page(args.next(), "--to")?),
            "--loop" => loop_reading = true,
            "--mode" => {
                let value = args.next().ok_or_else(|| anyhow!("--mode needs a value\n{USAGE}"))?;
                mode = Some(match value.as_str() {
                    "all" => ReadMode::All,
                    "current" => ReadMode::FromCurrent,
                    "only-current" => ReadMode::OnlyCurrent,
                    other => bail!("Unknown mode {other:?}\n{USAGE}"),
                });
            }
            flag if flag.starts_with("--") => bail!("Unknown option {flag}\n{USAGE}"),
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => bail!("Unexpected argument {arg:?}\n{USAGE}"),
        }
    }

    let path = path.ok_or_else(|| anyhow!(USAGE))?;
    Ok(CliArgs {
        path,
        from,
        to,
        loop_reading,
        mode,
    })
}

fn parse_page(value: Option<String>, flag: &str) -> Result<usize> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a page number\n{USAGE}"))?;
    let page: usize = value
        .parse()
        .with_context(|| format!("{flag} expects a page number, got {value:?}"))?;
    if page == 0 {
        bail!("{flag} pages start at 1");
    }
    Ok(page)
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<CliArgs> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_path_and_flags() {
        let parsed = args(&["book.txt", "--from", "3", "--to", "5", "--loop"]).unwrap();
        assert_eq!(parsed.path, PathBuf::from("book.txt"));
        assert_eq!(parsed.from, Some(3));
        assert_eq!(parsed.to, Some(5));
        assert!(parsed.loop_reading);
        assert_eq!(parsed.mode, None);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["book.txt", "--from"]).is_err());
        assert!(args(&["book.txt", "--from", "0"]).is_err());
        assert!(args(&["book.txt", "--mode", "sideways"]).is_err());
        assert!(args(&["book.txt", "--verbose"]).is_err());
        assert!(args(&["a.txt", "b.txt"]).is_err());
    }

    #[test]
    fn plan_converts_pages_to_zero_based() {
        let parsed = args(&["book.txt", "--from", "3", "--to", "5"]).unwrap();
        let plan = launch_plan(&parsed, ReadMode::All);
        assert_eq!(plan.current_page, 2);
        assert_eq!(plan.mode, ReadMode::Range { from: 2, to: 4 });
        assert_eq!(plan.loop_override, None);
    }

    #[test]
    fn plan_prefers_explicit_mode_then_config() {
        let parsed = args(&["book.txt", "--from", "2", "--mode", "only-current"]).unwrap();
        assert_eq!(launch_plan(&parsed, ReadMode::All).mode, ReadMode::OnlyCurrent);

        let parsed = args(&["book.txt", "--from", "2"]).unwrap();
        assert_eq!(launch_plan(&parsed, ReadMode::All).mode, ReadMode::FromCurrent);

        let parsed = args(&["book.txt", "--loop"]).unwrap();
        let plan = launch_plan(&parsed, ReadMode::All);
        assert_eq!(plan.mode, ReadMode::All);
        assert_eq!(plan.current_page, 0);
        assert_eq!(plan.loop_override, Some(true));
    }
}
