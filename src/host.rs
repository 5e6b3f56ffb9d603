//! Terminal host: wires the controller to stdin key commands and prints
//! narration events as they arrive.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use narrator_core::{
    ChannelListener, DocumentSource, NarrationController, NarrationEvent, NarrationState,
    ReadMode, SpeechService, SubstringMatcher,
};
use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    Narration(NarrationEvent),
    Key(KeyCommand),
    Interrupt,
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Pause,
    Resume,
    Stop,
    Quit,
}

/// How the session should be launched, after CLI overrides.
#[derive(Debug, Clone, Copy)]
pub struct LaunchPlan {
    pub mode: ReadMode,
    pub current_page: usize,
    pub loop_override: Option<bool>,
}

/// Last page narration reached; a restart after stop picks up there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bookmark {
    page: usize,
}

impl Bookmark {
    fn new(page: usize) -> Self {
        Self { page }
    }

    fn observe(&mut self, event: &NarrationEvent) {
        if let NarrationEvent::PageChanged { page } = event {
            self.page = *page;
        }
    }

    /// Read mode for a restart, keeping the launch range's end.
    fn restart_mode(self, launched: ReadMode) -> ReadMode {
        match launched {
            ReadMode::OnlyCurrent => ReadMode::OnlyCurrent,
            ReadMode::Range { to, .. } => ReadMode::Range {
                from: self.page,
                to,
            },
            ReadMode::FromCurrent | ReadMode::All => ReadMode::FromCurrent,
        }
    }
}

pub fn parse_key(line: &str, config: &AppConfig) -> Option<KeyCommand> {
    let key = line.trim();
    if key.is_empty() {
        return None;
    }
    let bindings = [
        (&config.key_pause, KeyCommand::Pause),
        (&config.key_resume, KeyCommand::Resume),
        (&config.key_stop, KeyCommand::Stop),
        (&config.key_quit, KeyCommand::Quit),
    ];
    bindings
        .into_iter()
        .find(|(binding, _)| binding.eq_ignore_ascii_case(key))
        .map(|(_, command)| command)
}

fn describe(event: &NarrationEvent) -> String {
    match event {
        NarrationEvent::Started => "Narration started".to_string(),
        NarrationEvent::PageChanged { page } => format!("Reading page {}", page + 1),
        NarrationEvent::Paused { page, offset } => {
            format!("Paused on page {} (sentence {})", page + 1, offset + 1)
        }
        NarrationEvent::Resumed { page } => format!("Resumed on page {}", page + 1),
        NarrationEvent::Stopped => "Narration stopped".to_string(),
        NarrationEvent::Finished => "Narration finished".to_string(),
        NarrationEvent::Error { message } => format!("Error: {message}"),
    }
}

fn spawn_input_reader(config: &AppConfig, tx: Sender<HostMessage>) -> Result<()> {
    let config = config.clone();
    thread::Builder::new()
        .name("stdin-keys".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_key(&line, &config) {
                    Some(command) => {
                        if tx.send(HostMessage::Key(command)).is_err() {
                            return;
                        }
                    }
                    None if !line.trim().is_empty() => {
                        println!(
                            "Unknown key {:?}; use {}/{}/{}/{}",
                            line.trim(),
                            config.key_pause,
                            config.key_resume,
                            config.key_stop,
                            config.key_quit
                        );
                    }
                    None => {}
                }
            }
            let _ = tx.send(HostMessage::InputClosed);
        })
        .context("Spawning stdin reader")?;
    Ok(())
}

pub fn run(
    document: Arc<dyn DocumentSource>,
    speech: Arc<dyn SpeechService>,
    config: &AppConfig,
    plan: LaunchPlan,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<HostMessage>();
    let mut controller = NarrationController::new(
        document,
        speech,
        ChannelListener::new(tx.clone(), HostMessage::Narration),
        config.narration_settings(),
    );
    if controller.total_pages() == 0 {
        println!("Document has no pages; nothing to read.");
        return Ok(());
    }

    let interrupt_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(HostMessage::Interrupt);
    })
    .context("Installing Ctrl+C handler")?;
    spawn_input_reader(config, tx)?;

    controller.set_loop(plan.loop_override.unwrap_or(config.narration_loop));
    if let Some(preference) = config.voice_preference {
        match controller.select_preferred_voice(preference, &SubstringMatcher) {
            Ok(Some(voice)) => info!(voice = %voice.display_name, %preference, "Using preferred voice"),
            Ok(None) => {}
            Err(err) => warn!("Failed to list voices: {err}"),
        }
    }
    controller.apply_read_mode(plan.mode, plan.current_page);
    let status = controller.status();
    if let Some(range) = status.range {
        println!(
            "Reading pages {range} of {} ({}). Keys: {}=pause {}=resume {}=stop {}=quit",
            status.total_pages,
            plan.mode,
            config.key_pause,
            config.key_resume,
            config.key_stop,
            config.key_quit
        );
    }
    controller.start();

    let mut bookmark = Bookmark::new(plan.current_page);
    let mut input_open = true;
    while let Ok(message) = rx.recv() {
        debug!(?message, "Host message");
        match message {
            HostMessage::Narration(event) => {
                println!("{}", describe(&event));
                bookmark.observe(&event);
                if event == NarrationEvent::Finished {
                    break;
                }
                let failed = matches!(event, NarrationEvent::Error { .. });
                let idle = controller.state() == NarrationState::Idle;
                if (event.ends_session() || failed) && idle && !input_open {
                    break;
                }
                if failed && idle {
                    println!(
                        "Press {} to restart from page {} or {} to quit.",
                        config.key_resume,
                        bookmark.page + 1,
                        config.key_quit
                    );
                }
            }
            HostMessage::Key(KeyCommand::Pause) => controller.pause(),
            HostMessage::Key(KeyCommand::Resume) => {
                if controller.state() == NarrationState::Idle {
                    info!(page = bookmark.page + 1, "Restarting narration");
                    controller.apply_read_mode(bookmark.restart_mode(plan.mode), bookmark.page);
                    controller.start();
                } else {
                    controller.resume();
                }
            }
            HostMessage::Key(KeyCommand::Stop) => {
                controller.stop();
                println!(
                    "Press {} to restart from page {} or {} to quit.",
                    config.key_resume,
                    bookmark.page + 1,
                    config.key_quit
                );
            }
            HostMessage::Key(KeyCommand::Quit) | HostMessage::Interrupt => {
                info!("Quit requested");
                controller.stop();
                break;
            }
            HostMessage::InputClosed => {
                debug!("stdin closed; waiting for narration to end");
                input_open = false;
                if controller.state() == NarrationState::Idle {
                    break;
                }
            }
        }
    }
    controller.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_config_bindings() {
        let mut config = AppConfig::default();
        assert_eq!(parse_key("p", &config), Some(KeyCommand::Pause));
        assert_eq!(parse_key(" R \n", &config), Some(KeyCommand::Resume));
        assert_eq!(parse_key("s", &config), Some(KeyCommand::Stop));
        assert_eq!(parse_key("q", &config), Some(KeyCommand::Quit));
        assert_eq!(parse_key("", &config), None);
        assert_eq!(parse_key("x", &config), None);

        config.key_pause = "space".to_string();
        assert_eq!(parse_key("space", &config), Some(KeyCommand::Pause));
        assert_eq!(parse_key("p", &config), None);
    }

    #[test]
    fn restart_resumes_from_last_page_reached() {
        let mut bookmark = Bookmark::new(1);
        for event in [
            NarrationEvent::Started,
            NarrationEvent::PageChanged { page: 1 },
            NarrationEvent::PageChanged { page: 2 },
            NarrationEvent::Paused { page: 2, offset: 3 },
            NarrationEvent::Stopped,
        ] {
            bookmark.observe(&event);
        }
        assert_eq!(bookmark.page, 2);
        assert_eq!(bookmark.restart_mode(ReadMode::All), ReadMode::FromCurrent);
        assert_eq!(
            bookmark.restart_mode(ReadMode::Range { from: 1, to: 4 }),
            ReadMode::Range { from: 2, to: 4 }
        );
        assert_eq!(
            bookmark.restart_mode(ReadMode::OnlyCurrent),
            ReadMode::OnlyCurrent
        );
        assert_eq!(
            ReadMode::FromCurrent.resolve(bookmark.page, 5).map(|r| r.start()),
            Some(2)
        );
    }

    #[test]
    fn bookmark_starts_at_launch_page() {
        let bookmark = Bookmark::new(4);
        assert_eq!(bookmark.restart_mode(ReadMode::FromCurrent), ReadMode::FromCurrent);
        assert_eq!(bookmark.page, 4);
    }

    #[test]
    fn events_are_described_with_one_based_pages() {
        assert_eq!(
            describe(&NarrationEvent::PageChanged { page: 0 }),
            "Reading page 1"
        );
        assert_eq!(
            describe(&NarrationEvent::Paused { page: 2, offset: 4 }),
            "Paused on page 3 (sentence 5)"
        );
        assert_eq!(
            describe(&NarrationEvent::Error {
                message: "voice not available: x".into()
            }),
            "Error: voice not available: x"
        );
    }
}
