//! The narration loop running on the session's background thread.

use super::Shared;
use crate::cancellation::CancellationToken;
use crate::error::SpeechError;
use crate::events::NarrationEvent;
use crate::range::PageRange;
use crate::segment::{prepare_page_text, segment};
use crate::services::{DocumentSource, SpeechService};
use crate::voice::VoiceId;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub(super) enum Command {
    Pause,
    Resume,
    Stop,
    SetLoop(bool),
    SetVoice(VoiceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
enum PageOutcome {
    Done,
    Stopped,
    Fatal(String),
}

#[derive(Debug)]
enum SessionOutcome {
    Finished,
    Stopped,
    Failed(String),
}

pub(super) struct Worker {
    pub(super) session: u64,
    pub(super) document: Arc<dyn DocumentSource>,
    pub(super) speech: Arc<dyn SpeechService>,
    pub(super) shared: Arc<Shared>,
    pub(super) commands: mpsc::Receiver<Command>,
    /// Commands received while they could not be acted on yet.
    pub(super) pending: VecDeque<Command>,
    pub(super) cancel: CancellationToken,
    pub(super) range: PageRange,
    pub(super) loop_enabled: bool,
    pub(super) voice: Option<VoiceId>,
    pub(super) applied_voice: Option<VoiceId>,
    pub(super) page_gap: Duration,
}

impl Worker {
    pub(super) fn run(mut self) {
        let outcome = self.narrate();
        debug!(session = self.session, ?outcome, "Narration loop exited");
        match outcome {
            SessionOutcome::Finished => {
                if self.shared.settle_idle() {
                    info!(session = self.session, "Narration finished");
                    self.emit(NarrationEvent::Finished);
                }
            }
            SessionOutcome::Failed(message) => {
                if self.shared.settle_idle() {
                    warn!(session = self.session, %message, "Narration aborted");
                    self.emit(NarrationEvent::Error { message });
                }
            }
            SessionOutcome::Stopped => {}
        }
    }

    fn emit(&self, event: NarrationEvent) {
        self.shared.emit(self.session, event);
    }

    fn narrate(&mut self) -> SessionOutcome {
        loop {
            for page in self.range.start()..=self.range.end() {
                match self.narrate_page(page) {
                    PageOutcome::Done => {}
                    PageOutcome::Stopped => return SessionOutcome::Stopped,
                    PageOutcome::Fatal(message) => return SessionOutcome::Failed(message),
                }
                let more = page < self.range.end() || self.loop_enabled;
                if more && self.wait_page_gap() == Flow::Stop {
                    return SessionOutcome::Stopped;
                }
            }

            if self.absorb_settings() == Flow::Stop {
                return SessionOutcome::Stopped;
            }
            if !self.loop_enabled {
                return SessionOutcome::Finished;
            }
            info!(
                session = self.session,
                range = %self.range,
                "Reached end of range; looping"
            );
        }
    }

    fn narrate_page(&mut self, page: usize) -> PageOutcome {
        if self.cancel.is_cancelled() {
            return PageOutcome::Stopped;
        }
        debug_assert!(self.range.contains(page));
        self.shared.record_position(page, 0);
        self.emit(NarrationEvent::PageChanged { page });
        // Pages without units never reach the per-unit checkpoint.
        if self.checkpoint(page, 0) == Flow::Stop {
            return PageOutcome::Stopped;
        }

        let raw = match self.document.page_text(page) {
            Ok(text) => text,
            Err(err) => {
                warn!(page = page + 1, "Failed to read page text: {err:#}");
                self.emit(NarrationEvent::Error {
                    message: format!("Failed to read page {}: {err}", page + 1),
                });
                return PageOutcome::Done;
            }
        };
        let units = segment(&prepare_page_text(&raw));
        if units.is_empty() {
            debug!(page = page + 1, "Skipping page without text");
            return PageOutcome::Done;
        }
        debug!(page = page + 1, units = units.len(), "Narrating page");

        let mut offset = 0;
        while offset < units.len() {
            if self.checkpoint(page, offset) == Flow::Stop {
                return PageOutcome::Stopped;
            }
            self.apply_voice();

            match self.speech.speak(&units[offset]) {
                Ok(()) => {
                    if self.cancel.is_cancelled() {
                        return PageOutcome::Stopped;
                    }
                    offset += 1;
                    self.shared.record_position(page, offset);
                }
                Err(err) => {
                    if self.cancel.is_cancelled() {
                        return PageOutcome::Stopped;
                    }
                    return self.speech_failed(page, offset, err);
                }
            }
        }
        PageOutcome::Done
    }

    fn speech_failed(&self, page: usize, offset: usize, err: SpeechError) -> PageOutcome {
        if err.is_fatal() {
            return PageOutcome::Fatal(err.to_string());
        }
        warn!(
            page = page + 1,
            unit = offset,
            error = %err,
            "Speech failed; skipping rest of page"
        );
        self.emit(NarrationEvent::Error {
            message: format!("Page {}: {err}", page + 1),
        });
        PageOutcome::Done
    }

    fn apply_voice(&mut self) {
        if self.voice == self.applied_voice {
            return;
        }
        let Some(voice) = self.voice.clone() else {
            return;
        };
        match self.speech.select_voice(&voice) {
            Ok(()) => debug!(voice = %voice, "Applied voice"),
            Err(err) => {
                warn!(voice = %voice, error = %err, "Failed to apply voice");
                self.emit(NarrationEvent::Error {
                    message: err.to_string(),
                });
            }
        }
        // Not retried until a different voice is selected.
        self.applied_voice = Some(voice);
    }

    fn next_command(&mut self, block: bool) -> Option<Command> {
        if let Some(command) = self.pending.pop_front() {
            return Some(command);
        }
        if block {
            return Some(self.commands.recv().unwrap_or(Command::Stop));
        }
        match self.commands.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Command::Stop),
        }
    }

    /// Safe point before speaking `offset` on `page`: apply settings, suspend
    /// while paused, bail out on stop.
    fn checkpoint(&mut self, page: usize, offset: usize) -> Flow {
        let mut paused = false;
        loop {
            if self.cancel.is_cancelled() {
                return Flow::Stop;
            }
            let Some(command) = self.next_command(paused) else {
                return Flow::Continue;
            };
            match command {
                Command::Pause if !paused => {
                    paused = true;
                    self.shared.record_position(page, offset);
                    info!(page = page + 1, offset, "Narration paused");
                    self.emit(NarrationEvent::Paused { page, offset });
                }
                Command::Resume if paused => {
                    paused = false;
                    info!(page = page + 1, offset, "Narration resumed");
                    self.emit(NarrationEvent::Resumed { page });
                }
                Command::Pause | Command::Resume => {}
                Command::Stop => return Flow::Stop,
                Command::SetLoop(enabled) => self.loop_enabled = enabled,
                Command::SetVoice(voice) => self.voice = Some(voice),
            }
        }
    }

    /// Apply loop/voice changes without acting on pause requests, which stay
    /// queued for the next safe point.
    fn absorb_settings(&mut self) -> Flow {
        while let Ok(command) = self.commands.try_recv() {
            self.pending.push_back(command);
        }
        let mut kept = VecDeque::new();
        for command in std::mem::take(&mut self.pending) {
            match command {
                Command::Stop => return Flow::Stop,
                Command::SetLoop(enabled) => self.loop_enabled = enabled,
                Command::SetVoice(voice) => self.voice = Some(voice),
                other => kept.push_back(other),
            }
        }
        self.pending = kept;
        if self.cancel.is_cancelled() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Sleep between pages while staying responsive to stop.
    fn wait_page_gap(&mut self) -> Flow {
        let deadline = Instant::now() + self.page_gap;
        loop {
            if self.cancel.is_cancelled() {
                return Flow::Stop;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Flow::Continue;
            }
            match self.commands.recv_timeout(remaining) {
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => return Flow::Stop,
                Ok(command) => self.pending.push_back(command),
                Err(RecvTimeoutError::Timeout) => return Flow::Continue,
            }
        }
    }
}
