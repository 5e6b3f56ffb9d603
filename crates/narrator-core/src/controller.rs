//! Narration controller.
//!
//! The controller is owned by the host's event-loop thread. Each `start()`
//! spawns one narration thread that owns the session until it finishes, fails
//! or is stopped. Commands reach that thread over a channel; notifications go
//! out through the registered `NarrationListener`, gated by session so a
//! stopped or detached thread can never deliver anything afterwards.

mod worker;


use crate::cancellation::CancellationToken;
use crate::error::SpeechError;
use crate::events::{NarrationEvent, NarrationListener};
use crate::range::{PageRange, ReadMode};
use crate::services::{DocumentSource, SpeechService};
use crate::settings::NarrationSettings;
use crate::voice::{Voice, VoiceId, VoiceMatcher, VoicePreference, select_voice};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use worker::{Command, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarrationState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
}

impl NarrationState {
    pub fn is_active(self) -> bool {
        matches!(self, NarrationState::Running | NarrationState::Paused)
    }
}

/// Read-only view of the controller for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationStatus {
    pub state: NarrationState,
    pub total_pages: usize,
    pub range: Option<PageRange>,
    pub current_page: Option<usize>,
    pub resume_offset: usize,
    pub loop_enabled: bool,
    pub voice: Option<VoiceId>,
}

/// Session progress published by the narration thread.
#[derive(Debug, Default)]
struct Progress {
    state: NarrationState,
    current_page: Option<usize>,
    resume_offset: usize,
}

struct Dispatch {
    session: Option<u64>,
    listener: Box<dyn NarrationListener>,
}

/// State shared between the controller and its narration thread.
pub(crate) struct Shared {
    progress: Mutex<Progress>,
    dispatch: Mutex<Dispatch>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn new(listener: Box<dyn NarrationListener>) -> Self {
        Self {
            progress: Mutex::new(Progress::default()),
            dispatch: Mutex::new(Dispatch {
                session: None,
                listener,
            }),
        }
    }

    fn state(&self) -> NarrationState {
        lock(&self.progress).state
    }

    /// Move between two states; `false` if the current state is not `from`.
    fn transition(&self, from: NarrationState, to: NarrationState) -> bool {
        let mut progress = lock(&self.progress);
        if progress.state != from {
            return false;
        }
        progress.state = to;
        true
    }

    pub(crate) fn record_position(&self, page: usize, offset: usize) {
        let mut progress = lock(&self.progress);
        progress.current_page = Some(page);
        progress.resume_offset = offset;
    }

    /// Return to `Idle` from the narration thread. Fails once `stop()` took
    /// over the session, which then owns the terminal notification.
    pub(crate) fn settle_idle(&self) -> bool {
        let mut progress = lock(&self.progress);
        if !progress.state.is_active() {
            return false;
        }
        *progress = Progress::default();
        true
    }

    fn reset(&self) {
        *lock(&self.progress) = Progress::default();
    }

    /// Deliver an event produced on behalf of `session`.
    pub(crate) fn emit(&self, session: u64, event: NarrationEvent) {
        let dispatch = lock(&self.dispatch);
        if dispatch.session == Some(session) {
            dispatch.listener.notify(event);
        } else {
            debug!(session, ?event, "Dropping event from inactive narration session");
        }
    }

    fn open(&self, session: u64, event: NarrationEvent) {
        let mut dispatch = lock(&self.dispatch);
        dispatch.session = Some(session);
        dispatch.listener.notify(event);
    }

    /// Close the gate and deliver the final event of the session, if any.
    fn close(&self, event: Option<NarrationEvent>) {
        let mut dispatch = lock(&self.dispatch);
        dispatch.session = None;
        if let Some(event) = event {
            dispatch.listener.notify(event);
        }
    }
}

struct SessionHandle {
    id: u64,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    exited: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

impl SessionHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(session = self.id, "Narration thread already exited");
        }
    }

    /// Wait for the thread to exit, detaching it once `timeout` elapses.
    fn join(self, timeout: Duration) {
        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    session = self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Narration thread did not exit in time; detaching it"
                );
            }
            _ => {
                if self.thread.join().is_err() {
                    warn!(session = self.id, "Narration thread panicked");
                }
            }
        }
    }
}

pub struct NarrationController {
    document: Arc<dyn DocumentSource>,
    speech: Arc<dyn SpeechService>,
    shared: Arc<Shared>,
    settings: NarrationSettings,
    total_pages: usize,
    range: Option<PageRange>,
    loop_enabled: bool,
    voice: Option<VoiceId>,
    session: Option<SessionHandle>,
    next_session_id: u64,
}

impl NarrationController {
    pub fn new(
        document: Arc<dyn DocumentSource>,
        speech: Arc<dyn SpeechService>,
        listener: impl NarrationListener,
        settings: NarrationSettings,
    ) -> Self {
        let total_pages = document.page_count();
        info!(total_pages, "Narration controller ready");
        Self {
            document,
            speech,
            shared: Arc::new(Shared::new(Box::new(listener))),
            settings,
            total_pages,
            range: PageRange::whole(total_pages),
            loop_enabled: false,
            voice: None,
            session: None,
            next_session_id: 1,
        }
    }

    pub fn state(&self) -> NarrationState {
        self.shared.state()
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn status(&self) -> NarrationStatus {
        let progress = lock(&self.shared.progress);
        NarrationStatus {
            state: progress.state,
            total_pages: self.total_pages,
            range: self.range,
            current_page: progress.current_page,
            resume_offset: progress.resume_offset,
            loop_enabled: self.loop_enabled,
            voice: self.voice.clone(),
        }
    }

    /// Set the inclusive page range. Ignored unless idle; out-of-range bounds
    /// are clamped into the document.
    pub fn set_range(&mut self, from: usize, to: usize) {
        let state = self.state();
        if state != NarrationState::Idle {
            debug!(from, to, ?state, "Ignoring range change while narrating");
            return;
        }
        self.range = PageRange::clamped(from, to, self.total_pages);
        match self.range {
            Some(range) => info!(range = %range, "Narration range set"),
            None => warn!(from, to, "Document has no pages; range cleared"),
        }
    }

    pub fn apply_read_mode(&mut self, mode: ReadMode, current_page: usize) {
        let Some(range) = mode.resolve(current_page, self.total_pages) else {
            warn!(mode = %mode, "Document has no pages; read mode not applied");
            return;
        };
        debug!(mode = %mode, current_page, "Applying read mode");
        self.set_range(range.start(), range.end());
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
        debug!(enabled, "Loop reading updated");
        if let Some(session) = self.live_session() {
            session.send(Command::SetLoop(enabled));
        }
    }

    pub fn set_voice(&mut self, id: VoiceId) {
        info!(voice = %id, "Voice selected");
        self.voice = Some(id.clone());
        if let Some(session) = self.live_session() {
            session.send(Command::SetVoice(id));
        }
    }

    pub fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        self.speech.list_voices()
    }

    /// Pick a voice for `preference` among the engine's voices and select it.
    pub fn select_preferred_voice(
        &mut self,
        preference: VoicePreference,
        matcher: &dyn VoiceMatcher,
    ) -> Result<Option<Voice>, SpeechError> {
        let voices = self.speech.list_voices()?;
        let Some(voice) = select_voice(&voices, preference, matcher).cloned() else {
            warn!(%preference, "Speech engine reported no voices");
            return Ok(None);
        };
        self.set_voice(voice.id.clone());
        Ok(Some(voice))
    }

    pub fn start(&mut self) {
        let state = self.state();
        if state != NarrationState::Idle {
            debug!(?state, "Ignoring start; narration already active");
            return;
        }
        self.reap_session();
        let Some(range) = self.range else {
            warn!("Cannot start narration: document has no pages");
            return;
        };

        let id = self.next_session_id;
        self.next_session_id = self.next_session_id.wrapping_add(1);
        {
            let mut progress = lock(&self.shared.progress);
            progress.state = NarrationState::Running;
            progress.current_page = Some(range.start());
            progress.resume_offset = 0;
        }
        info!(
            session = id,
            range = %range,
            pages = range.page_count(),
            loop_enabled = self.loop_enabled,
            "Starting narration"
        );
        self.shared.open(id, NarrationEvent::Started);

        let (command_tx, command_rx) = mpsc::channel();
        let (exited_tx, exited_rx) = mpsc::channel::<()>();
        let cancel = CancellationToken::new();
        let worker = Worker {
            session: id,
            document: Arc::clone(&self.document),
            speech: Arc::clone(&self.speech),
            shared: Arc::clone(&self.shared),
            commands: command_rx,
            pending: Default::default(),
            cancel: cancel.clone(),
            range,
            loop_enabled: self.loop_enabled,
            voice: self.voice.clone(),
            applied_voice: None,
            page_gap: self.settings.page_gap,
        };
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("narration-{id}"))
            .spawn(move || {
                let _exited = exited_tx;
                if panic::catch_unwind(AssertUnwindSafe(|| worker.run())).is_err() {
                    error!(session = id, "Narration thread panicked");
                    if shared.settle_idle() {
                        shared.emit(
                            id,
                            NarrationEvent::Error {
                                message: "Narration stopped unexpectedly".to_string(),
                            },
                        );
                    }
                }
            });

        match spawned {
            Ok(thread) => {
                self.session = Some(SessionHandle {
                    id,
                    commands: command_tx,
                    cancel,
                    exited: exited_rx,
                    thread,
                });
            }
            Err(err) => {
                error!(session = id, "Failed to spawn narration thread: {err}");
                self.shared.reset();
                self.shared.close(Some(NarrationEvent::Error {
                    message: format!("Failed to start narration: {err}"),
                }));
            }
        }
    }

    /// Request a pause; it takes effect once the unit being spoken finished.
    pub fn pause(&mut self) {
        if !self
            .shared
            .transition(NarrationState::Running, NarrationState::Paused)
        {
            debug!(state = ?self.state(), "Ignoring pause; narration not running");
            return;
        }
        info!("Pause requested");
        if let Some(session) = &self.session {
            session.send(Command::Pause);
        }
    }

    pub fn resume(&mut self) {
        if !self
            .shared
            .transition(NarrationState::Paused, NarrationState::Running)
        {
            debug!(state = ?self.state(), "Ignoring resume; narration not paused");
            return;
        }
        info!("Resume requested");
        if let Some(session) = &self.session {
            session.send(Command::Resume);
        }
    }

    /// Stop narration and wait for the narration thread to exit.
    ///
    /// When this returns the controller is idle and the listener has received
    /// its last event of the session, `Stopped`.
    pub fn stop(&mut self) {
        let previous = {
            let mut progress = lock(&self.shared.progress);
            let previous = progress.state;
            if previous.is_active() {
                progress.state = NarrationState::Stopping;
            }
            previous
        };
        if !previous.is_active() {
            debug!(state = ?previous, "Stop requested while idle");
            self.reap_session();
            return;
        }

        info!(state = ?previous, "Stopping narration");
        self.shared.close(None);
        match self.session.take() {
            Some(session) => {
                session.cancel.cancel();
                session.send(Command::Stop);
                self.speech.stop();
                session.join(self.settings.stop_timeout);
            }
            None => self.speech.stop(),
        }
        self.shared.reset();
        self.shared.close(Some(NarrationEvent::Stopped));
        info!("Narration stopped");
    }

    fn live_session(&self) -> Option<&SessionHandle> {
        if self.state().is_active() {
            self.session.as_ref()
        } else {
            None
        }
    }

    /// Join a session whose thread already settled back to idle on its own.
    fn reap_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.join(self.settings.stop_timeout);
        }
    }
}

impl Drop for NarrationController {
    fn drop(&mut self) {
        self.stop();
    }
}
