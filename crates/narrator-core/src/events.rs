//! Notifications emitted by the narration controller.

use std::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationEvent {
    Started,
    PageChanged { page: usize },
    Paused { page: usize, offset: usize },
    Resumed { page: usize },
    Stopped,
    Finished,
    Error { message: String },
}

impl NarrationEvent {
    /// Events after which the controller is back in `Idle`.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Stopped | Self::Finished)
    }
}

/// Receiver of controller notifications.
///
/// Called from the narration thread as well as from the thread issuing
/// commands, so implementations must only hand the event off (typically to the
/// host's own event loop) and never touch host state directly.
pub trait NarrationListener: Send + Sync + 'static {
    fn notify(&self, event: NarrationEvent);
}

impl NarrationListener for mpsc::Sender<NarrationEvent> {
    fn notify(&self, event: NarrationEvent) {
        if self.send(event).is_err() {
            debug!("Narration listener channel closed; dropping event");
        }
    }
}

/// Forwards events into a host channel that carries other message kinds too.
pub struct ChannelListener<T> {
    tx: mpsc::Sender<T>,
    wrap: fn(NarrationEvent) -> T,
}

impl<T: Send + 'static> ChannelListener<T> {
    pub fn new(tx: mpsc::Sender<T>, wrap: fn(NarrationEvent) -> T) -> Self {
        Self { tx, wrap }
    }
}

impl<T: Send + 'static> NarrationListener for ChannelListener<T> {
    fn notify(&self, event: NarrationEvent) {
        if self.tx.send((self.wrap)(event)).is_err() {
            debug!("Host channel closed; dropping narration event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum HostMessage {
        Narration(NarrationEvent),
    }

    #[test]
    fn channel_listener_wraps_events() {
        let (tx, rx) = mpsc::channel();
        let listener = ChannelListener::new(tx, HostMessage::Narration);
        listener.notify(NarrationEvent::PageChanged { page: 3 });
        assert_eq!(
            rx.recv().unwrap(),
            HostMessage::Narration(NarrationEvent::PageChanged { page: 3 })
        );
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (tx, rx) = mpsc::channel::<NarrationEvent>();
        drop(rx);
        tx.notify(NarrationEvent::Finished);
    }

    #[test]
    fn terminal_events() {
        assert!(NarrationEvent::Stopped.ends_session());
        assert!(NarrationEvent::Finished.ends_session());
        assert!(!NarrationEvent::Paused { page: 0, offset: 2 }.ends_session());
    }
}
