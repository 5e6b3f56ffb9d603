use std::time::Duration;

const DEFAULT_PAGE_GAP: Duration = Duration::from_millis(100);
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Timing knobs of the narration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationSettings {
    /// Silence between two pages.
    pub page_gap: Duration,
    /// How long `stop()` waits for the narration thread before detaching it.
    pub stop_timeout: Duration,
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self {
            page_gap: DEFAULT_PAGE_GAP,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}
