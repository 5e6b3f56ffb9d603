use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Session-scoped stop signal shared between the controller and its narration
/// thread. Each session gets a fresh token; a cancelled token never resets.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::CancellationToken;

    #[test]
    fn cancel_is_visible_to_clones_and_sticks() {
        let token = CancellationToken::new();
        let shared = token.clone();
        assert!(!token.is_cancelled());
        shared.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(shared.is_cancelled());
    }
}
