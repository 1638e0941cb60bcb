use std::time::{Duration, Instant};

use super::ChangeEvent;

pub(crate) const DEBOUNCE_MS: u64 = 100;

/// How long to sleep when nothing is pending.
const IDLE: Duration = Duration::from_secs(86400);

/// Single-shot debounce timer: every event pushes the deadline back and
/// replaces the pending event, so a burst fires once with its last event.
pub(crate) struct Debouncer {
    window: Duration,
    pending: Option<(Instant, ChangeEvent)>,
}

impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub(crate) fn add_event(&mut self, event: ChangeEvent) {
        crate::debug!("watch"; "event {}: {}", event.kind.label(), event.describe());
        let now = Instant::now();
        let deadline = now.checked_add(self.window).unwrap_or(now + IDLE);
        self.pending = Some((deadline, event));
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|(deadline, _)| Instant::now() >= *deadline)
    }

    /// Take the pending event once its deadline has passed.
    pub(crate) fn take_if_ready(&mut self) -> Option<ChangeEvent> {
        if !self.is_ready() {
            return None;
        }
        self.pending.take().map(|(_, event)| event)
    }

    /// Time left until the pending event is due.
    pub(crate) fn sleep_duration(&self) -> Duration {
        match &self.pending {
            Some((deadline, _)) => deadline
                .saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1)),
            None => IDLE,
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
