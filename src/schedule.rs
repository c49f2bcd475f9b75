//! Host-driven frame scheduling.
//!
//! The engine never sleeps or spawns. It asks the host for "one more frame"
//! and gets back a handle; the host later calls
//! [`Analyzer::on_animation_frame`](crate::Analyzer::on_animation_frame)
//! with a timestamp. Stopping cancels the outstanding handle.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Scheduler for hosts that pump frames themselves (offline rendering,
/// tests). Tracks the single outstanding request.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Option<FrameHandle>,
    requested: u64,
    cancelled: u64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Total frames requested so far.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_cancellable_once() {
        let mut scheduler = ManualScheduler::new();
        let a = scheduler.request_frame();
        let b = scheduler.request_frame();
        assert_ne!(a, b);
        assert_eq!(scheduler.pending(), Some(b));

        // stale handle is ignored
        scheduler.cancel_frame(a);
        assert_eq!(scheduler.pending(), Some(b));

        scheduler.cancel_frame(b);
        scheduler.cancel_frame(b);
        assert_eq!(scheduler.pending(), None);
        assert_eq!(scheduler.cancelled(), 1);
        assert_eq!(scheduler.requested(), 2);
    }
}
