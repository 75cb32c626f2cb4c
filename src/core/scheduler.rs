use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use super::clock::{FrameClock, FrameInfo};

/// Identifies one outstanding frame request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

pub type FrameCallback = Box<dyn FnOnce(FrameInfo)>;

/// Source of repaint callbacks. Implementations run every callback requested
/// before a repaint exactly once during that repaint.
pub trait FrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle;

    /// Cancelling an unknown or already-run handle does nothing.
    fn cancel_frame(&self, handle: FrameHandle);
}

/// Single-threaded frame queue driven by the window's redraw loop (or a test).
///
/// Callbacks requested while a frame is running are deferred to the next
/// `run_frame`, so a callback that reschedules itself runs once per frame.
pub struct FrameQueue {
    next_id: Cell<u64>,
    pending: RefCell<Vec<(FrameHandle, FrameCallback)>>,
    cancelled: RefCell<HashSet<FrameHandle>>,
    clock: RefCell<FrameClock>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            pending: RefCell::new(Vec::new()),
            cancelled: RefCell::new(HashSet::new()),
            clock: RefCell::new(FrameClock::new()),
        }
    }

    /// Number of callbacks waiting for the next frame
    pub fn pending(&self) -> usize {
        let cancelled = self.cancelled.borrow();
        self.pending
            .borrow()
            .iter()
            .filter(|(handle, _)| !cancelled.contains(handle))
            .count()
    }

    pub fn is_pending(&self, handle: FrameHandle) -> bool {
        !self.cancelled.borrow().contains(&handle)
            && self.pending.borrow().iter().any(|(h, _)| *h == handle)
    }

    /// Run one frame; returns how many callbacks fired.
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let cancelled = std::mem::take(&mut *self.cancelled.borrow_mut());
        let info = self.clock.borrow_mut().tick();

        let mut fired = 0;
        for (handle, callback) in batch {
            if cancelled.contains(&handle) {
                continue;
            }
            callback(info);
            fired += 1;
        }
        fired
    }

    /// Run `frames` frames back to back
    pub fn run_frames(&self, frames: usize) -> usize {
        (0..frames).map(|_| self.run_frame()).sum()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&self, callback: FrameCallback) -> FrameHandle {
        let handle = FrameHandle(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.pending.borrow_mut().push((handle, callback));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending.borrow().iter().any(|(h, _)| *h == handle) {
            self.cancelled.borrow_mut().insert(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn callback_runs_once() {
        let queue = FrameQueue::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        queue.request_frame(Box::new(move |_| c.set(c.get() + 1)));

        assert_eq!(queue.run_frame(), 1);
        assert_eq!(queue.run_frame(), 0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn cancelled_callback_never_runs() {
        let queue = FrameQueue::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let handle = queue.request_frame(Box::new(move |_| c.set(c.get() + 1)));
        assert!(queue.is_pending(handle));

        queue.cancel_frame(handle);
        assert!(!queue.is_pending(handle));
        assert_eq!(queue.pending(), 0);
        queue.run_frame();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn rescheduled_callback_waits_for_next_frame() {
        let queue = Rc::new(FrameQueue::new());
        let frames = Rc::new(RefCell::new(Vec::new()));

        fn schedule(queue: Rc<FrameQueue>, frames: Rc<RefCell<Vec<u64>>>) {
            let q = queue.clone();
            queue.request_frame(Box::new(move |info| {
                frames.borrow_mut().push(info.number);
                schedule(q, frames);
            }));
        }

        schedule(queue.clone(), frames.clone());
        queue.run_frames(3);
        assert_eq!(*frames.borrow(), vec![1, 2, 3]);
        assert_eq!(queue.pending(), 1);
    }
}
