//! Frame-in-flight ring index.
//!
//! Tracks which of the `MAX_FRAMES_IN_FLIGHT` slots the CPU is currently
//! preparing, which swapchain image the current frame acquired, and
//! whether each slot still has a submission the CPU has not yet observed
//! completing. Pure bookkeeping; the fences and semaphores guarding each
//! slot live in [`FrameManager`](crate::frame_manager::FrameManager).

use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;

/// Ring of frame-in-flight slot indices.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameRing {
    current: usize,
    image_index: u32,
    in_flight: [bool; MAX_FRAMES_IN_FLIGHT],
}

impl FrameRing {
    /// Creates a ring starting at slot 0 with no work in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active frame-in-flight slot.
    pub fn current_frame(&self) -> usize {
        self.current
    }

    /// The swapchain image index acquired for the current frame.
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Records which swapchain image this frame acquired.
    pub fn set_image_index(&mut self, index: u32) {
        self.image_index = index;
    }

    /// Whether the active slot has a submission whose completion has not
    /// been observed yet. Recording into such a slot would overwrite a
    /// command buffer the GPU may still be reading.
    pub fn current_in_flight(&self) -> bool {
        self.in_flight[self.current]
    }

    /// Marks the active slot's previous submission as observed complete
    /// (its fence wait returned).
    pub fn mark_observed(&mut self) {
        self.in_flight[self.current] = false;
    }

    /// Marks the active slot as submitted to the GPU.
    pub fn mark_submitted(&mut self) {
        debug_assert!(
            !self.in_flight[self.current],
            "slot {} reused before its fence was observed",
            self.current
        );
        self.in_flight[self.current] = true;
    }

    /// Clears every slot's in-flight mark. Valid only once the device is
    /// known idle, e.g. around swapchain recreation.
    pub fn reset_in_flight(&mut self) {
        self.in_flight = [false; MAX_FRAMES_IN_FLIGHT];
    }

    /// Advances to the next slot, wrapping at `MAX_FRAMES_IN_FLIGHT`.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_alternates_between_slots() {
        let mut ring = FrameRing::new();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push(ring.current_frame());
            ring.advance();
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_image_index_is_independent_of_slot() {
        let mut ring = FrameRing::new();
        ring.set_image_index(2);
        ring.advance();
        assert_eq!(ring.image_index(), 2);
        assert_eq!(ring.current_frame(), 1);
    }

    #[test]
    fn test_slot_requires_observation_before_reuse() {
        let mut ring = FrameRing::new();

        // Two frames submitted back to back, neither observed.
        ring.mark_observed();
        ring.mark_submitted();
        ring.advance();
        ring.mark_observed();
        ring.mark_submitted();
        ring.advance();

        // Back at slot 0: its submission is still outstanding, so the
        // fence wait is mandatory before recording into it again.
        assert_eq!(ring.current_frame(), 0);
        assert!(ring.current_in_flight());

        ring.mark_observed();
        assert!(!ring.current_in_flight());
        ring.mark_submitted();
    }

    #[test]
    fn test_sustained_loop_never_reuses_unobserved_slot() {
        let mut ring = FrameRing::new();
        for _ in 0..10 {
            // wait_for_frame semantics: the slot is free after the wait.
            ring.mark_observed();
            assert!(!ring.current_in_flight());
            ring.mark_submitted();
            ring.advance();
        }
    }
}
