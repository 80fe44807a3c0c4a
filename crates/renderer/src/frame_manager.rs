//! Frame-in-flight synchronization engine.
//!
//! # Overview
//!
//! Owns one [`FrameData`] per frame-in-flight slot: a command buffer plus
//! the semaphore/fence bundle guarding it. The per-frame sequence is
//!
//! 1. [`wait_for_frame`](FrameManager::wait_for_frame) blocks until the
//!    slot's previous submission signaled its fence,
//! 2. [`acquire_next_image`](FrameManager::acquire_next_image) obtains the
//!    swapchain image,
//! 3. (caller updates this slot's uniform buffers)
//! 4. [`begin_frame`](FrameManager::begin_frame) resets the fence and
//!    starts recording from scratch,
//! 5. [`end_frame`](FrameManager::end_frame), [`submit`](FrameManager::submit),
//!    [`present`](FrameManager::present),
//! 6. [`advance`](FrameManager::advance) moves to the next slot.
//!
//! The fence reset deliberately happens *after* the out-of-date check in
//! acquire: a frame aborted for swapchain recreation must leave its fence
//! signaled, or the next wait on that slot would deadlock.
//!
//! All waits use an effectively-infinite timeout; a GPU hang hangs the
//! application, which is acceptable for a single-user interactive target.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use deferred_rhi::command::{CommandBuffer, CommandPool};
use deferred_rhi::device::Device;
use deferred_rhi::swapchain::Swapchain;
use deferred_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
use deferred_rhi::{RhiError, RhiResult};

use crate::frame::FrameRing;

/// Per-slot recording target and synchronization primitives.
pub struct FrameData {
    /// Command buffer re-recorded from scratch every use of this slot.
    pub command_buffer: CommandBuffer,
    /// Semaphores and fence guarding this slot.
    pub sync: FrameSync,
}

/// Outcome of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// An image was acquired; rendering proceeds.
    Acquired,
    /// The surface is out of date; the caller recreates swap resources and
    /// skips this frame.
    OutOfDate,
}

/// Drives the frame-in-flight slots.
pub struct FrameManager {
    device: Arc<Device>,
    frames: Vec<FrameData>,
    ring: FrameRing,
}

impl FrameManager {
    /// Creates `MAX_FRAMES_IN_FLIGHT` slots with command buffers from `pool`.
    ///
    /// Fences start signaled so the first wait on each slot returns
    /// immediately.
    pub fn new(device: Arc<Device>, pool: &CommandPool) -> RhiResult<Self> {
        let mut frames = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            frames.push(FrameData {
                command_buffer: CommandBuffer::new(device.clone(), pool)?,
                sync: FrameSync::new(device.clone())?,
            });
        }

        debug!(slots = MAX_FRAMES_IN_FLIGHT, "Created frame manager");

        Ok(Self {
            device,
            frames,
            ring: FrameRing::new(),
        })
    }

    /// The active slot's data.
    pub fn current(&self) -> &FrameData {
        &self.frames[self.ring.current_frame()]
    }

    /// The active slot index.
    pub fn frame_index(&self) -> usize {
        self.ring.current_frame()
    }

    /// The swapchain image index acquired for the current frame.
    pub fn image_index(&self) -> u32 {
        self.ring.image_index()
    }

    /// Blocks until the slot's previous submission has finished.
    pub fn wait_for_frame(&mut self) -> RhiResult<()> {
        self.current().sync.in_flight_fence().wait(u64::MAX)?;
        self.ring.mark_observed();
        Ok(())
    }

    /// Acquires the next swapchain image.
    ///
    /// A suboptimal (but successful) acquire still renders this frame; the
    /// present step reports it for recreation afterwards.
    pub fn acquire_next_image(&mut self, swapchain: &Swapchain) -> RhiResult<AcquireResult> {
        match swapchain.acquire_next_image(self.current().sync.image_available_handle()) {
            Ok((index, _suboptimal)) => {
                self.ring.set_image_index(index);
                Ok(AcquireResult::Acquired)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireResult::OutOfDate),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    /// Resets the slot's fence and starts command recording from scratch.
    pub fn begin_frame(&self) -> RhiResult<()> {
        let frame = self.current();
        frame.sync.in_flight_fence().reset()?;
        frame.command_buffer.reset()?;
        frame.command_buffer.begin()
    }

    /// Ends command recording.
    pub fn end_frame(&self) -> RhiResult<()> {
        self.current().command_buffer.end()
    }

    /// Submits the slot's command buffer to the graphics queue.
    ///
    /// Waits on the image-available semaphore at the color-attachment-output
    /// stage, signals the render-finished semaphore, and signals the slot's
    /// fence on completion.
    pub fn submit(&mut self) -> RhiResult<()> {
        let frame = self.current();

        let wait_semaphores = [frame.sync.image_available_handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer.handle()];
        let signal_semaphores = [frame.sync.render_finished_handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                frame.sync.in_flight_fence_handle(),
            )?;
        }
        self.ring.mark_submitted();
        Ok(())
    }

    /// Presents the acquired image.
    ///
    /// Returns `true` if the swapchain is out of date or suboptimal and
    /// swap resources should be recreated.
    pub fn present(&self, swapchain: &Swapchain) -> RhiResult<bool> {
        match swapchain.present(
            self.device.present_queue(),
            self.ring.image_index(),
            self.current().sync.render_finished_handle(),
        ) {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    /// Moves to the next frame-in-flight slot.
    pub fn advance(&mut self) {
        self.ring.advance();
    }

    /// Blocks until every slot's outstanding work has finished.
    pub fn wait_for_all_frames(&self) -> RhiResult<()> {
        for frame in &self.frames {
            frame.sync.in_flight_fence().wait(u64::MAX)?;
        }
        Ok(())
    }

    /// Replaces every slot's semaphores after swapchain recreation.
    ///
    /// An aborted acquire can leave an image-available semaphore with a
    /// pending signal tied to the retired swapchain; fresh semaphores avoid
    /// reusing it. Callers must ensure the device is idle.
    pub fn reset_sync(&mut self) -> RhiResult<()> {
        for frame in &mut self.frames {
            frame.sync = FrameSync::new(self.device.clone())?;
        }
        self.ring.reset_in_flight();
        debug!("Recreated frame synchronization primitives");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_result_is_comparable() {
        assert_eq!(AcquireResult::Acquired, AcquireResult::Acquired);
        assert_ne!(AcquireResult::Acquired, AcquireResult::OutOfDate);
    }

    fn assert_send<T: Send>() {}

    #[test]
    fn test_frame_data_is_send() {
        assert_send::<FrameData>();
    }
}
