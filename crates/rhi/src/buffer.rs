//! GPU buffers backed by gpu-allocator memory.
//!
//! Vertex, index, and indirect buffers live in device-local memory and are
//! filled once through a staging copy: write the staging buffer through its
//! mapped pointer, record a one-shot copy, block until it lands. Uniform
//! buffers stay host-visible because the CPU rewrites them every frame.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What a buffer is for. Picks both the Vulkan usage flags and where the
/// memory lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Per-vertex or per-instance attribute data.
    Vertex,
    /// Triangle indices.
    Index,
    /// Shader uniforms, rewritten by the CPU each frame.
    Uniform,
    /// GPU-read draw-call descriptors for indirect draws.
    Indirect,
    /// CPU-writable source for device-local uploads.
    Staging,
}

impl BufferUsage {
    fn vk_flags(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Indirect => {
                vk::BufferUsageFlags::INDIRECT_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index | BufferUsage::Indirect => {
                MemoryLocation::GpuOnly
            }
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    fn label(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Indirect => "indirect",
            BufferUsage::Staging => "staging",
        }
    }
}

/// `vk::Buffer` plus its allocation.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.vk_flags())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: usage.label(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())?;
        }

        debug!(usage = usage.label(), size, "buffer created");

        Ok(Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        })
    }

    /// Creates a buffer and fills it with `data`, staging through a scratch
    /// buffer when the destination is device-local.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;

        match usage.memory_location() {
            MemoryLocation::GpuOnly => buffer.upload_via_staging(data)?,
            _ => buffer.write_data(0, data)?,
        }

        Ok(buffer)
    }

    /// Writes through the mapped pointer. The buffer must be host-visible.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "write of {} bytes at offset {offset} exceeds buffer size {}",
                data.len(),
                self.size
            )));
        }

        let mapped = self
            .allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .ok_or_else(|| RhiError::InvalidHandle("buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// One-time upload into this device-local buffer. Blocks until the
    /// GPU-side copy has finished, then drops the staging buffer.
    fn upload_via_staging(&self, data: &[u8]) -> RhiResult<()> {
        let staging = Self::new(
            self.device.clone(),
            BufferUsage::Staging,
            data.len() as vk::DeviceSize,
        )?;
        staging.write_data(0, data)?;

        let graphics_family = self
            .device
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitableGpu)?;
        let pool = CommandPool::new_transient(self.device.clone(), graphics_family)?;

        pool.submit_one_shot(|cmd| {
            let region = vk::BufferCopy::default().size(data.len() as vk::DeviceSize);
            cmd.copy_buffer(staging.handle(), self.buffer, &[region]);
        })?;

        debug!(
            bytes = data.len(),
            usage = self.usage.label(),
            "staged upload complete"
        );

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Allocation goes back to the allocator before the buffer dies.
        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("failed to free buffer allocation: {e:?}");
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_local_usages_accept_transfer_writes() {
        for usage in [BufferUsage::Vertex, BufferUsage::Index, BufferUsage::Indirect] {
            assert_eq!(usage.memory_location(), MemoryLocation::GpuOnly);
            assert!(usage.vk_flags().contains(vk::BufferUsageFlags::TRANSFER_DST));
        }
    }

    #[test]
    fn host_visible_usages_map_for_cpu_writes() {
        for usage in [BufferUsage::Uniform, BufferUsage::Staging] {
            assert_eq!(usage.memory_location(), MemoryLocation::CpuToGpu);
        }
        assert!(
            BufferUsage::Staging
                .vk_flags()
                .contains(vk::BufferUsageFlags::TRANSFER_SRC)
        );
    }

    #[test]
    fn usage_flags_match_bind_points() {
        assert!(
            BufferUsage::Vertex
                .vk_flags()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER)
        );
        assert!(
            BufferUsage::Index
                .vk_flags()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert!(
            BufferUsage::Uniform
                .vk_flags()
                .contains(vk::BufferUsageFlags::UNIFORM_BUFFER)
        );
        assert!(
            BufferUsage::Indirect
                .vk_flags()
                .contains(vk::BufferUsageFlags::INDIRECT_BUFFER)
        );
    }
}
