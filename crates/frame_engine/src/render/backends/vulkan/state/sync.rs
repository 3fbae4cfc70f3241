//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, plus [`FrameSync`], the set of
//! objects one frame in flight needs: an image-available semaphore signaled
//! by acquire, a render-finished semaphore waited on by present, and the
//! in-flight fence the CPU waits on before reusing the frame slot.

use ash::vk;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::VulkanResult;

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: SharedDevice,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: &SharedDevice) -> VulkanResult<Self> {
        Ok(Self {
            semaphore: device.create_semaphore()?,
            device: device.clone(),
        })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.semaphore);
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: SharedDevice,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: &SharedDevice, signaled: bool) -> VulkanResult<Self> {
        Ok(Self {
            fence: device.create_fence(signaled)?,
            device: device.clone(),
        })
    }

    /// Block until the fence is signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        self.device.wait_for_fence(self.fence, timeout)
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        self.device.reset_fence(self.fence)
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.device.destroy_fence(self.fence);
    }
}

/// Synchronization objects for one frame in flight
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready for writing
    pub image_available: Semaphore,
    /// Signaled when rendering finished, waited on by present
    pub render_finished: Semaphore,
    /// Signaled when the GPU finished this frame's submission
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the objects; the fence starts signaled so the first wait returns
    pub fn new(device: &SharedDevice) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
        })
    }
}
