//! Command buffer helpers
//!
//! One-shot recording for transfers that must complete before the data is
//! used, such as staging uploads.

use ash::vk;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// A primary command buffer recorded once, submitted and waited on
pub struct SingleTimeCommands {
    device: SharedDevice,
    command_buffer: vk::CommandBuffer,
}

impl SingleTimeCommands {
    /// Allocate a command buffer from the device pool and start recording
    pub fn begin(device: &SharedDevice) -> VulkanResult<Self> {
        let command_buffer = device
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::api("vkAllocateCommandBuffers")(vk::Result::ERROR_UNKNOWN))?;

        // Constructed before begin so a failure still frees the buffer
        let commands = Self {
            device: device.clone(),
            command_buffer,
        };
        device.begin_command_buffer(command_buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        Ok(commands)
    }

    /// Buffer to record into
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// End recording, submit to the graphics queue and wait for it to drain
    pub fn submit(self) -> VulkanResult<()> {
        self.device.end_command_buffer(self.command_buffer)?;

        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();
        let queue = self.device.graphics_queue();
        self.device.queue_submit(queue, &[submit_info], vk::Fence::null())?;
        self.device.queue_wait_idle(queue)
    }
}

impl Drop for SingleTimeCommands {
    fn drop(&mut self) {
        self.device.free_command_buffers(&[self.command_buffer]);
    }
}
