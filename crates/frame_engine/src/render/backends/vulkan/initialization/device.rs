//! Device collaborator interface
//!
//! Everything above the bootstrap layer talks to the GPU through
//! [`GpuDevice`]. [`VulkanContext`](super::VulkanContext) implements it on top
//! of `ash`; tests implement it in host memory. The trait mirrors the raw
//! entry points one-to-one, so the RAII wrappers in `resources` and `state`
//! keep the exact call order they would have against `ash::Device`.

use std::ffi::c_void;
use std::sync::Arc;

use ash::vk;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Device shared by every resource created from it
pub type SharedDevice = Arc<dyn GpuDevice>;

/// Surface properties queried from the physical device
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Offered format / color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Offered present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Queue family indices used for rendering and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family that owns the graphics queue
    pub graphics_family: u32,
    /// Family that owns the present queue
    pub present_family: u32,
}

impl QueueFamilyIndices {
    /// Whether graphics and presentation use different families
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }
}

/// Logical device, queues and physical-device queries
///
/// Implementations must stay valid for as long as any resource created
/// through them is alive; resources hold a [`SharedDevice`] to guarantee it.
pub trait GpuDevice {
    // --- physical device queries ---

    /// Device limits (offset alignments, max extents, ...)
    fn limits(&self) -> vk::PhysicalDeviceLimits;

    /// First memory type allowed by `type_filter` that has all of `properties`
    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32>;

    /// Format feature support
    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    /// First candidate whose `tiling` features contain `features`
    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> VulkanResult<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|&format| {
                let props = self.format_properties(format);
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| VulkanError::UnsupportedFormat {
                candidates: candidates.to_vec(),
            })
    }

    /// Capabilities, formats and present modes of the window surface
    fn surface_support(&self) -> VulkanResult<SurfaceSupport>;

    /// Platform surface the swapchain presents to
    fn surface(&self) -> vk::SurfaceKHR;

    /// Graphics / present family indices
    fn queue_families(&self) -> QueueFamilyIndices;

    /// Graphics queue
    fn graphics_queue(&self) -> vk::Queue;

    /// Present queue
    fn present_queue(&self) -> vk::Queue;

    /// Command pool on the graphics family (resettable buffers)
    fn command_pool(&self) -> vk::CommandPool;

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> VulkanResult<()>;

    // --- buffers, images and memory ---

    /// `vkCreateBuffer`
    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer>;
    /// `vkDestroyBuffer`
    fn destroy_buffer(&self, buffer: vk::Buffer);
    /// `vkGetBufferMemoryRequirements`
    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;
    /// `vkBindBufferMemory`
    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VulkanResult<()>;

    /// `vkCreateImage`
    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image>;
    /// `vkDestroyImage`
    fn destroy_image(&self, image: vk::Image);
    /// `vkGetImageMemoryRequirements`
    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements;
    /// `vkBindImageMemory`
    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VulkanResult<()>;

    /// `vkCreateImageView`
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView>;
    /// `vkDestroyImageView`
    fn destroy_image_view(&self, view: vk::ImageView);

    /// `vkAllocateMemory`
    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VulkanResult<vk::DeviceMemory>;
    /// `vkFreeMemory`
    fn free_memory(&self, memory: vk::DeviceMemory);
    /// `vkMapMemory`
    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VulkanResult<*mut c_void>;
    /// `vkUnmapMemory`
    fn unmap_memory(&self, memory: vk::DeviceMemory);
    /// `vkFlushMappedMemoryRanges` for a single range
    fn flush_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()>;
    /// `vkInvalidateMappedMemoryRanges` for a single range
    fn invalidate_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()>;

    // --- swapchain ---

    /// `vkCreateSwapchainKHR`
    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VulkanResult<vk::SwapchainKHR>;
    /// `vkGetSwapchainImagesKHR`
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>>;
    /// `vkDestroySwapchainKHR`
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    /// `vkAcquireNextImageKHR`; `Ok((index, suboptimal))` or the raw status
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result>;
    /// `vkQueuePresentKHR`; `Ok(suboptimal)` or the raw status
    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> Result<bool, vk::Result>;

    // --- render pass and framebuffers ---

    /// `vkCreateRenderPass`
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass>;
    /// `vkDestroyRenderPass`
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);
    /// `vkCreateFramebuffer`
    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer>;
    /// `vkDestroyFramebuffer`
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // --- pipelines ---

    /// `vkCreateShaderModule`
    fn create_shader_module(&self, info: &vk::ShaderModuleCreateInfo) -> VulkanResult<vk::ShaderModule>;
    /// `vkDestroyShaderModule`
    fn destroy_shader_module(&self, module: vk::ShaderModule);
    /// `vkCreatePipelineLayout`
    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout>;
    /// `vkDestroyPipelineLayout`
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    /// `vkCreateGraphicsPipelines` for a single pipeline without a cache
    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline>;
    /// `vkDestroyPipeline`
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // --- synchronization ---

    /// `vkCreateSemaphore`
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;
    /// `vkDestroySemaphore`
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);
    /// `vkCreateFence`
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;
    /// `vkDestroyFence`
    fn destroy_fence(&self, fence: vk::Fence);
    /// `vkWaitForFences` on a single fence
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VulkanResult<()>;
    /// `vkResetFences` on a single fence
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;
    /// `vkQueueSubmit`
    fn queue_submit(&self, queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()>;
    /// `vkQueueWaitIdle`
    fn queue_wait_idle(&self, queue: vk::Queue) -> VulkanResult<()>;

    // --- command buffers ---

    /// `vkAllocateCommandBuffers` (primary level, from [`GpuDevice::command_pool`])
    fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>>;
    /// `vkFreeCommandBuffers`
    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]);
    /// `vkBeginCommandBuffer`
    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()>;
    /// `vkEndCommandBuffer`
    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()>;
    /// `vkCmdBeginRenderPass` with inline contents
    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo);
    /// `vkCmdEndRenderPass`
    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer);
    /// `vkCmdSetViewport` for viewport 0
    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport);
    /// `vkCmdSetScissor` for scissor 0
    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D);
    /// `vkCmdCopyBuffer`
    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);
    /// `vkCmdBindVertexBuffers`
    fn cmd_bind_vertex_buffers(
        &self,
        buffer: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );
    /// `vkCmdBindIndexBuffer`
    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );
    /// `vkCmdDraw`
    fn cmd_draw(
        &self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    /// `vkCmdDrawIndexed`
    fn cmd_draw_indexed(
        &self,
        buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    /// `vkCmdBindPipeline` at the graphics bind point
    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline);
    /// `vkCmdBindDescriptorSets` at the graphics bind point
    fn cmd_bind_descriptor_sets(
        &self,
        buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
    /// `vkCmdPushConstants`
    fn cmd_push_constants(
        &self,
        buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    // --- descriptors ---

    /// `vkCreateDescriptorSetLayout`
    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VulkanResult<vk::DescriptorSetLayout>;
    /// `vkDestroyDescriptorSetLayout`
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    /// `vkCreateDescriptorPool`
    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool>;
    /// `vkDestroyDescriptorPool`
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// `vkAllocateDescriptorSets`; the raw status is kept so exhaustion can be told apart
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result>;
    /// `vkFreeDescriptorSets`
    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()>;
    /// `vkResetDescriptorPool`
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()>;
    /// `vkUpdateDescriptorSets` (writes only)
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]);
}
