//! Vulkan backend implementation
//!
//! Organized into initialization, resources, state, and rendering modules.

/// Backend error types
pub mod error;

/// Vulkan initialization types (device trait, context, surface, window)
pub mod initialization;

/// Vulkan resource management (memory, buffers, meshes, descriptors)
pub mod resources;

/// Vulkan state management (sync, render pass, swapchain)
pub mod state;

/// Frame scheduling, pipelines, command helpers and vertex layouts
pub mod rendering;

#[cfg(test)]
pub(crate) mod testing;

// Re-export error types
pub use error::{MapError, VulkanError, VulkanResult};

// Re-export initialization types
pub use initialization::context::{PhysicalDeviceInfo, VulkanContext};
pub use initialization::device::{GpuDevice, QueueFamilyIndices, SharedDevice, SurfaceSupport};
pub use initialization::window::{DrawableSurface, Window, WindowError, WindowResult};

// Re-export resource types
pub use resources::buffer::{aligned_size, GpuBuffer};
pub use resources::descriptor_set::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter,
};
pub use resources::memory::MemoryResource;
pub use resources::mesh::MeshBuffers;

// Re-export state types
pub use state::render_pass::RenderPass;
pub use state::swapchain::{AcquireResult, PresentStatus, PresentationSurface, SurfaceBuilder, MAX_FRAMES_IN_FLIGHT};
pub use state::sync::{Fence, FrameSync, Semaphore};

// Re-export rendering types
pub use rendering::commands::SingleTimeCommands;
pub use rendering::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout, ShaderModule};
pub use rendering::renderer::FrameScheduler;
pub use rendering::vertex_layout::{GlobalUbo, Vertex, VulkanVertexLayout};
