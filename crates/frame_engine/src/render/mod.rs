//! Rendering
//!
//! The presentation and synchronization engine lives in the Vulkan backend;
//! the most used types are re-exported here.

pub mod backends;

pub use backends::vulkan::{
    FrameScheduler, GpuBuffer, PresentationSurface, VulkanContext, VulkanError, VulkanResult, Window,
    MAX_FRAMES_IN_FLIGHT,
};
