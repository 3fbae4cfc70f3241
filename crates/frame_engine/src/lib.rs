//! # Frame Engine
//!
//! Presentation and frame synchronization on top of Vulkan.
//!
//! ## Features
//!
//! - **Swapchain Lifecycle**: creation, depth and framebuffer provisioning, rebuild on resize or staleness
//! - **Frame Pacing**: two frames in flight guarded by fences and semaphores
//! - **GPU Buffers**: aligned per-instance records, host mapping, staging uploads
//! - **Descriptors**: layout builder, fixed-size pools, batched writes
//! - **Pipelines**: SPIR-V shader modules, graphics pipelines with dynamic viewport and scissor
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frame_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     frame_engine::foundation::logging::init_with_level(&config.engine.log_level);
//!
//!     let mut window = Window::new(&config.window)?;
//!     let device: SharedDevice = Arc::new(VulkanContext::new(&window, &config.renderer)?);
//!     let mut scheduler = FrameScheduler::new(&device, &mut window, &config.renderer)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if let Some(command_buffer) = scheduler.begin_frame(&mut window)? {
//!             scheduler.begin_render_pass(command_buffer);
//!             scheduler.end_render_pass(command_buffer);
//!             scheduler.end_frame(&mut window)?;
//!         }
//!     }
//!     scheduler.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::{ApplicationConfig, EngineConfig, PresentModePreference, RendererConfig, ShaderConfig, WindowConfig},
        render::backends::vulkan::{
            AcquireResult, DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
            DescriptorWriter, DrawableSurface, FrameScheduler, GlobalUbo, GpuBuffer, GpuDevice, GraphicsPipeline,
            MeshBuffers, PipelineConfig, PipelineLayout, PresentStatus, PresentationSurface, SharedDevice,
            ShaderModule, Vertex, VulkanContext, VulkanError, VulkanResult, Window, MAX_FRAMES_IN_FLIGHT,
        },
    };
}
