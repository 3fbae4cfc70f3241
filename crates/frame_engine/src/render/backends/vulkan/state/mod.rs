// Vulkan state management: synchronization, render pass, swapchain

pub mod framebuffer;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use framebuffer::{create_image_view, DepthBuffer, Framebuffer};
pub use render_pass::RenderPass;
pub use swapchain::{
    AcquireResult, PresentStatus, PresentationSurface, SurfaceBuilder, DEPTH_FORMAT_CANDIDATES, MAX_FRAMES_IN_FLIGHT,
};
pub use sync::{Fence, FrameSync, Semaphore};
