//! Frame scheduling
//!
//! [`FrameScheduler`] drives the acquire, record, submit and present cycle
//! on top of a [`PresentationSurface`]. It owns one primary command buffer
//! per frame in flight and rebuilds the surface whenever the chain goes
//! stale or the window reports a resize.
//!
//! ```no_run
//! # use frame_engine::render::backends::vulkan::*;
//! # fn frame(scheduler: &mut FrameScheduler, window: &mut Window) -> VulkanResult<()> {
//! if let Some(command_buffer) = scheduler.begin_frame(window)? {
//!     scheduler.begin_render_pass(command_buffer);
//!     // record draws
//!     scheduler.end_render_pass(command_buffer);
//!     scheduler.end_frame(window)?;
//! }
//! # Ok(())
//! # }
//! ```

use ash::vk;

use crate::core::{PresentModePreference, RendererConfig};
use crate::render::backends::vulkan::initialization::{DrawableSurface, SharedDevice};
use crate::render::backends::vulkan::state::{AcquireResult, PresentationSurface, SurfaceBuilder, MAX_FRAMES_IN_FLIGHT};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Per-frame orchestration over the presentation surface
pub struct FrameScheduler {
    device: SharedDevice,
    command_buffers: Vec<vk::CommandBuffer>,
    surface: PresentationSurface,
    surface_generation: u64,

    present_mode: PresentModePreference,
    clear_color: [f32; 4],
    depth_clear: f32,

    current_image_index: u32,
    current_frame_index: usize,
    is_frame_started: bool,
}

impl FrameScheduler {
    /// Build the first surface once the window has a drawable area, and
    /// allocate the per-frame command buffers
    pub fn new(device: &SharedDevice, window: &mut dyn DrawableSurface, config: &RendererConfig) -> VulkanResult<Self> {
        log::debug!("Creating FrameScheduler...");

        let extent = wait_for_drawable_extent(window);
        let surface = SurfaceBuilder::new(device, extent)
            .present_mode(config.present_mode)
            .build()?;
        let command_buffers = device.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)?;

        log::debug!("FrameScheduler created with {} frames in flight", command_buffers.len());
        Ok(Self {
            device: device.clone(),
            command_buffers,
            surface,
            surface_generation: 0,
            present_mode: config.present_mode,
            clear_color: config.clear_color,
            depth_clear: config.depth_clear,
            current_image_index: 0,
            current_frame_index: 0,
            is_frame_started: false,
        })
    }

    /// Acquire an image and start recording this frame's command buffer
    ///
    /// Returns `None` when the chain was stale and has been rebuilt; the
    /// caller skips rendering for this tick.
    ///
    /// # Panics
    /// When a frame is already in progress.
    pub fn begin_frame(&mut self, window: &mut dyn DrawableSurface) -> VulkanResult<Option<vk::CommandBuffer>> {
        assert!(!self.is_frame_started, "Can't call begin_frame while a frame is already in progress");

        match self.surface.acquire_next_image()? {
            AcquireResult::OutOfDate => {
                log::debug!("Swapchain out of date on acquire, rebuilding");
                self.recreate_surface(window)?;
                return Ok(None);
            }
            AcquireResult::Acquired { image_index, suboptimal } => {
                if suboptimal {
                    log::trace!("Acquired image {image_index} from a suboptimal swapchain");
                }
                self.current_image_index = image_index;
            }
        }

        let command_buffer = self.command_buffers[self.current_frame_index];
        self.device
            .begin_command_buffer(command_buffer, vk::CommandBufferUsageFlags::empty())?;
        self.is_frame_started = true;
        Ok(Some(command_buffer))
    }

    /// Finish recording, submit and present, then advance the frame slot
    ///
    /// # Panics
    /// When no frame is in progress.
    pub fn end_frame(&mut self, window: &mut dyn DrawableSurface) -> VulkanResult<()> {
        assert!(self.is_frame_started, "Can't call end_frame while frame is not in progress");
        self.is_frame_started = false;

        let command_buffer = self.command_buffers[self.current_frame_index];
        self.device.end_command_buffer(command_buffer)?;
        let status = self
            .surface
            .submit_command_buffers(command_buffer, self.current_image_index)?;
        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;

        if status.needs_rebuild() || window.was_resized() {
            log::debug!("Rebuilding swapchain after present ({status:?}, resized: {})", window.was_resized());
            window.reset_resized_flag();
            self.recreate_surface(window)?;
        }
        Ok(())
    }

    /// Begin the forward pass on the current image's framebuffer and set the
    /// dynamic viewport and scissor to the swapchain extent
    ///
    /// # Panics
    /// When no frame is in progress or `command_buffer` is not this frame's.
    pub fn begin_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.is_frame_started, "Can't begin render pass when frame not in progress");
        assert!(
            command_buffer == self.command_buffers[self.current_frame_index],
            "Can't begin render pass on command buffer from a different frame"
        );

        let extent = self.surface.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.depth_clear,
                    stencil: 0,
                },
            },
        ];
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(self.surface.render_pass())
            .framebuffer(self.surface.framebuffer(self.current_image_index))
            .render_area(render_area)
            .clear_values(&clear_values);
        self.device.cmd_begin_render_pass(command_buffer, &begin_info);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(command_buffer, &viewport);
        self.device.cmd_set_scissor(command_buffer, &render_area);
    }

    /// End the forward pass
    ///
    /// # Panics
    /// When no frame is in progress or `command_buffer` is not this frame's.
    pub fn end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(self.is_frame_started, "Can't end render pass when frame not in progress");
        assert!(
            command_buffer == self.command_buffers[self.current_frame_index],
            "Can't end render pass on command buffer from a different frame"
        );
        self.device.cmd_end_render_pass(command_buffer);
    }

    /// Replace the surface with one matching the window's current extent
    ///
    /// Blocks on window events while the window is minimized. Fails with
    /// [`VulkanError::FormatChanged`] if the new chain picked different
    /// color or depth formats.
    pub fn recreate_surface(&mut self, window: &mut dyn DrawableSurface) -> VulkanResult<()> {
        let extent = wait_for_drawable_extent(window);
        self.device.wait_idle()?;

        let surface = SurfaceBuilder::new(&self.device, extent)
            .previous(&self.surface)
            .present_mode(self.present_mode)
            .build()?;
        if !surface.compare_formats(&self.surface) {
            return Err(VulkanError::FormatChanged {
                old_color: self.surface.image_format(),
                new_color: surface.image_format(),
                old_depth: self.surface.depth_format(),
                new_depth: surface.depth_format(),
            });
        }

        // The retired chain is destroyed here, after its successor exists
        self.surface = surface;
        self.surface_generation += 1;
        Ok(())
    }

    /// Render pass that pipelines must be compatible with
    pub fn render_pass(&self) -> vk::RenderPass {
        self.surface.render_pass()
    }

    /// Number of successful surface rebuilds so far
    ///
    /// Objects sized or created against the old surface are rebuilt when
    /// this changes; the device is idle at that point.
    pub fn surface_generation(&self) -> u64 {
        self.surface_generation
    }

    /// Extent of the current swapchain
    pub fn extent(&self) -> vk::Extent2D {
        self.surface.extent()
    }

    /// Width over height of the current swapchain
    pub fn aspect_ratio(&self) -> f32 {
        self.surface.aspect_ratio()
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.surface.image_count()
    }

    /// Current presentation surface
    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    /// Whether `begin_frame` returned a command buffer that `end_frame` has not yet submitted
    pub fn is_frame_in_progress(&self) -> bool {
        self.is_frame_started
    }

    /// Frame-in-flight slot, in `0..MAX_FRAMES_IN_FLIGHT`
    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    /// Swapchain image acquired by the last successful `begin_frame`
    pub fn current_image_index(&self) -> u32 {
        self.current_image_index
    }

    /// Command buffer being recorded for the current frame
    ///
    /// # Panics
    /// When no frame is in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(self.is_frame_started, "Cannot get command buffer when frame not in progress");
        self.command_buffers[self.current_frame_index]
    }

    /// Block until the GPU has finished all submitted frames
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.device.wait_idle()
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        log::debug!("Dropping FrameScheduler...");
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during FrameScheduler drop: {e}");
        }
        self.device.free_command_buffers(&self.command_buffers);
    }
}

/// Current drawable extent, waiting on window events while it is zero
fn wait_for_drawable_extent(window: &mut dyn DrawableSurface) -> vk::Extent2D {
    let mut extent = window.current_drawable_extent();
    while extent.width == 0 || extent.height == 0 {
        window.wait_for_next_event();
        extent = window.current_drawable_extent();
    }
    extent
}
