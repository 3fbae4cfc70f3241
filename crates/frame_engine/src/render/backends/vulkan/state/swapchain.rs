//! Presentation surface: swapchain, per-image attachments and frame sync
//!
//! A [`PresentationSurface`] owns one swapchain together with everything
//! sized by it: image views, one depth buffer and framebuffer per image, the
//! forward render pass, and the [`MAX_FRAMES_IN_FLIGHT`] sets of semaphores
//! and fences that pace the CPU against the GPU.
//!
//! Frame protocol:
//! 1. [`acquire_next_image`](PresentationSurface::acquire_next_image) waits on
//!    the current slot's fence, then acquires an image signaling the slot's
//!    image-available semaphore.
//! 2. [`submit_command_buffers`](PresentationSurface::submit_command_buffers)
//!    waits on whichever fence last used the acquired image, hands the image
//!    to the current slot, submits and presents, then advances the slot.
//!
//! Surfaces are never resized in place. A replacement is built with
//! [`SurfaceBuilder::previous`] pointing at the old surface so the driver can
//! recycle its images; the old surface is dropped right after.

use ash::vk;

use super::framebuffer::{create_image_view, DepthBuffer, Framebuffer};
use super::render_pass::RenderPass;
use super::sync::FrameSync;
use crate::core::PresentModePreference;
use crate::render::backends::vulkan::initialization::{SharedDevice, SurfaceSupport};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Depth formats probed at creation, most preferred first
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Outcome of an image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    /// An image is ready for this frame
    Acquired {
        /// Index of the acquired swapchain image
        image_index: u32,
        /// The chain still works but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The chain is stale and must be rebuilt before rendering
    OutOfDate,
}

/// Outcome of a present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Presented, chain matches the surface
    Optimal,
    /// Presented, but the chain should be rebuilt
    Suboptimal,
    /// Not presented, the chain must be rebuilt
    OutOfDate,
}

impl PresentStatus {
    /// Whether the chain should be rebuilt
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, PresentStatus::Optimal)
    }
}

/// Chain-level driver codes that call for a rebuild rather than an error
fn is_stale(result: vk::Result) -> bool {
    matches!(result, vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::ERROR_SURFACE_LOST_KHR)
}

/// Prefer 8-bit BGRA sRGB in the non-linear sRGB color space
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or(VulkanError::NoSurfaceFormats)
}

fn choose_present_mode(modes: &[vk::PresentModeKHR], preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::LowLatency if modes.contains(&vk::PresentModeKHR::MAILBOX) => {
            vk::PresentModeKHR::MAILBOX
        }
        // FIFO is the one mode every implementation must offer
        _ => vk::PresentModeKHR::FIFO,
    }
}

fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent
            .width
            .clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: window_extent
            .height
            .clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum (0 means no cap)
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Swapchain handle and the views onto its images
///
/// Dropped as views, then the chain.
struct SwapchainImages {
    device: SharedDevice,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
}

impl Drop for SwapchainImages {
    fn drop(&mut self) {
        for &view in &self.views {
            self.device.destroy_image_view(view);
        }
        self.device.destroy_swapchain(self.swapchain);
    }
}

/// Builder for [`PresentationSurface`]
pub struct SurfaceBuilder<'a> {
    device: SharedDevice,
    extent: vk::Extent2D,
    previous: Option<&'a PresentationSurface>,
    present_mode: PresentModePreference,
}

impl<'a> SurfaceBuilder<'a> {
    /// Start a surface for a window whose drawable area is `extent`
    pub fn new(device: &SharedDevice, extent: vk::Extent2D) -> Self {
        Self {
            device: device.clone(),
            extent,
            previous: None,
            present_mode: PresentModePreference::LowLatency,
        }
    }

    /// Surface being replaced; only borrowed for the creation call
    pub fn previous(mut self, previous: &'a PresentationSurface) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Present mode preference
    pub fn present_mode(mut self, preference: PresentModePreference) -> Self {
        self.present_mode = preference;
        self
    }

    /// Create the chain and all per-image resources
    pub fn build(self) -> VulkanResult<PresentationSurface> {
        let device = &self.device;

        // Probed first so an unsupported device fails before touching the surface
        let depth_format = device.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        } = device.surface_support()?;
        let surface_format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&present_modes, self.present_mode);
        let extent = choose_extent(&capabilities, self.extent);
        let image_count = choose_image_count(&capabilities);

        let families = device.queue_families();
        let family_indices = [families.graphics_family, families.present_family];
        let old_swapchain = self
            .previous
            .map_or(vk::SwapchainKHR::null(), |previous| previous.chain.swapchain);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);
        let create_info = if families.is_split() {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = device.create_swapchain(&create_info)?;
        let mut chain = SwapchainImages {
            device: device.clone(),
            swapchain,
            images: Vec::new(),
            views: Vec::new(),
        };
        chain.images = device.swapchain_images(swapchain)?;
        for &image in &chain.images {
            let view = create_image_view(device, image, surface_format.format, vk::ImageAspectFlags::COLOR)?;
            chain.views.push(view);
        }

        let render_pass = RenderPass::new_forward_pass(device, surface_format.format, depth_format)?;

        let depth_buffers = chain
            .images
            .iter()
            .map(|_| DepthBuffer::new(device, depth_format, extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        let framebuffers = chain
            .views
            .iter()
            .zip(&depth_buffers)
            .map(|(&view, depth)| Framebuffer::new(device, render_pass.handle(), &[view, depth.image_view()], extent))
            .collect::<VulkanResult<Vec<_>>>()?;

        let frame_syncs = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::info!(
            "Created swapchain {}x{}: {} images, {:?}, {:?}, depth {:?}",
            extent.width,
            extent.height,
            chain.images.len(),
            surface_format.format,
            present_mode,
            depth_format
        );

        Ok(PresentationSurface {
            images_in_flight: vec![None; chain.images.len()],
            chain,
            depth_buffers,
            framebuffers,
            render_pass,
            frame_syncs,
            device: self.device.clone(),
            surface_format,
            present_mode,
            depth_format,
            extent,
            current_frame: self.previous.map_or(0, |previous| previous.current_frame),
        })
    }
}

/// Swapchain with its attachments, render pass and frame synchronization
///
/// Fields drop in declaration order: image views and the chain, depth
/// resources, framebuffers, render pass, sync objects.
pub struct PresentationSurface {
    chain: SwapchainImages,
    depth_buffers: Vec<DepthBuffer>,
    framebuffers: Vec<Framebuffer>,
    render_pass: RenderPass,
    frame_syncs: Vec<FrameSync>,

    device: SharedDevice,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    /// Fence of the frame that last rendered to each image
    images_in_flight: Vec<Option<vk::Fence>>,
    current_frame: usize,
}

impl PresentationSurface {
    /// Wait for the current frame slot, then acquire the next image
    ///
    /// Returns [`AcquireResult::OutOfDate`] without touching any other state
    /// when the chain has gone stale.
    pub fn acquire_next_image(&self) -> VulkanResult<AcquireResult> {
        let sync = &self.frame_syncs[self.current_frame];
        sync.in_flight.wait(u64::MAX)?;

        match self
            .device
            .acquire_next_image(self.chain.swapchain, u64::MAX, sync.image_available.handle())
        {
            Ok((image_index, suboptimal)) => Ok(AcquireResult::Acquired { image_index, suboptimal }),
            Err(result) if is_stale(result) => Ok(AcquireResult::OutOfDate),
            Err(result) => Err(VulkanError::api("vkAcquireNextImageKHR")(result)),
        }
    }

    /// Submit `command_buffer` for `image_index`, present it and advance the frame slot
    pub fn submit_command_buffers(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<PresentStatus> {
        let image = image_index as usize;
        assert!(
            image < self.images_in_flight.len(),
            "image index {image_index} out of range for {} swapchain images",
            self.images_in_flight.len()
        );

        // Image count and frames in flight differ, so another slot may still own this image
        if let Some(fence) = self.images_in_flight[image] {
            self.device.wait_for_fence(fence, u64::MAX)?;
        }

        let sync = &self.frame_syncs[self.current_frame];
        self.images_in_flight[image] = Some(sync.in_flight.handle());

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        sync.in_flight.reset()?;
        self.device
            .queue_submit(self.device.graphics_queue(), &[submit_info], sync.in_flight.handle())?;

        let swapchains = [self.chain.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        let presented = self.device.queue_present(self.device.present_queue(), &present_info);

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;

        match presented {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(result) if is_stale(result) => Ok(PresentStatus::OutOfDate),
            Err(result) => Err(VulkanError::api("vkQueuePresentKHR")(result)),
        }
    }

    /// Whether `other` uses the same color and depth formats
    pub fn compare_formats(&self, other: &PresentationSurface) -> bool {
        self.surface_format.format == other.surface_format.format && self.depth_format == other.depth_format
    }

    /// Render pass compatible with every framebuffer of this surface
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for swapchain image `index`
    pub fn framebuffer(&self, index: u32) -> vk::Framebuffer {
        self.framebuffers[index as usize].handle()
    }

    /// Number of swapchain images (and framebuffers)
    pub fn image_count(&self) -> usize {
        self.chain.images.len()
    }

    /// Color view of swapchain image `index`
    pub fn image_view(&self, index: u32) -> vk::ImageView {
        self.chain.views[index as usize]
    }

    /// Extent the chain was created with
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Width over height of the chain extent
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Color format of the swapchain images
    pub fn image_format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Color space of the swapchain images
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }

    /// Depth attachment format, fixed for the chain's lifetime
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Present mode the chain was created with
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Frame-in-flight slot the next acquire will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Raw swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.chain.swapchain
    }
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        log::debug!("Destroying swapchain {:?}", self.chain.swapchain);
        // No frame may still be reading the attachments released below
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle before destroying swapchain: {e}");
        }
    }
}
