//! Framebuffer and depth attachment management

use ash::vk;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::resources::MemoryResource;
use crate::render::backends::vulkan::VulkanResult;

/// Create a single-mip 2D view of `image`
pub fn create_image_view(
    device: &SharedDevice,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    device.create_image_view(&create_info)
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: SharedDevice,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments` for `render_pass`
    pub fn new(
        device: &SharedDevice,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        Ok(Self {
            framebuffer: device.create_framebuffer(&create_info)?,
            device: device.clone(),
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.device.destroy_framebuffer(self.framebuffer);
    }
}

/// Depth image, its memory and view
///
/// Dropped as view, image, then memory.
pub struct DepthBuffer {
    device: SharedDevice,
    image_view: vk::ImageView,
    image: vk::Image,
    memory: MemoryResource,
    format: vk::Format,
}

impl DepthBuffer {
    /// Create a device-local depth attachment of `extent`
    pub fn new(device: &SharedDevice, format: vk::Format, extent: vk::Extent2D) -> VulkanResult<Self> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let image = device.create_image(&image_info)?;

        let memory = MemoryResource::allocate(
            device,
            device.image_memory_requirements(image),
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .and_then(|memory| {
            device.bind_image_memory(image, memory.handle(), 0)?;
            Ok(memory)
        });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_image(image);
                return Err(e);
            }
        };

        let image_view = match create_image_view(device, image, format, vk::ImageAspectFlags::DEPTH) {
            Ok(view) => view,
            Err(e) => {
                device.destroy_image(image);
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            image_view,
            image,
            memory,
            format,
        })
    }

    /// Depth image view for framebuffer attachment
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Depth image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Depth format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Backing memory
    pub fn memory(&self) -> &MemoryResource {
        &self.memory
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        self.device.destroy_image_view(self.image_view);
        self.device.destroy_image(self.image);
    }
}
