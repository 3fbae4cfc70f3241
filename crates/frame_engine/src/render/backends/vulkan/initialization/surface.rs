//! Vulkan surface management
//!
//! Owns the platform surface created through the window and answers the
//! per-physical-device presentation queries.

use ash::{extensions::khr, vk};

use super::device::SurfaceSupport;
use super::window::Window;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Window surface with RAII cleanup
pub struct WindowSurface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl WindowSurface {
    /// Create the platform surface for `window`
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, window: &Window) -> VulkanResult<Self> {
        let surface_loader = khr::Surface::new(entry, instance);
        let surface = window
            .create_vulkan_surface(instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        Ok(Self { surface_loader, surface })
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Capabilities, formats and present modes in one query
    pub fn support(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<SurfaceSupport> {
        // SAFETY: the surface and physical device outlive the calls
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(physical_device, self.surface)
                    .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(physical_device, self.surface)
                    .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)
                    .map_err(VulkanError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
            })
        }
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> VulkanResult<bool> {
        // SAFETY: as above
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(VulkanError::api("vkGetPhysicalDeviceSurfaceSupportKHR"))
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        log::debug!("Destroying window surface");
        // SAFETY: every swapchain created on this surface is gone by now
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
