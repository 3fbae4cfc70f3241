//! Vulkan context management
//!
//! Instance, debug messenger, physical device selection, logical device and
//! the graphics command pool. [`VulkanContext`] is the production
//! [`GpuDevice`]: everything above this module reaches the driver through it.

use std::collections::HashSet;
use std::ffi::{c_char, c_void, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device, Entry, Instance};

use super::device::{GpuDevice, QueueFamilyIndices, SurfaceSupport};
use super::surface::WindowSurface;
use super::window::Window;
use crate::core::RendererConfig;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"frame_engine";

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance with the extensions GLFW needs, plus validation when enabled
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        // SAFETY: loading the system Vulkan library has no preconditions
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains NUL".to_string()))?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;
        let extension_names = required_extensions
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("Extension name contains NUL".to_string()))?;

        let validation = config.validation_enabled();
        let mut extensions: Vec<*const c_char> = extension_names.iter().map(|ext| ext.as_ptr()).collect();
        let mut layers: Vec<*const c_char> = Vec::new();
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
            layers.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: every pointer in create_info outlives this call
        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(VulkanError::api("vkCreateInstance"))?;

        let debug = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    // SAFETY: nothing else was created from this instance yet
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!(
            "Created Vulkan instance for '{}' (validation {})",
            config.application_name,
            if validation { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug })
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        // SAFETY: the callback is a plain function with 'static lifetime
        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(VulkanError::api("vkCreateDebugUtilsMessengerEXT"))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        // SAFETY: devices and surfaces created from this instance were dropped first
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Routes validation-layer messages into `log`
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Graphics and present family indices
    pub families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Pick the first device with graphics + present queues and swapchain support
    pub fn select_suitable_device(instance: &Instance, surface: &WindowSurface) -> VulkanResult<Self> {
        // SAFETY: instance is valid
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(VulkanError::api("vkEnumeratePhysicalDevices"))?;

        for device in devices {
            match Self::evaluate_device(instance, device, surface) {
                Ok(info) => {
                    // SAFETY: device_name is NUL-terminated by the driver
                    let name = unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()) };
                    log::info!("Selected GPU: {}", name.to_string_lossy());
                    return Ok(info);
                }
                Err(e) => log::debug!("Skipping physical device: {e}"),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(instance: &Instance, device: vk::PhysicalDevice, surface: &WindowSurface) -> VulkanResult<Self> {
        // SAFETY: device was enumerated from this instance
        let (properties, memory_properties, queue_families) = unsafe {
            (
                instance.get_physical_device_properties(device),
                instance.get_physical_device_memory_properties(device),
                instance.get_physical_device_queue_family_properties(device),
            )
        };

        let mut graphics_family = None;
        let mut present_family = None;
        for (index, family) in (0u32..).zip(queue_families.iter()) {
            if graphics_family.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics_family = Some(index);
            }
            if present_family.is_none() && surface.supports_present(device, index)? {
                present_family = Some(index);
            }
            if graphics_family.is_some() && present_family.is_some() {
                break;
            }
        }

        let graphics_family = graphics_family
            .ok_or_else(|| VulkanError::InitializationFailed("No graphics queue family found".to_string()))?;
        let present_family = present_family
            .ok_or_else(|| VulkanError::InitializationFailed("No present queue family found".to_string()))?;

        // SAFETY: as above
        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(VulkanError::api("vkEnumerateDeviceExtensionProperties"))?;
        let has_swapchain = extensions.iter().any(|available| {
            // SAFETY: extension_name is NUL-terminated by the driver
            (unsafe { CStr::from_ptr(available.extension_name.as_ptr()) }) == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err(VulkanError::InitializationFailed(
                "VK_KHR_swapchain not supported".to_string(),
            ));
        }

        let support = surface.support(device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "Surface offers no formats or present modes".to_string(),
            ));
        }

        Ok(Self {
            device,
            properties,
            memory_properties,
            families: QueueFamilyIndices {
                graphics_family,
                present_family,
            },
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per unique family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device.families;
        let unique_families: HashSet<u32> = [families.graphics_family, families.present_family].into_iter().collect();

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        // SAFETY: every pointer in create_info outlives this call
        let device = unsafe { instance.create_device(physical_device.device, &create_info, None) }
            .map_err(VulkanError::api("vkCreateDevice"))?;

        // SAFETY: both families were requested above with one queue each
        let (graphics_queue, present_queue) = unsafe {
            (
                device.get_device_queue(families.graphics_family, 0),
                device.get_device_queue(families.present_family, 0),
            )
        };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        // SAFETY: owners of device children drop before the context
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Field order is drop order: device, then surface, then instance.
pub struct VulkanContext {
    command_pool: vk::CommandPool,
    /// Logical device for operations
    pub device: LogicalDevice,
    /// Selected physical device information
    pub physical_device: PhysicalDeviceInfo,
    /// Window surface
    pub surface: WindowSurface,
    /// Vulkan instance and debug utilities
    pub instance: VulkanInstance,
}

impl VulkanContext {
    /// Bootstrap Vulkan for `window`
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;
        let surface = WindowSurface::new(&instance.entry, &instance.instance, window)?;
        let physical_device = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device)?;

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(physical_device.families.graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER | vk::CommandPoolCreateFlags::TRANSIENT);
        // SAFETY: device is valid
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .map_err(VulkanError::api("vkCreateCommandPool"))?;

        log::debug!(
            "Queue families: graphics {}, present {}",
            physical_device.families.graphics_family,
            physical_device.families.present_family
        );

        Ok(Self {
            command_pool,
            device,
            physical_device,
            surface,
            instance,
        })
    }

    /// Raw `ash` device
    pub fn raw_device(&self) -> &Device {
        &self.device.device
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        // SAFETY: all command buffers from this pool were freed by their owners
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.device.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

impl GpuDevice for VulkanContext {
    fn limits(&self) -> vk::PhysicalDeviceLimits {
        self.physical_device.properties.limits
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        let memory = &self.physical_device.memory_properties;
        (0..memory.memory_type_count)
            .find(|&i| {
                type_filter & (1 << i) != 0 && memory.memory_types[i as usize].property_flags.contains(properties)
            })
            .ok_or(VulkanError::NoSuitableMemoryType)
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        // SAFETY: physical device belongs to this instance
        unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    fn surface_support(&self) -> VulkanResult<SurfaceSupport> {
        self.surface.support(self.physical_device.device)
    }

    fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle()
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.families
    }

    fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        // SAFETY: device is valid
        unsafe { self.device.device.device_wait_idle() }.map_err(VulkanError::api("vkDeviceWaitIdle"))
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer> {
        unsafe { self.device.device.create_buffer(info, None) }.map_err(VulkanError::api("vkCreateBuffer"))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.device.destroy_buffer(buffer, None) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VulkanResult<()> {
        unsafe { self.device.device.bind_buffer_memory(buffer, memory, offset) }
            .map_err(VulkanError::api("vkBindBufferMemory"))
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image> {
        unsafe { self.device.device.create_image(info, None) }.map_err(VulkanError::api("vkCreateImage"))
    }

    fn destroy_image(&self, image: vk::Image) {
        unsafe { self.device.device.destroy_image(image, None) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.device.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VulkanResult<()> {
        unsafe { self.device.device.bind_image_memory(image, memory, offset) }
            .map_err(VulkanError::api("vkBindImageMemory"))
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView> {
        unsafe { self.device.device.create_image_view(info, None) }.map_err(VulkanError::api("vkCreateImageView"))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.device.destroy_image_view(view, None) }
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VulkanResult<vk::DeviceMemory> {
        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        unsafe { self.device.device.allocate_memory(&info, None) }.map_err(VulkanError::api("vkAllocateMemory"))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.device.free_memory(memory, None) }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VulkanResult<*mut c_void> {
        unsafe {
            self.device
                .device
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
        }
        .map_err(VulkanError::api("vkMapMemory"))
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.device.unmap_memory(memory) }
    }

    fn flush_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()> {
        unsafe { self.device.device.flush_mapped_memory_ranges(std::slice::from_ref(range)) }
            .map_err(VulkanError::api("vkFlushMappedMemoryRanges"))
    }

    fn invalidate_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()> {
        unsafe { self.device.device.invalidate_mapped_memory_ranges(std::slice::from_ref(range)) }
            .map_err(VulkanError::api("vkInvalidateMappedMemoryRanges"))
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VulkanResult<vk::SwapchainKHR> {
        unsafe { self.device.swapchain_loader.create_swapchain(info, None) }
            .map_err(VulkanError::api("vkCreateSwapchainKHR"))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>> {
        unsafe { self.device.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::api("vkGetSwapchainImagesKHR"))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.device.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.device
                .swapchain_loader
                .acquire_next_image(swapchain, timeout, semaphore, vk::Fence::null())
        }
    }

    fn queue_present(&self, queue: vk::Queue, info: &vk::PresentInfoKHR) -> Result<bool, vk::Result> {
        unsafe { self.device.swapchain_loader.queue_present(queue, info) }
    }

    fn create_shader_module(&self, info: &vk::ShaderModuleCreateInfo) -> VulkanResult<vk::ShaderModule> {
        unsafe { self.device.device.create_shader_module(info, None) }.map_err(VulkanError::api("vkCreateShaderModule"))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device.device.destroy_shader_module(module, None) }
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout> {
        unsafe { self.device.device.create_pipeline_layout(info, None) }
            .map_err(VulkanError::api("vkCreatePipelineLayout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.device.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(info), None)
        }
        .map_err(|(_, result)| VulkanError::api("vkCreateGraphicsPipelines")(result))?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("vkCreateGraphicsPipelines returned no pipeline".into()))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.device.destroy_pipeline(pipeline, None) }
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass> {
        unsafe { self.device.device.create_render_pass(info, None) }.map_err(VulkanError::api("vkCreateRenderPass"))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.device.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer> {
        unsafe { self.device.device.create_framebuffer(info, None) }.map_err(VulkanError::api("vkCreateFramebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.device.create_semaphore(&info, None) }.map_err(VulkanError::api("vkCreateSemaphore"))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { self.device.device.create_fence(&info, None) }.map_err(VulkanError::api("vkCreateFence"))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.device.destroy_fence(fence, None) }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.device.wait_for_fences(&[fence], true, timeout) }
            .map_err(VulkanError::api("vkWaitForFences"))
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.device.device.reset_fences(&[fence]) }.map_err(VulkanError::api("vkResetFences"))
    }

    fn queue_submit(&self, queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        unsafe { self.device.device.queue_submit(queue, submits, fence) }.map_err(VulkanError::api("vkQueueSubmit"))
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VulkanResult<()> {
        unsafe { self.device.device.queue_wait_idle(queue) }.map_err(VulkanError::api("vkQueueWaitIdle"))
    }

    fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);
        unsafe { self.device.device.allocate_command_buffers(&info) }
            .map_err(VulkanError::api("vkAllocateCommandBuffers"))
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.device.free_command_buffers(self.command_pool, buffers) }
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        let info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device.device.begin_command_buffer(buffer, &info) }
            .map_err(VulkanError::api("vkBeginCommandBuffer"))
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe { self.device.device.end_command_buffer(buffer) }.map_err(VulkanError::api("vkEndCommandBuffer"))
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo) {
        unsafe {
            self.device
                .device
                .cmd_begin_render_pass(buffer, info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        unsafe { self.device.device.cmd_end_render_pass(buffer) }
    }

    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .device
                .cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.device.cmd_bind_descriptor_sets(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                dynamic_offsets,
            );
        }
    }

    fn cmd_push_constants(
        &self,
        buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe { self.device.device.cmd_push_constants(buffer, layout, stages, offset, data) }
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        unsafe { self.device.device.cmd_set_viewport(buffer, 0, std::slice::from_ref(viewport)) }
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        unsafe { self.device.device.cmd_set_scissor(buffer, 0, std::slice::from_ref(scissor)) }
    }

    fn cmd_copy_buffer(&self, buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe { self.device.device.cmd_copy_buffer(buffer, src, dst, regions) }
    }

    fn cmd_bind_vertex_buffers(
        &self,
        buffer: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device
                .device
                .cmd_bind_vertex_buffers(buffer, first_binding, buffers, offsets);
        }
    }

    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .device
                .cmd_bind_index_buffer(buffer, index_buffer, offset, index_type);
        }
    }

    fn cmd_draw(
        &self,
        buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device
                .device
                .cmd_draw(buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
    }

    fn cmd_draw_indexed(
        &self,
        buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.device.cmd_draw_indexed(
                buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        unsafe { self.device.device.create_descriptor_set_layout(info, None) }
            .map_err(VulkanError::api("vkCreateDescriptorSetLayout"))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.device.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool> {
        unsafe { self.device.device.create_descriptor_pool(info, None) }
            .map_err(VulkanError::api("vkCreateDescriptorPool"))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.device.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        unsafe { self.device.device.allocate_descriptor_sets(info) }
    }

    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        unsafe { self.device.device.free_descriptor_sets(pool, sets) }
            .map_err(VulkanError::api("vkFreeDescriptorSets"))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(VulkanError::api("vkResetDescriptorPool"))
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe { self.device.device.update_descriptor_sets(writes, &[]) }
    }
}
