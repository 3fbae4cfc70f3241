//! Host-memory stand-ins for the device and window collaborators
//!
//! [`MockDevice`] implements [`GpuDevice`] without a GPU: handles are unique
//! integers, device memory is a host byte array (so mapped writes can be read
//! back), fences follow a small state machine and every destroy or recorded
//! command is appended to an ordered event log.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::{c_void, CStr};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::vk::{self, Handle};

use crate::render::backends::vulkan::initialization::{DrawableSurface, GpuDevice, QueueFamilyIndices, SurfaceSupport};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Memory types exposed by the mock, indexed by memory type index
const MEMORY_TYPES: [vk::MemoryPropertyFlags; 3] = [
    vk::MemoryPropertyFlags::DEVICE_LOCAL,
    vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
    ),
    vk::MemoryPropertyFlags::from_raw(
        vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_CACHED.as_raw(),
    ),
];

/// Something the code under test did to the device, in call order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockEvent {
    DestroyImageView(vk::ImageView),
    DestroySwapchain(vk::SwapchainKHR),
    DestroyImage(vk::Image),
    FreeMemory(vk::DeviceMemory),
    DestroyBuffer(vk::Buffer),
    UnmapMemory(vk::DeviceMemory),
    DestroyFramebuffer(vk::Framebuffer),
    DestroyRenderPass(vk::RenderPass),
    DestroySemaphore(vk::Semaphore),
    DestroyFence(vk::Fence),
    DestroyDescriptorPool(vk::DescriptorPool),
    DestroyDescriptorSetLayout(vk::DescriptorSetLayout),
    DestroyShaderModule(vk::ShaderModule),
    DestroyPipelineLayout(vk::PipelineLayout),
    DestroyPipeline(vk::Pipeline),
    FlushRange { memory: vk::DeviceMemory, offset: u64, size: u64 },
    InvalidateRange { memory: vk::DeviceMemory, offset: u64, size: u64 },
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    BeginRenderPass { command_buffer: vk::CommandBuffer, framebuffer: vk::Framebuffer, width: u32, height: u32 },
    EndRenderPass(vk::CommandBuffer),
    SetViewport { command_buffer: vk::CommandBuffer, width: f32, height: f32, min_depth: f32, max_depth: f32 },
    SetScissor { command_buffer: vk::CommandBuffer, width: u32, height: u32 },
    CopyBuffer { src: vk::Buffer, dst: vk::Buffer, size: u64 },
    BindVertexBuffers { command_buffer: vk::CommandBuffer, buffer: vk::Buffer },
    BindIndexBuffer { command_buffer: vk::CommandBuffer, buffer: vk::Buffer },
    BindPipeline { command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline },
    BindDescriptorSets {
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        set: vk::DescriptorSet,
    },
    PushConstants { command_buffer: vk::CommandBuffer, offset: u32, size: u32 },
    Draw { vertex_count: u32 },
    DrawIndexed { index_count: u32 },
    Submit { command_buffer: vk::CommandBuffer, fence: vk::Fence },
    Present { image_index: u32 },
    UpdateDescriptorSets { writes: usize },
    FreeCommandBuffers { count: usize },
    QueueWaitIdle,
    WaitIdle,
}

/// Fence lifecycle as the mock sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    /// Reset and not yet submitted
    Unsignaled,
    /// Submitted, GPU work outstanding
    Pending,
    /// Work finished (or created signaled)
    Signaled,
}

/// Parameters of one `vkCreateSwapchainKHR` call
#[derive(Debug, Clone, Copy)]
pub struct SwapchainCreation {
    pub handle: vk::SwapchainKHR,
    pub old_swapchain: vk::SwapchainKHR,
    pub image_format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub width: u32,
    pub height: u32,
    pub min_image_count: u32,
    pub present_mode: vk::PresentModeKHR,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_index_count: u32,
}

/// One `VkWriteDescriptorSet` as seen by the mock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorWriteRecord {
    pub set: vk::DescriptorSet,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub buffer: Option<(vk::Buffer, u64, u64)>,
    pub image_view: Option<vk::ImageView>,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageRecord {
    pub format: vk::Format,
    pub width: u32,
    pub height: u32,
    pub usage: vk::ImageUsageFlags,
}

/// Fixed-function and shader state of one created pipeline
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub stages: Vec<(vk::ShaderStageFlags, vk::ShaderModule, String)>,
    pub vertex_stride: u32,
    pub attribute_locations: Vec<u32>,
    pub viewport_count: u32,
    pub scissor_count: u32,
    /// Viewport or scissor rectangles were baked in
    pub static_viewports: bool,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
}

/// Set layouts and `(stages, offset, size)` push ranges of a pipeline layout
#[derive(Debug, Clone)]
pub struct PipelineLayoutRecord {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<(vk::ShaderStageFlags, u32, u32)>,
}

struct MockMemory {
    bytes: Vec<u8>,
    mapped: bool,
}

struct MockPool {
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
    live: HashSet<vk::DescriptorSet>,
}

struct MockState {
    next_handle: u64,
    limits: vk::PhysicalDeviceLimits,
    format_features: HashMap<vk::Format, vk::FormatProperties>,
    surface: SurfaceSupport,
    families: QueueFamilyIndices,

    memory: HashMap<vk::DeviceMemory, MockMemory>,
    buffers: HashMap<vk::Buffer, u64>,
    images: HashMap<vk::Image, ImageRecord>,

    swapchains: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    swapchain_creations: Vec<SwapchainCreation>,
    acquire_counter: u32,
    acquire_script: VecDeque<Result<(u32, bool), vk::Result>>,
    present_script: VecDeque<Result<bool, vk::Result>>,

    render_pass_formats: HashMap<vk::RenderPass, Vec<vk::Format>>,
    framebuffer_attachments: HashMap<vk::Framebuffer, Vec<vk::ImageView>>,

    fences: HashMap<vk::Fence, FenceState>,
    max_pending_fences: usize,

    pools: HashMap<vk::DescriptorPool, MockPool>,
    layouts: HashMap<vk::DescriptorSetLayout, Vec<(u32, vk::DescriptorType, u32)>>,
    descriptor_writes: Vec<DescriptorWriteRecord>,

    shader_modules: HashMap<vk::ShaderModule, usize>,
    pipeline_layouts: HashMap<vk::PipelineLayout, PipelineLayoutRecord>,
    pipelines: HashMap<vk::Pipeline, PipelineRecord>,

    events: Vec<MockEvent>,
}

impl MockState {
    fn next_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn pending_fences(&self) -> usize {
        self.fences.values().filter(|s| **s == FenceState::Pending).count()
    }
}

/// View a Vulkan `(pointer, count)` pair as a slice
///
/// # Safety
/// Non-null `ptr` must point at `count` initialized values that outlive `'a`.
unsafe fn slice_or_empty<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, count as usize)
    }
}

/// Scripted [`GpuDevice`] backed by host memory
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    /// 800x600 surface offering B8G8R8A8_SRGB and UNORM, FIFO and MAILBOX,
    /// image counts 2..=3, all three depth candidates supported
    pub fn new() -> Self {
        let mut format_features = HashMap::new();
        for format in [vk::Format::D32_SFLOAT, vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT] {
            format_features.insert(
                format,
                vk::FormatProperties {
                    optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                    ..Default::default()
                },
            );
        }

        let surface = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D { width: 800, height: 600 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };

        Self {
            state: Mutex::new(MockState {
                next_handle: 0x1000,
                limits: vk::PhysicalDeviceLimits {
                    min_uniform_buffer_offset_alignment: 256,
                    min_storage_buffer_offset_alignment: 64,
                    non_coherent_atom_size: 64,
                    ..Default::default()
                },
                format_features,
                surface,
                families: QueueFamilyIndices { graphics_family: 0, present_family: 0 },
                memory: HashMap::new(),
                buffers: HashMap::new(),
                images: HashMap::new(),
                swapchains: HashMap::new(),
                swapchain_creations: Vec::new(),
                acquire_counter: 0,
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                render_pass_formats: HashMap::new(),
                framebuffer_attachments: HashMap::new(),
                fences: HashMap::new(),
                max_pending_fences: 0,
                pools: HashMap::new(),
                layouts: HashMap::new(),
                descriptor_writes: Vec::new(),
                shader_modules: HashMap::new(),
                pipeline_layouts: HashMap::new(),
                pipelines: HashMap::new(),
                events: Vec::new(),
            }),
        }
    }

    // A failed assertion in one call must not turn the drops that follow into aborts
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- configuration ---

    pub fn set_optimal_features(&self, format: vk::Format, features: vk::FormatFeatureFlags) {
        self.state().format_features.entry(format).or_default().optimal_tiling_features = features;
    }

    /// Remove depth-stencil support from every format
    pub fn clear_depth_support(&self) {
        self.state().format_features.clear();
    }

    pub fn set_surface_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state().surface.formats = formats;
    }

    pub fn set_present_modes(&self, modes: Vec<vk::PresentModeKHR>) {
        self.state().surface.present_modes = modes;
    }

    pub fn set_capabilities(&self, capabilities: vk::SurfaceCapabilitiesKHR) {
        self.state().surface.capabilities = capabilities;
    }

    pub fn set_current_extent(&self, width: u32, height: u32) {
        self.state().surface.capabilities.current_extent = vk::Extent2D { width, height };
    }

    pub fn set_queue_families(&self, graphics_family: u32, present_family: u32) {
        self.state().families = QueueFamilyIndices { graphics_family, present_family };
    }

    pub fn push_acquire_result(&self, result: Result<(u32, bool), vk::Result>) {
        self.state().acquire_script.push_back(result);
    }

    pub fn push_present_result(&self, result: Result<bool, vk::Result>) {
        self.state().present_script.push_back(result);
    }

    // --- inspection ---

    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn swapchain_creations(&self) -> Vec<SwapchainCreation> {
        self.state().swapchain_creations.clone()
    }

    pub fn live_swapchains(&self) -> usize {
        self.state().swapchains.len()
    }

    pub fn max_pending_fences(&self) -> usize {
        self.state().max_pending_fences
    }

    pub fn fence_state(&self, fence: vk::Fence) -> Option<FenceState> {
        self.state().fences.get(&fence).copied()
    }

    pub fn live_fences(&self) -> usize {
        self.state().fences.len()
    }

    pub fn live_memory(&self) -> usize {
        self.state().memory.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    pub fn is_mapped(&self, memory: vk::DeviceMemory) -> bool {
        self.state().memory.get(&memory).is_some_and(|m| m.mapped)
    }

    /// Copy of the host bytes behind a device allocation
    pub fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state().memory.get(&memory).map(|m| m.bytes.clone()).unwrap_or_default()
    }

    pub fn image(&self, image: vk::Image) -> Option<ImageRecord> {
        self.state().images.get(&image).copied()
    }

    pub fn images_with_usage(&self, usage: vk::ImageUsageFlags) -> Vec<ImageRecord> {
        self.state().images.values().filter(|i| i.usage.contains(usage)).copied().collect()
    }

    pub fn render_pass_formats(&self, render_pass: vk::RenderPass) -> Vec<vk::Format> {
        self.state().render_pass_formats.get(&render_pass).cloned().unwrap_or_default()
    }

    pub fn framebuffer_attachments(&self, framebuffer: vk::Framebuffer) -> Vec<vk::ImageView> {
        self.state().framebuffer_attachments.get(&framebuffer).cloned().unwrap_or_default()
    }

    pub fn layout_bindings(&self, layout: vk::DescriptorSetLayout) -> Vec<(u32, vk::DescriptorType, u32)> {
        self.state().layouts.get(&layout).cloned().unwrap_or_default()
    }

    pub fn descriptor_writes(&self) -> Vec<DescriptorWriteRecord> {
        self.state().descriptor_writes.clone()
    }

    pub fn live_sets(&self, pool: vk::DescriptorPool) -> usize {
        self.state().pools.get(&pool).map_or(0, |p| p.live.len())
    }

    /// Word count of a live shader module
    pub fn shader_module_words(&self, module: vk::ShaderModule) -> Option<usize> {
        self.state().shader_modules.get(&module).copied()
    }

    pub fn pipeline(&self, pipeline: vk::Pipeline) -> Option<PipelineRecord> {
        self.state().pipelines.get(&pipeline).cloned()
    }

    pub fn pipeline_layout(&self, layout: vk::PipelineLayout) -> Option<PipelineLayoutRecord> {
        self.state().pipeline_layouts.get(&layout).cloned()
    }

    pub fn live_pipelines(&self) -> usize {
        self.state().pipelines.len()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for MockDevice {
    fn limits(&self) -> vk::PhysicalDeviceLimits {
        self.state().limits
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> VulkanResult<u32> {
        MEMORY_TYPES
            .iter()
            .enumerate()
            .find(|(i, flags)| type_filter & (1 << i) != 0 && flags.contains(properties))
            .map(|(i, _)| i as u32)
            .ok_or(VulkanError::NoSuitableMemoryType)
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        self.state().format_features.get(&format).copied().unwrap_or_default()
    }

    fn surface_support(&self) -> VulkanResult<SurfaceSupport> {
        Ok(self.state().surface.clone())
    }

    fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0xface)
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        self.state().families
    }

    fn graphics_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(0x10)
    }

    fn present_queue(&self) -> vk::Queue {
        vk::Queue::from_raw(0x20)
    }

    fn command_pool(&self) -> vk::CommandPool {
        vk::CommandPool::from_raw(0x30)
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        let mut state = self.state();
        for fence in state.fences.values_mut() {
            if *fence == FenceState::Pending {
                *fence = FenceState::Signaled;
            }
        }
        state.events.push(MockEvent::WaitIdle);
        Ok(())
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo) -> VulkanResult<vk::Buffer> {
        let mut state = self.state();
        let buffer = vk::Buffer::from_raw(state.next_raw());
        state.buffers.insert(buffer, info.size);
        Ok(buffer)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut state = self.state();
        assert!(state.buffers.remove(&buffer).is_some(), "double destroy of {buffer:?}");
        state.events.push(MockEvent::DestroyBuffer(buffer));
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let size = self.state().buffers.get(&buffer).copied().unwrap_or_default();
        vk::MemoryRequirements {
            size,
            alignment: 256,
            memory_type_bits: 0b111,
        }
    }

    fn bind_buffer_memory(
        &self,
        _buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VulkanResult<()> {
        assert!(self.state().memory.contains_key(&memory), "binding unknown memory");
        Ok(())
    }

    fn create_image(&self, info: &vk::ImageCreateInfo) -> VulkanResult<vk::Image> {
        let mut state = self.state();
        let image = vk::Image::from_raw(state.next_raw());
        state.images.insert(
            image,
            ImageRecord {
                format: info.format,
                width: info.extent.width,
                height: info.extent.height,
                usage: info.usage,
            },
        );
        Ok(image)
    }

    fn destroy_image(&self, image: vk::Image) {
        let mut state = self.state();
        assert!(state.images.remove(&image).is_some(), "double destroy of {image:?}");
        state.events.push(MockEvent::DestroyImage(image));
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        let size = self
            .state()
            .images
            .get(&image)
            .map_or(0, |i| u64::from(i.width) * u64::from(i.height) * 4);
        vk::MemoryRequirements {
            size,
            alignment: 1024,
            memory_type_bits: 0b111,
        }
    }

    fn bind_image_memory(
        &self,
        _image: vk::Image,
        memory: vk::DeviceMemory,
        _offset: vk::DeviceSize,
    ) -> VulkanResult<()> {
        assert!(self.state().memory.contains_key(&memory), "binding unknown memory");
        Ok(())
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo) -> VulkanResult<vk::ImageView> {
        let mut state = self.state();
        Ok(vk::ImageView::from_raw(state.next_raw()))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state().events.push(MockEvent::DestroyImageView(view));
    }

    fn allocate_memory(&self, size: vk::DeviceSize, _memory_type_index: u32) -> VulkanResult<vk::DeviceMemory> {
        let mut state = self.state();
        let memory = vk::DeviceMemory::from_raw(state.next_raw());
        state.memory.insert(
            memory,
            MockMemory {
                bytes: vec![0; size as usize],
                mapped: false,
            },
        );
        Ok(memory)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state();
        let freed = state.memory.remove(&memory);
        assert!(freed.is_some(), "double free of {memory:?}");
        assert!(!freed.is_some_and(|m| m.mapped), "freeing mapped memory {memory:?}");
        state.events.push(MockEvent::FreeMemory(memory));
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VulkanResult<*mut c_void> {
        let mut state = self.state();
        let Some(allocation) = state.memory.get_mut(&memory) else {
            return Err(VulkanError::api("vkMapMemory")(vk::Result::ERROR_MEMORY_MAP_FAILED));
        };
        let len = allocation.bytes.len() as u64;
        let in_range = offset <= len && (size == vk::WHOLE_SIZE || offset + size <= len);
        if allocation.mapped || !in_range {
            return Err(VulkanError::api("vkMapMemory")(vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        allocation.mapped = true;
        // The Vec's heap buffer does not move while the map entry lives
        Ok(allocation.bytes[offset as usize..].as_mut_ptr().cast())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state();
        if let Some(allocation) = state.memory.get_mut(&memory) {
            assert!(allocation.mapped, "unmapping memory that is not mapped");
            allocation.mapped = false;
        }
        state.events.push(MockEvent::UnmapMemory(memory));
    }

    fn flush_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()> {
        let mut state = self.state();
        assert!(
            state.memory.get(&range.memory).is_some_and(|m| m.mapped),
            "FlushRange on memory that is not host mapped"
        );
        state.events.push(MockEvent::FlushRange {
            memory: range.memory,
            offset: range.offset,
            size: range.size,
        });
        Ok(())
    }

    fn invalidate_mapped_range(&self, range: &vk::MappedMemoryRange) -> VulkanResult<()> {
        let mut state = self.state();
        assert!(
            state.memory.get(&range.memory).is_some_and(|m| m.mapped),
            "InvalidateRange on memory that is not host mapped"
        );
        state.events.push(MockEvent::InvalidateRange {
            memory: range.memory,
            offset: range.offset,
            size: range.size,
        });
        Ok(())
    }

    fn create_swapchain(&self, info: &vk::SwapchainCreateInfoKHR) -> VulkanResult<vk::SwapchainKHR> {
        let mut state = self.state();
        let handle = vk::SwapchainKHR::from_raw(state.next_raw());
        let images = (0..info.min_image_count)
            .map(|_| vk::Image::from_raw(state.next_raw()))
            .collect();
        state.swapchains.insert(handle, images);
        state.swapchain_creations.push(SwapchainCreation {
            handle,
            old_swapchain: info.old_swapchain,
            image_format: info.image_format,
            color_space: info.image_color_space,
            width: info.image_extent.width,
            height: info.image_extent.height,
            min_image_count: info.min_image_count,
            present_mode: info.present_mode,
            sharing_mode: info.image_sharing_mode,
            queue_family_index_count: info.queue_family_index_count,
        });
        state.acquire_counter = 0;
        Ok(handle)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>> {
        self.state()
            .swapchains
            .get(&swapchain)
            .cloned()
            .ok_or_else(|| VulkanError::api("vkGetSwapchainImagesKHR")(vk::Result::ERROR_SURFACE_LOST_KHR))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        assert!(state.swapchains.remove(&swapchain).is_some(), "double destroy of {swapchain:?}");
        state.events.push(MockEvent::DestroySwapchain(swapchain));
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        _semaphore: vk::Semaphore,
    ) -> Result<(u32, bool), vk::Result> {
        let mut state = self.state();
        if let Some(result) = state.acquire_script.pop_front() {
            return result;
        }
        let count = state.swapchains.get(&swapchain).map_or(0, Vec::len) as u32;
        if count == 0 {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        let index = state.acquire_counter % count;
        state.acquire_counter += 1;
        Ok((index, false))
    }

    fn queue_present(&self, _queue: vk::Queue, info: &vk::PresentInfoKHR) -> Result<bool, vk::Result> {
        let mut state = self.state();
        // SAFETY: the caller keeps the index array alive for the duration of the call
        let indices = unsafe { std::slice::from_raw_parts(info.p_image_indices, info.swapchain_count as usize) };
        for &image_index in indices {
            state.events.push(MockEvent::Present { image_index });
        }
        state.present_script.pop_front().unwrap_or(Ok(false))
    }

    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> VulkanResult<vk::RenderPass> {
        let mut state = self.state();
        let render_pass = vk::RenderPass::from_raw(state.next_raw());
        // SAFETY: attachment array is valid for the duration of the call
        let attachments = unsafe { std::slice::from_raw_parts(info.p_attachments, info.attachment_count as usize) };
        state
            .render_pass_formats
            .insert(render_pass, attachments.iter().map(|a| a.format).collect());
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        let mut state = self.state();
        state.render_pass_formats.remove(&render_pass);
        state.events.push(MockEvent::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(&self, info: &vk::FramebufferCreateInfo) -> VulkanResult<vk::Framebuffer> {
        let mut state = self.state();
        let framebuffer = vk::Framebuffer::from_raw(state.next_raw());
        // SAFETY: attachment array is valid for the duration of the call
        let views = unsafe { std::slice::from_raw_parts(info.p_attachments, info.attachment_count as usize) };
        state.framebuffer_attachments.insert(framebuffer, views.to_vec());
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state();
        state.framebuffer_attachments.remove(&framebuffer);
        state.events.push(MockEvent::DestroyFramebuffer(framebuffer));
    }

    fn create_shader_module(&self, info: &vk::ShaderModuleCreateInfo) -> VulkanResult<vk::ShaderModule> {
        assert!(info.code_size % 4 == 0 && info.code_size > 0, "SPIR-V size must be a non-zero multiple of 4");
        let mut state = self.state();
        let module = vk::ShaderModule::from_raw(state.next_raw());
        state.shader_modules.insert(module, info.code_size / 4);
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        let mut state = self.state();
        assert!(state.shader_modules.remove(&module).is_some(), "double destroy of {module:?}");
        state.events.push(MockEvent::DestroyShaderModule(module));
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> VulkanResult<vk::PipelineLayout> {
        // SAFETY: arrays are valid for the duration of the call
        let (set_layouts, ranges) = unsafe {
            (
                slice_or_empty(info.p_set_layouts, info.set_layout_count),
                slice_or_empty(info.p_push_constant_ranges, info.push_constant_range_count),
            )
        };
        let mut state = self.state();
        let layout = vk::PipelineLayout::from_raw(state.next_raw());
        state.pipeline_layouts.insert(
            layout,
            PipelineLayoutRecord {
                set_layouts: set_layouts.to_vec(),
                push_constant_ranges: ranges.iter().map(|r| (r.stage_flags, r.offset, r.size)).collect(),
            },
        );
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        let mut state = self.state();
        assert!(state.pipeline_layouts.remove(&layout).is_some(), "double destroy of {layout:?}");
        state.events.push(MockEvent::DestroyPipelineLayout(layout));
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> VulkanResult<vk::Pipeline> {
        // SAFETY: every state pointer set by the caller is valid for the duration of the call
        let record = unsafe {
            let stages = slice_or_empty(info.p_stages, info.stage_count)
                .iter()
                .map(|s| (s.stage, s.module, CStr::from_ptr(s.p_name).to_string_lossy().into_owned()))
                .collect();
            let vertex_input = &*info.p_vertex_input_state;
            let bindings = slice_or_empty(
                vertex_input.p_vertex_binding_descriptions,
                vertex_input.vertex_binding_description_count,
            );
            let attributes = slice_or_empty(
                vertex_input.p_vertex_attribute_descriptions,
                vertex_input.vertex_attribute_description_count,
            );
            let viewport = &*info.p_viewport_state;
            let rasterizer = &*info.p_rasterization_state;
            let depth = &*info.p_depth_stencil_state;
            let dynamic = &*info.p_dynamic_state;
            PipelineRecord {
                layout: info.layout,
                render_pass: info.render_pass,
                stages,
                vertex_stride: bindings.first().map_or(0, |b| b.stride),
                attribute_locations: attributes.iter().map(|a| a.location).collect(),
                viewport_count: viewport.viewport_count,
                scissor_count: viewport.scissor_count,
                static_viewports: !viewport.p_viewports.is_null() || !viewport.p_scissors.is_null(),
                cull_mode: rasterizer.cull_mode,
                front_face: rasterizer.front_face,
                depth_test: depth.depth_test_enable == vk::TRUE,
                depth_write: depth.depth_write_enable == vk::TRUE,
                dynamic_states: slice_or_empty(dynamic.p_dynamic_states, dynamic.dynamic_state_count).to_vec(),
            }
        };

        let mut state = self.state();
        assert!(state.pipeline_layouts.contains_key(&record.layout), "pipeline with unknown layout");
        for (_, module, _) in &record.stages {
            assert!(state.shader_modules.contains_key(module), "pipeline with destroyed shader module");
        }
        let pipeline = vk::Pipeline::from_raw(state.next_raw());
        state.pipelines.insert(pipeline, record);
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        let mut state = self.state();
        assert!(state.pipelines.remove(&pipeline).is_some(), "double destroy of {pipeline:?}");
        state.events.push(MockEvent::DestroyPipeline(pipeline));
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let mut state = self.state();
        Ok(vk::Semaphore::from_raw(state.next_raw()))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state().events.push(MockEvent::DestroySemaphore(semaphore));
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let mut state = self.state();
        let fence = vk::Fence::from_raw(state.next_raw());
        let initial = if signaled { FenceState::Signaled } else { FenceState::Unsignaled };
        state.fences.insert(fence, initial);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        let removed = state.fences.remove(&fence);
        assert!(removed != Some(FenceState::Pending), "destroying fence {fence:?} with pending work");
        state.events.push(MockEvent::DestroyFence(fence));
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VulkanResult<()> {
        let mut state = self.state();
        let Some(slot) = state.fences.get_mut(&fence) else {
            return Err(VulkanError::api("vkWaitForFences")(vk::Result::ERROR_DEVICE_LOST));
        };
        // Nothing was submitted, so a real device would block until the timeout
        if *slot == FenceState::Unsignaled {
            return Err(VulkanError::api("vkWaitForFences")(vk::Result::TIMEOUT));
        }
        *slot = FenceState::Signaled;
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state();
        let slot = state.fences.get_mut(&fence).expect("reset of unknown fence");
        assert!(*slot != FenceState::Pending, "resetting fence {fence:?} while its work is pending");
        *slot = FenceState::Unsignaled;
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, submits: &[vk::SubmitInfo], fence: vk::Fence) -> VulkanResult<()> {
        let mut state = self.state();
        let mut first_buffer = vk::CommandBuffer::null();
        for submit in submits {
            // SAFETY: command buffer array is valid for the duration of the call
            let buffers =
                unsafe { std::slice::from_raw_parts(submit.p_command_buffers, submit.command_buffer_count as usize) };
            if let Some(&buffer) = buffers.first() {
                first_buffer = buffer;
            }
        }
        if fence != vk::Fence::null() {
            let slot = state.fences.get_mut(&fence).expect("submit with unknown fence");
            assert!(*slot == FenceState::Unsignaled, "submitting with fence {fence:?} that was not reset");
            *slot = FenceState::Pending;
            let pending = state.pending_fences();
            state.max_pending_fences = state.max_pending_fences.max(pending);
        }
        state.events.push(MockEvent::Submit {
            command_buffer: first_buffer,
            fence,
        });
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VulkanResult<()> {
        self.state().events.push(MockEvent::QueueWaitIdle);
        Ok(())
    }

    fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state();
        Ok((0..count).map(|_| vk::CommandBuffer::from_raw(state.next_raw())).collect())
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        self.state().events.push(MockEvent::FreeCommandBuffers { count: buffers.len() });
    }

    fn begin_command_buffer(&self, buffer: vk::CommandBuffer, _flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        self.state().events.push(MockEvent::BeginCommandBuffer(buffer));
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.state().events.push(MockEvent::EndCommandBuffer(buffer));
        Ok(())
    }

    fn cmd_begin_render_pass(&self, buffer: vk::CommandBuffer, info: &vk::RenderPassBeginInfo) {
        self.state().events.push(MockEvent::BeginRenderPass {
            command_buffer: buffer,
            framebuffer: info.framebuffer,
            width: info.render_area.extent.width,
            height: info.render_area.extent.height,
        });
    }

    fn cmd_end_render_pass(&self, buffer: vk::CommandBuffer) {
        self.state().events.push(MockEvent::EndRenderPass(buffer));
    }

    fn cmd_set_viewport(&self, buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        self.state().events.push(MockEvent::SetViewport {
            command_buffer: buffer,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        });
    }

    fn cmd_set_scissor(&self, buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.state().events.push(MockEvent::SetScissor {
            command_buffer: buffer,
            width: scissor.extent.width,
            height: scissor.extent.height,
        });
    }

    fn cmd_copy_buffer(
        &self,
        _buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        let size = regions.iter().map(|r| r.size).sum();
        self.state().events.push(MockEvent::CopyBuffer { src, dst, size });
    }

    fn cmd_bind_vertex_buffers(
        &self,
        buffer: vk::CommandBuffer,
        _first_binding: u32,
        buffers: &[vk::Buffer],
        _offsets: &[vk::DeviceSize],
    ) {
        let mut state = self.state();
        for &vertex_buffer in buffers {
            state.events.push(MockEvent::BindVertexBuffers {
                command_buffer: buffer,
                buffer: vertex_buffer,
            });
        }
    }

    fn cmd_bind_index_buffer(
        &self,
        buffer: vk::CommandBuffer,
        index_buffer: vk::Buffer,
        _offset: vk::DeviceSize,
        _index_type: vk::IndexType,
    ) {
        self.state().events.push(MockEvent::BindIndexBuffer {
            command_buffer: buffer,
            buffer: index_buffer,
        });
    }

    fn cmd_draw(
        &self,
        _buffer: vk::CommandBuffer,
        vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.state().events.push(MockEvent::Draw { vertex_count });
    }

    fn cmd_draw_indexed(
        &self,
        _buffer: vk::CommandBuffer,
        index_count: u32,
        _instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.state().events.push(MockEvent::DrawIndexed { index_count });
    }

    fn cmd_bind_pipeline(&self, buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        let mut state = self.state();
        assert!(state.pipelines.contains_key(&pipeline), "binding unknown pipeline {pipeline:?}");
        state.events.push(MockEvent::BindPipeline {
            command_buffer: buffer,
            pipeline,
        });
    }

    fn cmd_bind_descriptor_sets(
        &self,
        buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        _dynamic_offsets: &[u32],
    ) {
        let mut state = self.state();
        for (i, &set) in sets.iter().enumerate() {
            state.events.push(MockEvent::BindDescriptorSets {
                command_buffer: buffer,
                layout,
                first_set: first_set + i as u32,
                set,
            });
        }
    }

    fn cmd_push_constants(
        &self,
        buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.state().events.push(MockEvent::PushConstants {
            command_buffer: buffer,
            offset,
            size: data.len() as u32,
        });
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo,
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let mut state = self.state();
        let layout = vk::DescriptorSetLayout::from_raw(state.next_raw());
        // SAFETY: binding array is valid for the duration of the call
        let bindings = unsafe { std::slice::from_raw_parts(info.p_bindings, info.binding_count as usize) };
        state.layouts.insert(
            layout,
            bindings
                .iter()
                .map(|b| (b.binding, b.descriptor_type, b.descriptor_count))
                .collect(),
        );
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        let mut state = self.state();
        state.layouts.remove(&layout);
        state.events.push(MockEvent::DestroyDescriptorSetLayout(layout));
    }

    fn create_descriptor_pool(&self, info: &vk::DescriptorPoolCreateInfo) -> VulkanResult<vk::DescriptorPool> {
        let mut state = self.state();
        let pool = vk::DescriptorPool::from_raw(state.next_raw());
        state.pools.insert(
            pool,
            MockPool {
                max_sets: info.max_sets,
                flags: info.flags,
                live: HashSet::new(),
            },
        );
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state();
        state.pools.remove(&pool);
        state.events.push(MockEvent::DestroyDescriptorPool(pool));
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo,
    ) -> Result<Vec<vk::DescriptorSet>, vk::Result> {
        let mut state = self.state();
        let count = info.descriptor_set_count as usize;
        let fits = state
            .pools
            .get(&info.descriptor_pool)
            .map(|p| p.live.len() + count <= p.max_sets as usize)
            .ok_or(vk::Result::ERROR_UNKNOWN)?;
        if !fits {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        let sets: Vec<_> = (0..count).map(|_| vk::DescriptorSet::from_raw(state.next_raw())).collect();
        if let Some(pool) = state.pools.get_mut(&info.descriptor_pool) {
            pool.live.extend(sets.iter().copied());
        }
        Ok(sets)
    }

    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        let mut state = self.state();
        let pool = state.pools.get_mut(&pool).expect("free from unknown pool");
        assert!(
            pool.flags.contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET),
            "vkFreeDescriptorSets on a pool without FREE_DESCRIPTOR_SET"
        );
        for set in sets {
            pool.live.remove(set);
        }
        Ok(())
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> VulkanResult<()> {
        if let Some(pool) = self.state().pools.get_mut(&pool) {
            pool.live.clear();
        }
        Ok(())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet]) {
        let mut state = self.state();
        for write in writes {
            let buffer = (!write.p_buffer_info.is_null()).then(|| {
                // SAFETY: non-null info pointers are valid for the duration of the call
                let info = unsafe { &*write.p_buffer_info };
                (info.buffer, info.offset, info.range)
            });
            let image_view = (!write.p_image_info.is_null()).then(|| {
                // SAFETY: as above
                unsafe { (*write.p_image_info).image_view }
            });
            state.descriptor_writes.push(DescriptorWriteRecord {
                set: write.dst_set,
                binding: write.dst_binding,
                descriptor_type: write.descriptor_type,
                count: write.descriptor_count,
                buffer,
                image_view,
            });
        }
        state.events.push(MockEvent::UpdateDescriptorSets { writes: writes.len() });
    }
}

/// Scripted window collaborator
pub struct MockWindow {
    extent: vk::Extent2D,
    /// Extents applied one per `wait_for_next_event` call
    pending_extents: VecDeque<vk::Extent2D>,
    resized: bool,
    pub waits: usize,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            pending_extents: VecDeque::new(),
            resized: false,
            waits: 0,
        }
    }

    /// Minimized window that reports the given extents on successive waits
    pub fn minimized_then(extents: &[(u32, u32)]) -> Self {
        let mut window = Self::new(0, 0);
        window.pending_extents = extents
            .iter()
            .map(|&(width, height)| vk::Extent2D { width, height })
            .collect();
        window
    }

    /// Simulate a framebuffer-size callback
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }
}

impl DrawableSurface for MockWindow {
    fn current_drawable_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn wait_for_next_event(&mut self) {
        self.waits += 1;
        if let Some(extent) = self.pending_extents.pop_front() {
            self.extent = extent;
        }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }
}
