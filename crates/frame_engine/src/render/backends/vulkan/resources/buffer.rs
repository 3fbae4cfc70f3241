//! Buffer management for vertex, index and uniform data
//!
//! A [`GpuBuffer`] holds `instance_count` records of `instance_size` bytes,
//! each padded to `alignment_size` so that every record can be addressed as
//! a dynamic-offset descriptor. Per-frame uniform data uses one buffer with
//! one record per frame in flight and the `*_at(index)` helpers.

use ash::vk;
use bytemuck::Pod;

use super::memory::MemoryResource;
use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::rendering::commands::SingleTimeCommands;
use crate::render::backends::vulkan::VulkanResult;

/// Round `instance_size` up to a multiple of `min_offset_alignment`
///
/// Alignments of 0 and 1 leave the size unchanged. Vulkan alignments are
/// powers of two, which lets the rounding use a mask.
pub fn aligned_size(instance_size: vk::DeviceSize, min_offset_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_offset_alignment > 0 {
        debug_assert!(
            min_offset_alignment.is_power_of_two(),
            "alignment {min_offset_alignment} is not a power of two"
        );
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Buffer handle plus its backing memory
pub struct GpuBuffer {
    device: SharedDevice,
    buffer: vk::Buffer,
    memory: MemoryResource,
    instance_size: vk::DeviceSize,
    instance_count: u32,
    alignment_size: vk::DeviceSize,
    buffer_size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_properties: vk::MemoryPropertyFlags,
}

impl GpuBuffer {
    /// Create a buffer of `instance_count` records and bind fresh memory to it
    pub fn new(
        device: &SharedDevice,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
        memory_properties: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        let alignment_size = aligned_size(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * vk::DeviceSize::from(instance_count);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(buffer_size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = device.create_buffer(&buffer_info)?;

        let memory = MemoryResource::allocate(device, device.buffer_memory_requirements(buffer), memory_properties)
            .and_then(|memory| {
                device.bind_buffer_memory(buffer, memory.handle(), 0)?;
                Ok(memory)
            });
        let memory = match memory {
            Ok(memory) => memory,
            Err(e) => {
                device.destroy_buffer(buffer);
                return Err(e);
            }
        };

        log::trace!(
            "Created buffer: {instance_count} x {instance_size} bytes (stride {alignment_size}), usage {usage:?}"
        );

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            instance_size,
            instance_count,
            alignment_size,
            buffer_size,
            usage,
            memory_properties,
        })
    }

    /// Host-visible, coherent buffer for data rewritten every frame
    pub fn host_visible(
        device: &SharedDevice,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> VulkanResult<Self> {
        Self::new(
            device,
            instance_size,
            instance_count,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            min_offset_alignment,
        )
    }

    /// Upload `bytes` into a new device-local buffer through a staging copy
    pub fn upload_device_local(
        device: &SharedDevice,
        bytes: &[u8],
        instance_size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        assert!(instance_size > 0, "instance size must be non-zero");
        let instance_count = u32::try_from(bytes.len() as u64 / instance_size)
            .unwrap_or_else(|_| panic!("{} bytes is too many records", bytes.len()));
        assert_eq!(
            u64::from(instance_count) * instance_size,
            bytes.len() as u64,
            "upload is not a whole number of {instance_size}-byte records"
        );

        let mut staging = Self::host_visible(
            device,
            instance_size,
            instance_count,
            vk::BufferUsageFlags::TRANSFER_SRC,
            1,
        )?;
        staging.map()?;
        staging.write_bytes(bytes, 0);
        staging.unmap();

        let target = Self::new(
            device,
            instance_size,
            instance_count,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            1,
        )?;

        let commands = SingleTimeCommands::begin(device)?;
        target.copy_from(commands.command_buffer(), &staging);
        commands.submit()?;

        Ok(target)
    }

    /// Record a whole-buffer copy from `source` into this buffer
    pub fn copy_from(&self, command_buffer: vk::CommandBuffer, source: &Self) {
        assert!(
            source.buffer_size <= self.buffer_size,
            "copy source of {} bytes does not fit into {} bytes",
            source.buffer_size,
            self.buffer_size
        );
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: source.buffer_size,
        };
        self.device.cmd_copy_buffer(command_buffer, source.buffer, self.buffer, &[region]);
    }

    /// Map the whole buffer
    pub fn map(&mut self) -> VulkanResult<()> {
        self.memory.map(0, vk::WHOLE_SIZE)
    }

    /// Map `size` bytes starting at `offset`
    pub fn map_range(&mut self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        self.memory.map(offset, size)
    }

    /// Unmap; calling it on an unmapped buffer does nothing
    pub fn unmap(&mut self) {
        self.memory.unmap();
    }

    /// Whether the buffer is currently mapped
    pub fn is_mapped(&self) -> bool {
        self.memory.is_mapped()
    }

    /// Copy raw bytes into the mapping at `offset`
    ///
    /// # Panics
    /// When the buffer is not mapped or the bytes do not fit.
    pub fn write_bytes(&mut self, data: &[u8], offset: vk::DeviceSize) {
        self.memory.write(data, offset);
    }

    /// Copy a plain-old-data value to the start of the mapping
    pub fn write<T: Pod>(&mut self, value: &T) {
        self.write_bytes(bytemuck::bytes_of(value), 0);
    }

    /// Write one record at `index * alignment_size`
    pub fn write_at<T: Pod>(&mut self, value: &T, index: u32) {
        let bytes = bytemuck::bytes_of(value);
        assert!(
            bytes.len() as vk::DeviceSize <= self.instance_size,
            "record of {} bytes exceeds instance size {}",
            bytes.len(),
            self.instance_size
        );
        self.write_bytes(bytes, self.offset_of(index));
    }

    /// Bytes of record `index` as seen through the mapping
    pub fn read_at(&self, index: u32) -> Option<&[u8]> {
        let start = self.offset_of(index) as usize;
        let end = start + self.instance_size as usize;
        self.memory.mapped().and_then(|bytes| bytes.get(start..end))
    }

    /// Flush `size` bytes at `offset`; `vk::WHOLE_SIZE` flushes the whole mapping
    ///
    /// Offsets count from the mapping start, as for writes. Without a mapping
    /// this does nothing.
    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        self.memory.flush(offset, size)
    }

    /// Flush record `index`
    pub fn flush_at(&self, index: u32) -> VulkanResult<()> {
        self.flush(self.alignment_size, self.offset_of(index))
    }

    /// Invalidate `size` bytes at `offset`, same range rules as [`Self::flush`]
    pub fn invalidate(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> VulkanResult<()> {
        self.memory.invalidate(offset, size)
    }

    /// Invalidate record `index`
    pub fn invalidate_at(&self, index: u32) -> VulkanResult<()> {
        self.invalidate(self.alignment_size, self.offset_of(index))
    }

    /// Descriptor covering `size` bytes at `offset`
    pub fn descriptor_info(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset,
            range: size,
        }
    }

    /// Descriptor covering record `index`
    pub fn descriptor_info_at(&self, index: u32) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.alignment_size, self.offset_of(index))
    }

    fn offset_of(&self, index: u32) -> vk::DeviceSize {
        assert!(
            index < self.instance_count,
            "record index {index} out of range for {} records",
            self.instance_count
        );
        vk::DeviceSize::from(index) * self.alignment_size
    }

    /// Raw buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Backing memory
    pub fn memory(&self) -> &MemoryResource {
        &self.memory
    }

    /// Unpadded record size
    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    /// Number of records
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Record stride after alignment padding
    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }

    /// Total size, `alignment_size * instance_count`
    pub fn buffer_size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    /// Usage flags the buffer was created with
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Memory properties the buffer was allocated with
    pub fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.memory_properties
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        // Memory is freed when `self.memory` drops right after this
        self.memory.unmap();
        self.device.destroy_buffer(self.buffer);
    }
}
