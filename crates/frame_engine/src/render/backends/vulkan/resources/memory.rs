//! Device memory allocations
//!
//! [`MemoryResource`] owns one `VkDeviceMemory` block and its host mapping.
//! Buffers and depth images bind their storage to one of these and let it
//! free the block when they are dropped.

use std::ptr::NonNull;

use ash::vk;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::{MapError, VulkanResult};

/// Active host mapping of (part of) an allocation
///
/// `ptr`, `offset` and `size` describe the bytes the caller asked for. The
/// driver mapping starts at `offset` rounded down to `nonCoherentAtomSize`
/// and ends at `driver_end`, so flush ranges can be atom aligned.
#[derive(Debug, Clone, Copy)]
struct Mapping {
    ptr: NonNull<u8>,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    driver_end: vk::DeviceSize,
}

/// One device memory allocation with optional host mapping
pub struct MemoryResource {
    device: SharedDevice,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    properties: vk::MemoryPropertyFlags,
    mapping: Option<Mapping>,
}

impl MemoryResource {
    /// Allocate memory satisfying `requirements` with at least `properties`
    pub fn allocate(
        device: &SharedDevice,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let memory_type = device.find_memory_type(requirements.memory_type_bits, properties)?;
        let memory = device.allocate_memory(requirements.size, memory_type)?;

        log::trace!(
            "Allocated {} bytes of {:?} memory (type {})",
            requirements.size,
            properties,
            memory_type
        );

        Ok(Self {
            device: device.clone(),
            memory,
            size: requirements.size,
            properties,
            mapping: None,
        })
    }

    /// Map `size` bytes starting at `offset`; `vk::WHOLE_SIZE` maps to the end
    pub fn map(&mut self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()> {
        if self.mapping.is_some() {
            return Err(MapError::AlreadyMapped.into());
        }
        if !self.is_host_visible() {
            return Err(MapError::NotHostVisible.into());
        }

        let atom = self.atom_size();
        let driver_offset = offset / atom * atom;
        let (size, driver_end) = if size == vk::WHOLE_SIZE {
            (self.size.saturating_sub(offset), self.size)
        } else {
            (size, ((offset + size).div_ceil(atom) * atom).min(self.size))
        };
        let driver_size = if driver_end == self.size {
            vk::WHOLE_SIZE
        } else {
            driver_end - driver_offset
        };

        let ptr = self.device.map_memory(self.memory, driver_offset, driver_size)?;
        // SAFETY: `offset - driver_offset` is below one atom and inside the driver mapping
        let ptr = unsafe { ptr.cast::<u8>().add((offset - driver_offset) as usize) };
        let ptr = NonNull::new(ptr).ok_or(MapError::NotHostVisible)?;

        self.mapping = Some(Mapping {
            ptr,
            offset,
            size,
            driver_end,
        });
        Ok(())
    }

    /// Release the host mapping; does nothing when not mapped
    pub fn unmap(&mut self) {
        if self.mapping.take().is_some() {
            self.device.unmap_memory(self.memory);
        }
    }

    /// Whether a host mapping is active
    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    /// Mapped bytes, starting at the mapping offset
    pub fn mapped(&self) -> Option<&[u8]> {
        self.mapping.map(|m| {
            // SAFETY: the driver keeps `size` bytes at `ptr` valid until unmap,
            // and unmap requires `&mut self`
            unsafe { std::slice::from_raw_parts(m.ptr.as_ptr(), m.size as usize) }
        })
    }

    /// Mutable view of the mapped bytes
    pub fn mapped_mut(&mut self) -> Option<&mut [u8]> {
        self.mapping.map(|m| {
            // SAFETY: as above; `&mut self` makes the view unique
            unsafe { std::slice::from_raw_parts_mut(m.ptr.as_ptr(), m.size as usize) }
        })
    }

    /// Copy `data` into the mapping at `offset` bytes past the mapping start
    ///
    /// # Panics
    /// When nothing is mapped or the write would run past the mapped range.
    pub fn write(&mut self, data: &[u8], offset: vk::DeviceSize) {
        let mapped = self
            .mapped_mut()
            .unwrap_or_else(|| panic!("write of {} bytes to unmapped memory", data.len()));
        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= mapped.len(),
            "write of {} bytes at offset {} exceeds mapped range of {} bytes",
            data.len(),
            offset,
            mapped.len()
        );
        mapped[start..end].copy_from_slice(data);
    }

    /// Make host writes in the given range visible to the device
    ///
    /// `offset` counts from the mapping start, like [`Self::write`]. Does
    /// nothing when the memory is not mapped.
    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()> {
        match self.mapped_range(offset, size) {
            Some(range) => self.device.flush_mapped_range(&range),
            None => Ok(()),
        }
    }

    /// Make device writes in the given range visible to the host
    ///
    /// Same range rules as [`Self::flush`].
    pub fn invalidate(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> VulkanResult<()> {
        match self.mapped_range(offset, size) {
            Some(range) => self.device.invalidate_mapped_range(&range),
            None => Ok(()),
        }
    }

    /// Translate a mapping-relative range to the allocation, widened to
    /// `nonCoherentAtomSize` boundaries within the driver mapping
    fn mapped_range(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> Option<vk::MappedMemoryRange> {
        let mapping = self.mapping?;
        let atom = self.atom_size();

        let first = mapping.offset + offset;
        if first >= mapping.offset + mapping.size {
            return None;
        }
        let start = first / atom * atom;
        let size = if size == vk::WHOLE_SIZE {
            vk::WHOLE_SIZE
        } else {
            let end = (first + size).div_ceil(atom) * atom;
            end.min(mapping.driver_end) - start
        };

        Some(
            vk::MappedMemoryRange::builder()
                .memory(self.memory)
                .offset(start)
                .size(size)
                .build(),
        )
    }

    fn atom_size(&self) -> vk::DeviceSize {
        self.device.limits().non_coherent_atom_size.max(1)
    }

    /// Raw memory handle
    pub fn handle(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Allocation size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Offset of the active mapping within the allocation
    pub fn mapped_offset(&self) -> Option<vk::DeviceSize> {
        self.mapping.map(|m| m.offset)
    }

    /// Memory properties requested at allocation
    pub fn properties(&self) -> vk::MemoryPropertyFlags {
        self.properties
    }

    /// Whether the memory can be mapped
    pub fn is_host_visible(&self) -> bool {
        self.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }
}

impl Drop for MemoryResource {
    fn drop(&mut self) {
        self.unmap();
        self.device.free_memory(self.memory);
    }
}

impl std::fmt::Debug for MemoryResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryResource")
            .field("memory", &self.memory)
            .field("size", &self.size)
            .field("properties", &self.properties)
            .field("mapped", &self.mapping.is_some())
            .finish()
    }
}
