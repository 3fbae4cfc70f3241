//! Vulkan descriptor set and resource binding management
//!
//! Layouts declare which resource kind sits at each binding slot, pools hand
//! out sets against a layout from a fixed budget, and [`DescriptorWriter`]
//! queues buffer / image bindings and applies them in a single update call.
//!
//! Pool exhaustion is reported as [`VulkanError::PoolExhausted`] so callers
//! can fall back to a fresh pool. Binding a slot the layout does not declare
//! is a programming error and panics.

use std::collections::BTreeMap;

use ash::vk;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Descriptor set layout builder
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `count` descriptors of `descriptor_type` at `binding`
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> VulkanResult<Self> {
        if self.bindings.contains_key(&binding) {
            return Err(VulkanError::DuplicateBinding { binding });
        }
        self.bindings.insert(
            binding,
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stage_flags)
                .build(),
        );
        Ok(self)
    }

    /// Declare a single uniform buffer at `binding`
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> VulkanResult<Self> {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags, 1)
    }

    /// Declare a single combined image sampler at `binding`
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> VulkanResult<Self> {
        self.add_binding(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags, 1)
    }

    /// Create the immutable layout
    pub fn build(self, device: &SharedDevice) -> VulkanResult<DescriptorSetLayout> {
        let bindings: Vec<_> = self.bindings.values().copied().collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = device.create_descriptor_set_layout(&layout_info)?;

        log::debug!("Created descriptor set layout with {} bindings", bindings.len());

        Ok(DescriptorSetLayout {
            device: device.clone(),
            layout,
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    device: SharedDevice,
    layout: vk::DescriptorSetLayout,
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Declaration at `binding`, if any
    pub fn binding(&self, binding: u32) -> Option<&vk::DescriptorSetLayoutBinding> {
        self.bindings.get(&binding)
    }

    /// Number of declared binding slots
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.device.destroy_descriptor_set_layout(self.layout);
    }
}

/// Descriptor pool builder
pub struct DescriptorPoolBuilder {
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl DescriptorPoolBuilder {
    /// Builder with room for 1000 sets and no pool sizes yet
    pub fn new() -> Self {
        Self {
            pool_sizes: Vec::new(),
            max_sets: 1000,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }

    /// Reserve `count` descriptors of `descriptor_type`
    pub fn add_pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty: descriptor_type,
            descriptor_count: count,
        });
        self
    }

    /// Maximum number of sets that can be live at once
    pub fn set_max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Pool creation flags, e.g. `FREE_DESCRIPTOR_SET`
    pub fn set_pool_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Create the pool; it never grows afterwards
    pub fn build(self, device: &SharedDevice) -> VulkanResult<DescriptorPool> {
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(self.flags)
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes);
        let pool = device.create_descriptor_pool(&pool_info)?;

        log::debug!("Created descriptor pool for {} sets", self.max_sets);

        Ok(DescriptorPool {
            device: device.clone(),
            pool,
            flags: self.flags,
            max_sets: self.max_sets,
        })
    }
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-capacity descriptor pool
pub struct DescriptorPool {
    device: SharedDevice,
    pool: vk::DescriptorPool,
    flags: vk::DescriptorPoolCreateFlags,
    max_sets: u32,
}

impl DescriptorPool {
    /// Allocate one set for `layout`
    ///
    /// Returns [`VulkanError::PoolExhausted`] when the pool is full.
    pub fn allocate(&self, layout: &DescriptorSetLayout) -> VulkanResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        match self.device.allocate_descriptor_sets(&alloc_info) {
            Ok(sets) => sets
                .into_iter()
                .next()
                .ok_or_else(|| VulkanError::api("vkAllocateDescriptorSets")(vk::Result::ERROR_UNKNOWN)),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                log::debug!("Descriptor pool {:?} exhausted ({} sets)", self.pool, self.max_sets);
                Err(VulkanError::PoolExhausted)
            }
            Err(result) => Err(VulkanError::api("vkAllocateDescriptorSets")(result)),
        }
    }

    /// Return sets to the pool
    ///
    /// # Panics
    /// When the pool was not created with `FREE_DESCRIPTOR_SET`.
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        assert!(
            self.flags.contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET),
            "freeing individual sets requires a pool created with FREE_DESCRIPTOR_SET"
        );
        self.device.free_descriptor_sets(self.pool, sets)
    }

    /// Return every set to the pool at once
    pub fn reset(&self) -> VulkanResult<()> {
        self.device.reset_descriptor_pool(self.pool)
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Capacity in sets
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.pool);
    }
}

enum PendingResource {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    resource: PendingResource,
}

/// Queues descriptor writes for one set and applies them together
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a DescriptorPool,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    /// Writer for sets of `layout` allocated from `pool`
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            writes: Vec::new(),
        }
    }

    fn descriptor_type_of(&self, binding: u32) -> vk::DescriptorType {
        let declared = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("layout does not declare binding {binding}"));
        assert_eq!(
            declared.descriptor_count, 1,
            "binding {binding} holds {} descriptors but a single resource was written",
            declared.descriptor_count
        );
        declared.descriptor_type
    }

    /// Queue a buffer binding
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        let descriptor_type = self.descriptor_type_of(binding);
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            resource: PendingResource::Buffer(info),
        });
        self
    }

    /// Queue an image binding
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        let descriptor_type = self.descriptor_type_of(binding);
        self.writes.push(PendingWrite {
            binding,
            descriptor_type,
            resource: PendingResource::Image(info),
        });
        self
    }

    /// Allocate a set from the pool and apply the queued writes to it
    pub fn build(self) -> VulkanResult<vk::DescriptorSet> {
        let set = self.pool.allocate(self.layout)?;
        self.overwrite(set);
        Ok(set)
    }

    /// Apply the queued writes to an existing set in one update call
    pub fn overwrite(self, set: vk::DescriptorSet) {
        // Infos are collected up front so the pointers taken below stay put
        let buffer_infos: Vec<_> = self
            .writes
            .iter()
            .filter_map(|w| match w.resource {
                PendingResource::Buffer(info) => Some(info),
                PendingResource::Image(_) => None,
            })
            .collect();
        let image_infos: Vec<_> = self
            .writes
            .iter()
            .filter_map(|w| match w.resource {
                PendingResource::Image(info) => Some(info),
                PendingResource::Buffer(_) => None,
            })
            .collect();

        let mut next_buffer = 0;
        let mut next_image = 0;
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|pending| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(pending.binding)
                    .dst_array_element(0)
                    .descriptor_type(pending.descriptor_type);
                let write = match pending.resource {
                    PendingResource::Buffer(_) => {
                        next_buffer += 1;
                        write.buffer_info(std::slice::from_ref(&buffer_infos[next_buffer - 1]))
                    }
                    PendingResource::Image(_) => {
                        next_image += 1;
                        write.image_info(std::slice::from_ref(&image_infos[next_image - 1]))
                    }
                };
                write.build()
            })
            .collect();

        self.pool.device.update_descriptor_sets(&writes);
    }
}
