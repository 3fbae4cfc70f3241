//! Vulkan resource management (memory, buffers, meshes, descriptors)

pub mod buffer;
pub mod descriptor_set;
pub mod memory;
pub mod mesh;

pub use buffer::{aligned_size, GpuBuffer};
pub use descriptor_set::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorWriter,
};
pub use memory::MemoryResource;
pub use mesh::MeshBuffers;
