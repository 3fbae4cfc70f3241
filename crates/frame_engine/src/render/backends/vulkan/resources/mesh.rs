//! Device-local vertex and index buffers for one mesh

use std::mem::size_of;

use ash::vk;

use super::buffer::GpuBuffer;
use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::rendering::vertex_layout::Vertex;
use crate::render::backends::vulkan::VulkanResult;

/// Uploaded mesh ready to bind and draw
pub struct MeshBuffers {
    device: SharedDevice,
    vertex_buffer: GpuBuffer,
    vertex_count: u32,
    index_buffer: Option<GpuBuffer>,
    index_count: u32,
}

impl MeshBuffers {
    /// Upload `vertices` (and `indices`, if non-empty) to device-local memory
    ///
    /// # Panics
    /// When fewer than three vertices are given.
    pub fn new(device: &SharedDevice, vertices: &[Vertex], indices: &[u32]) -> VulkanResult<Self> {
        assert!(vertices.len() >= 3, "a mesh needs at least 3 vertices, got {}", vertices.len());

        let vertex_buffer = GpuBuffer::upload_device_local(
            device,
            bytemuck::cast_slice(vertices),
            size_of::<Vertex>() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(GpuBuffer::upload_device_local(
                device,
                bytemuck::cast_slice(indices),
                size_of::<u32>() as vk::DeviceSize,
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?)
        };

        log::debug!("Uploaded mesh: {} vertices, {} indices", vertices.len(), indices.len());

        Ok(Self {
            device: device.clone(),
            vertex_count: vertex_buffer.instance_count(),
            vertex_buffer,
            index_count: index_buffer.as_ref().map_or(0, GpuBuffer::instance_count),
            index_buffer,
        })
    }

    /// Bind vertex binding 0 and, if present, the index buffer
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        self.device
            .cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.handle()], &[0]);
        if let Some(index_buffer) = &self.index_buffer {
            self.device
                .cmd_bind_index_buffer(command_buffer, index_buffer.handle(), 0, vk::IndexType::UINT32);
        }
    }

    /// Indexed draw when the mesh has indices, plain draw otherwise
    pub fn draw(&self, command_buffer: vk::CommandBuffer) {
        if self.index_buffer.is_some() {
            self.device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        } else {
            self.device.cmd_draw(command_buffer, self.vertex_count, 1, 0, 0);
        }
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices (0 for non-indexed meshes)
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
