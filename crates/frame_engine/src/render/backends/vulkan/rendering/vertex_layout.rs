//! Vertex and uniform layouts shared with the shaders
//!
//! Field order and padding here must match the GLSL declarations byte for
//! byte: `Vertex` feeds `layout(location = 0..3) in`, `GlobalUbo` is the
//! std140 block at set 0, binding 0.

use std::mem::{offset_of, size_of};

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// One mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Vertex with only position and color set
    pub const fn colored(position: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            color,
            normal: [0.0; 3],
            uv: [0.0; 2],
        }
    }
}

/// Frame-global uniform data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUbo {
    /// Projection * view
    pub projection_view: [[f32; 4]; 4],
    /// RGB ambient color, intensity in w
    pub ambient_light_color: [f32; 4],
    /// World-space point light position
    pub light_position: [f32; 3],
    /// std140 places the next vec4 on a 16-byte boundary
    pub _padding: f32,
    /// RGB light color, intensity in w
    pub light_color: [f32; 4],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection_view: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            light_position: [-1.0, -1.0, -1.0],
            _padding: 0.0,
            light_color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Vulkan vertex input description for [`Vertex`]
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// Single interleaved binding advancing per vertex
    pub fn binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        [vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    /// Position, color, normal and uv at locations 0 to 3
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        let attribute = |location: u32, format: vk::Format, offset: usize| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
            attribute(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attribute(3, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
        ]
    }
}
