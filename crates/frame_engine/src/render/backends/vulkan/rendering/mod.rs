// Vulkan rendering components

pub mod commands;
pub mod pipeline;
pub mod renderer;
pub mod vertex_layout;

pub use commands::SingleTimeCommands;
pub use pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout, ShaderModule};
pub use renderer::FrameScheduler;
pub use vertex_layout::{GlobalUbo, Vertex, VulkanVertexLayout};
