//! Shader modules and graphics pipelines
//!
//! Pipelines always take viewport and scissor as dynamic state. The frame
//! scheduler sets both to the swapchain extent at the start of every render
//! pass, so nothing baked into a pipeline depends on the window size.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use ash::vk;
use bytemuck::Pod;

use crate::render::backends::vulkan::initialization::SharedDevice;
use crate::render::backends::vulkan::rendering::vertex_layout::VulkanVertexLayout;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = c"main";

/// SPIR-V shader module with RAII cleanup
pub struct ShaderModule {
    device: SharedDevice,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytes
    ///
    /// `name` only labels errors and logs.
    pub fn from_bytes(device: &SharedDevice, name: &str, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| VulkanError::InvalidShader {
            source_name: name.to_string(),
            reason: e.to_string(),
        })?;
        if code.is_empty() {
            return Err(VulkanError::InvalidShader {
                source_name: name.to_string(),
                reason: "no SPIR-V words".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = device.create_shader_module(&create_info)?;
        log::debug!("Created shader module {name} ({} words)", code.len());

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load a shader module from a SPIR-V file
    pub fn from_file(device: &SharedDevice, path: &Path) -> VulkanResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| VulkanError::InvalidShader {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(device, &path.display().to_string(), &bytes)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        self.device.destroy_shader_module(self.module);
    }
}

/// Fixed-function state of a graphics pipeline
///
/// Held by value; the Vulkan create-info structs that point into it are only
/// built for the duration of [`GraphicsPipeline::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Primitive assembly
    pub topology: vk::PrimitiveTopology,
    /// Fill, line or point rasterization
    pub polygon_mode: vk::PolygonMode,
    /// Faces to cull
    pub cull_mode: vk::CullModeFlags,
    /// Winding of front faces
    pub front_face: vk::FrontFace,
    /// Test fragments against the depth attachment
    pub depth_test: bool,
    /// Write passing fragments' depth
    pub depth_write: bool,
    /// Depth comparison
    pub depth_compare_op: vk::CompareOp,
    /// Alpha blending on the color attachment
    pub blend_enable: bool,
    /// Dynamic state; must include `VIEWPORT` and `SCISSOR`
    pub dynamic_states: Vec<vk::DynamicState>,
    /// Subpass of the render pass the pipeline is used in
    pub subpass: u32,
}

impl Default for PipelineConfig {
    /// Filled triangle lists, no culling, clockwise front faces, depth test
    /// and write with `LESS`, no blending, dynamic viewport and scissor
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            blend_enable: false,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            subpass: 0,
        }
    }
}

/// Pipeline layout: descriptor set layouts plus push constant ranges
pub struct PipelineLayout {
    device: SharedDevice,
    layout: vk::PipelineLayout,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineLayout {
    /// Create a layout; `set_layouts[i]` becomes set `i`
    pub fn new(
        device: &SharedDevice,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> VulkanResult<Self> {
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        let layout = device.create_pipeline_layout(&create_info)?;

        Ok(Self {
            device: device.clone(),
            layout,
            push_constant_ranges: push_constant_ranges.to_vec(),
        })
    }

    /// Get the layout handle
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Whether one declared range covers `size` bytes at `offset` for all of `stages`
    pub fn covers_push_constants(&self, stages: vk::ShaderStageFlags, offset: u32, size: u32) -> bool {
        self.push_constant_ranges.iter().any(|range| {
            range.stage_flags.contains(stages) && offset >= range.offset && offset + size <= range.offset + range.size
        })
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.device.destroy_pipeline_layout(self.layout);
    }
}

/// Graphics pipeline consuming [`Vertex`](super::Vertex) input
///
/// Owns its layout; the pipeline is destroyed before the layout.
pub struct GraphicsPipeline {
    device: SharedDevice,
    pipeline: vk::Pipeline,
    layout: PipelineLayout,
}

impl GraphicsPipeline {
    /// Build a pipeline for `render_pass` from a vertex and a fragment shader
    ///
    /// # Panics
    /// When `config` does not make viewport and scissor dynamic.
    pub fn new(
        device: &SharedDevice,
        render_pass: vk::RenderPass,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
        layout: PipelineLayout,
        config: &PipelineConfig,
    ) -> VulkanResult<Self> {
        assert!(
            config.dynamic_states.contains(&vk::DynamicState::VIEWPORT)
                && config.dynamic_states.contains(&vk::DynamicState::SCISSOR),
            "pipelines must take viewport and scissor as dynamic state"
        );

        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let bindings = VulkanVertexLayout::binding_descriptions();
        let attributes = VulkanVertexLayout::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(config.topology)
            .primitive_restart_enable(false);

        // Counts only; the rectangles are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(config.polygon_mode)
            .line_width(1.0)
            .cull_mode(config.cull_mode)
            .front_face(config.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(config.depth_test)
            .depth_write_enable(config.depth_write)
            .depth_compare_op(config.depth_compare_op)
            .depth_bounds_test_enable(false)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(
                vk::ColorComponentFlags::R
                    | vk::ColorComponentFlags::G
                    | vk::ColorComponentFlags::B
                    | vk::ColorComponentFlags::A,
            )
            .blend_enable(config.blend_enable)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&config.dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass)
            .subpass(config.subpass);

        // `layout` drops on error and takes the pipeline layout with it
        let pipeline = device.create_graphics_pipeline(&pipeline_info)?;
        log::debug!("Created graphics pipeline {pipeline:?} for render pass {render_pass:?}");

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// Bind for subsequent draws in `command_buffer`
    pub fn bind(&self, command_buffer: vk::CommandBuffer) {
        self.device.cmd_bind_pipeline(command_buffer, self.pipeline);
    }

    /// Bind `sets` starting at set number `first_set`
    pub fn bind_descriptor_sets(&self, command_buffer: vk::CommandBuffer, first_set: u32, sets: &[vk::DescriptorSet]) {
        self.device
            .cmd_bind_descriptor_sets(command_buffer, self.layout.handle(), first_set, sets, &[]);
    }

    /// Push `value` at `offset` for `stages`
    ///
    /// # Panics
    /// When no push constant range of the layout covers the write.
    pub fn push_constants<T: Pod>(
        &self,
        command_buffer: vk::CommandBuffer,
        stages: vk::ShaderStageFlags,
        offset: u32,
        value: &T,
    ) {
        let bytes = bytemuck::bytes_of(value);
        assert!(
            self.layout.covers_push_constants(stages, offset, bytes.len() as u32),
            "push constant write of {} bytes at {offset} for {stages:?} is outside the layout's ranges",
            bytes.len()
        );
        self.device
            .cmd_push_constants(command_buffer, self.layout.handle(), stages, offset, bytes);
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        log::debug!("Dropping graphics pipeline {:?}", self.pipeline);
        self.device.destroy_pipeline(self.pipeline);
    }
}
