//! Frame engine viewer
//!
//! Opens a window and runs the frame loop: every frame it writes the global
//! uniform record for the current frame slot and draws a lit, spinning
//! triangle. Pass a `.toml` or `.ron` config path as the first argument;
//! `viewer.toml` is used when present, defaults otherwise.
//!
//! Shaders are compiled by the build script when `VULKAN_SDK` is set and
//! loaded from the paths in `[renderer.shaders]`.

use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use frame_engine::config::ConfigError;
use frame_engine::foundation::logging;
use frame_engine::prelude::*;
use frame_engine::render::backends::vulkan::WindowError;
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "viewer.toml";

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),
}

/// One `GlobalUbo` record and descriptor set per frame in flight
struct FrameUniforms {
    sets: Vec<vk::DescriptorSet>,
    buffer: GpuBuffer,
    // Owns the sets
    _pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

impl FrameUniforms {
    fn new(device: &SharedDevice) -> VulkanResult<Self> {
        let frames = MAX_FRAMES_IN_FLIGHT as u32;

        let mut buffer = GpuBuffer::host_visible(
            device,
            size_of::<GlobalUbo>() as vk::DeviceSize,
            frames,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            device.limits().min_uniform_buffer_offset_alignment,
        )?;
        buffer.map()?;

        let layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)?
            .build(device)?;
        let pool = DescriptorPoolBuilder::new()
            .set_max_sets(frames)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, frames)
            .build(device)?;

        let sets = (0..frames)
            .map(|frame| {
                DescriptorWriter::new(&layout, &pool)
                    .write_buffer(0, buffer.descriptor_info_at(frame))
                    .build()
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Per-frame uniforms: {} records, stride {} bytes",
            buffer.instance_count(),
            buffer.alignment_size()
        );
        Ok(Self {
            sets,
            buffer,
            _pool: pool,
            layout,
        })
    }

    /// Write the record for `frame`; only call once that slot's fence was waited on
    fn update(&mut self, frame: usize, ubo: &GlobalUbo) -> VulkanResult<()> {
        let index = frame as u32;
        self.buffer.write_at(ubo, index);
        self.buffer.flush_at(index)
    }

    fn descriptor_set(&self, frame: usize) -> vk::DescriptorSet {
        self.sets[frame]
    }

    fn layout(&self) -> vk::DescriptorSetLayout {
        self.layout.handle()
    }
}

/// Per-draw data in the `push_constant` block of both shader stages
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct DrawPush {
    /// Column-major object to world transform
    model: [[f32; 4]; 4],
    tint: [f32; 4],
}

impl DrawPush {
    const STAGES: vk::ShaderStageFlags =
        vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

    fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: Self::STAGES,
            offset: 0,
            size: size_of::<Self>() as u32,
        }
    }

    /// Rotation by `angle` radians about the view axis
    fn spinning(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            model: [
                [cos, sin, 0.0, 0.0],
                [-sin, cos, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
            tint: [1.0; 4],
        }
    }
}

fn triangle() -> [Vertex; 3] {
    let normal = [0.0, 0.0, -1.0];
    [
        Vertex { normal, ..Vertex::colored([0.0, -0.5, 0.5], [1.0, 0.2, 0.2]) },
        Vertex { normal, ..Vertex::colored([0.5, 0.5, 0.5], [0.2, 1.0, 0.2]) },
        Vertex { normal, ..Vertex::colored([-0.5, 0.5, 0.5], [0.2, 0.2, 1.0]) },
    ]
}

/// Triangle mesh and the pipeline that draws it
///
/// The pipeline is rebuilt whenever the scheduler rebuilds its surface, since
/// it was created against the previous render pass.
struct TrianglePass {
    device: SharedDevice,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    set_layout: vk::DescriptorSetLayout,
    pipeline: GraphicsPipeline,
    surface_generation: u64,
    mesh: MeshBuffers,
}

impl TrianglePass {
    fn new(
        device: &SharedDevice,
        shaders: &ShaderConfig,
        scheduler: &FrameScheduler,
        set_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<Self> {
        let vertex_shader = ShaderModule::from_file(device, &shaders.vertex_shader())?;
        let fragment_shader = ShaderModule::from_file(device, &shaders.fragment_shader())?;
        let pipeline = Self::build_pipeline(device, scheduler, &vertex_shader, &fragment_shader, set_layout)?;
        let mesh = MeshBuffers::new(device, &triangle(), &[])?;

        Ok(Self {
            device: device.clone(),
            vertex_shader,
            fragment_shader,
            set_layout,
            pipeline,
            surface_generation: scheduler.surface_generation(),
            mesh,
        })
    }

    fn build_pipeline(
        device: &SharedDevice,
        scheduler: &FrameScheduler,
        vertex_shader: &ShaderModule,
        fragment_shader: &ShaderModule,
        set_layout: vk::DescriptorSetLayout,
    ) -> VulkanResult<GraphicsPipeline> {
        let layout = PipelineLayout::new(device, &[set_layout], &[DrawPush::range()])?;
        GraphicsPipeline::new(
            device,
            scheduler.render_pass(),
            vertex_shader,
            fragment_shader,
            layout,
            &PipelineConfig::default(),
        )
    }

    /// Rebuild the pipeline if the surface changed since it was built
    fn prepare(&mut self, scheduler: &FrameScheduler) -> VulkanResult<()> {
        if self.surface_generation == scheduler.surface_generation() {
            return Ok(());
        }
        // Rebuilds wait for the device, so the old pipeline is no longer in use
        self.pipeline = Self::build_pipeline(
            &self.device,
            scheduler,
            &self.vertex_shader,
            &self.fragment_shader,
            self.set_layout,
        )?;
        self.surface_generation = scheduler.surface_generation();
        log::debug!("Rebuilt triangle pipeline for surface generation {}", self.surface_generation);
        Ok(())
    }

    /// Record the draw; call inside the render pass
    fn record(&self, command_buffer: vk::CommandBuffer, frame_set: vk::DescriptorSet, push: &DrawPush) {
        self.pipeline.bind(command_buffer);
        self.pipeline.bind_descriptor_sets(command_buffer, 0, &[frame_set]);
        self.pipeline.push_constants(command_buffer, DrawPush::STAGES, 0, push);
        self.mesh.bind(command_buffer);
        self.mesh.draw(command_buffer);
    }
}

/// Orbiting light over a flat projection corrected for the window aspect
fn global_ubo(elapsed: f32, aspect_ratio: f32) -> GlobalUbo {
    let mut ubo = GlobalUbo::default();
    ubo.projection_view[0][0] = 1.0 / aspect_ratio;
    ubo.light_position = [2.0 * elapsed.cos(), -1.0, 2.0 * elapsed.sin()];
    ubo
}

fn run(config: &ApplicationConfig) -> Result<(), ViewerError> {
    let mut window = Window::new(&config.window)?;
    let device: SharedDevice = Arc::new(VulkanContext::new(&window, &config.renderer)?);
    let mut scheduler = FrameScheduler::new(&device, &mut window, &config.renderer)?;
    let mut uniforms = FrameUniforms::new(&device)?;
    let mut triangle_pass = TrianglePass::new(&device, &config.renderer.shaders, &scheduler, uniforms.layout())?;

    log::info!(
        "Rendering {}x{} with {} swapchain images",
        scheduler.extent().width,
        scheduler.extent().height,
        scheduler.image_count()
    );

    let start = Instant::now();
    let mut frames: u64 = 0;
    let mut skipped: u64 = 0;

    while !window.should_close() {
        window.poll_events();

        let Some(command_buffer) = scheduler.begin_frame(&mut window)? else {
            skipped += 1;
            continue;
        };

        let frame = scheduler.current_frame_index();
        let elapsed = start.elapsed().as_secs_f32();
        uniforms.update(frame, &global_ubo(elapsed, scheduler.aspect_ratio()))?;
        triangle_pass.prepare(&scheduler)?;

        scheduler.begin_render_pass(command_buffer);
        triangle_pass.record(command_buffer, uniforms.descriptor_set(frame), &DrawPush::spinning(elapsed));
        scheduler.end_render_pass(command_buffer);
        scheduler.end_frame(&mut window)?;
        frames += 1;
    }

    scheduler.wait_idle()?;
    let seconds = start.elapsed().as_secs_f64();
    log::info!(
        "Presented {frames} frames in {seconds:.1}s ({:.1} fps), {skipped} skipped for swapchain rebuilds",
        frames as f64 / seconds.max(f64::EPSILON)
    );
    Ok(())
}

/// Read and validate the config at `path`, or take defaults when it is absent
///
/// Returns whether the file was read, so the caller can report it once
/// logging is set up with the configured level.
fn load_config(path: &Path) -> Result<(ApplicationConfig, bool), ConfigError> {
    let from_file = path.exists();
    let config = if from_file {
        ApplicationConfig::load_from_file(path)?
    } else {
        ApplicationConfig::default()
    };
    config.validate()?;
    Ok((config, from_file))
}

fn main() -> ExitCode {
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let (config, from_file) = match load_config(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    logging::init_with_level(&config.engine.log_level);
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC occurred: {panic_info}");
    }));

    if from_file {
        log::info!("Loaded config from {}", config_path.display());
    } else {
        log::info!("No config at {}, using defaults", config_path.display());
    }

    log::info!("Starting {}", config.renderer.application_name);
    match run(&config) {
        Ok(()) => {
            log::info!("Viewer finished successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Viewer error: {e}");
            ExitCode::FAILURE
        }
    }
}
