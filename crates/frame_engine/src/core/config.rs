//! # Unified Configuration System
//!
//! Settings for the three collaborators the frame engine talks to: the
//! logger, the window and the Vulkan renderer. [`ApplicationConfig`] groups
//! them and is what applications load from disk.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: logging
//! - **Window Config**: title and initial drawable size
//! - **Renderer Config**: instance metadata, validation, present mode, clear values, shaders

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// Which present mode the swapchain should try first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Mailbox (low-latency triple buffering) when offered, FIFO otherwise
    #[default]
    LowLatency,
    /// Always FIFO
    Vsync,
}

/// # Engine Configuration
///
/// Process-wide behaviour that is not tied to a subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter passed to `env_logger` (`RUST_LOG` still wins)
    pub log_level: String,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Window Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl WindowConfig {
    /// Create a window configuration with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            resizable: true,
        }
    }

    /// Validate the window settings
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "Window size must be non-zero, got {}x{}",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("Frame Engine", 800, 600)
    }
}

/// Where to find the compiled SPIR-V for the graphics pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Vertex shader SPIR-V file
    pub vertex_shader_path: PathBuf,
    /// Fragment shader SPIR-V file
    pub fragment_shader_path: PathBuf,
}

impl ShaderConfig {
    /// Create a shader configuration from two SPIR-V paths
    pub fn new(vertex_path: impl Into<PathBuf>, fragment_path: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Vertex shader path after [`Self::resolve_path`]
    pub fn vertex_shader(&self) -> PathBuf {
        Self::resolve_path(&self.vertex_shader_path)
    }

    /// Fragment shader path after [`Self::resolve_path`]
    pub fn fragment_shader(&self) -> PathBuf {
        Self::resolve_path(&self.fragment_shader_path)
    }

    /// Resolve a shader path for binaries started from the workspace root or
    /// from a member directory
    ///
    /// Tries the path as given, then `target/shaders/<file>` and
    /// `../target/shaders/<file>`. Returns the path unchanged when none exists
    /// so the load error names what was configured.
    pub fn resolve_path(path: &Path) -> PathBuf {
        if path.exists() {
            return path.to_path_buf();
        }
        let Some(file_name) = path.file_name() else {
            return path.to_path_buf();
        };
        [Path::new("target/shaders"), Path::new("../target/shaders")]
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| path.to_path_buf())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders/simple.vert.spv", "target/shaders/simple.frag.spv")
    }
}

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan backend: application metadata for
/// instance creation, validation layers and presentation behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Present mode preference
    pub present_mode: PresentModePreference,
    /// Color attachment clear value (RGBA)
    pub clear_color: [f32; 4],
    /// Depth attachment clear value
    pub depth_clear: f32,
    /// SPIR-V for the graphics pipeline
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            enable_validation: None,
            present_mode: PresentModePreference::LowLatency,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            depth_clear: 1.0,
            shaders: ShaderConfig::default(),
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the present mode preference
    pub fn with_present_mode(mut self, preference: PresentModePreference) -> Self {
        self.present_mode = preference;
        self
    }

    /// Set the color clear value
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the SPIR-V paths
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Resolved validation flag
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if !(0.0..=1.0).contains(&self.depth_clear) {
            return Err(format!("Depth clear value {} is outside [0, 1]", self.depth_clear));
        }

        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err("Clear color components must be finite".to_string());
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Frame Engine Application")
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that applications load from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Window configuration
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        Self {
            engine: EngineConfig::default(),
            window: WindowConfig::new(app_name.clone(), 800, 600),
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate().map_err(ConfigError::Invalid)?;
        self.renderer.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

impl Config for ApplicationConfig {}
