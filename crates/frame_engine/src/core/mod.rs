//! # Core Engine Module
//!
//! Shared configuration used by every subsystem of the frame engine.

pub mod config;

pub use config::{
    ApplicationConfig,
    Config,
    ConfigError,
    EngineConfig,
    PresentModePreference,
    RendererConfig,
    ShaderConfig,
    WindowConfig,
};
