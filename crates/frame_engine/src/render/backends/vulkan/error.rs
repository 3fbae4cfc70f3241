//! Vulkan backend error types
//!
//! Errors returned from the backend fall into two groups. Recoverable ones
//! ([`VulkanError::PoolExhausted`]) are expected at runtime and handled by the
//! caller. Everything else means the device or surface cannot continue and is
//! propagated to the process boundary. Chain staleness (out-of-date or
//! suboptimal) is not an error at all; it is reported through status enums.

use ash::vk;
use thiserror::Error;

/// Host mapping failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// The memory already has an active host mapping
    #[error("memory is already mapped")]
    AlreadyMapped,

    /// The memory was not allocated with `HOST_VISIBLE`
    #[error("memory is not host visible")]
    NotHostVisible,
}

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A driver call failed
    #[error("{call} failed: {result:?}")]
    Api {
        /// Name of the failing entry point
        call: &'static str,
        /// Result code returned by the driver
        result: vk::Result,
    },

    /// Host mapping failed
    #[error("Map failed: {0}")]
    Map(#[from] MapError),

    /// A descriptor layout declared the same binding slot twice
    #[error("Descriptor binding {binding} is already in use")]
    DuplicateBinding {
        /// Offending binding slot
        binding: u32,
    },

    /// The descriptor pool has no room left for another set
    #[error("Descriptor pool exhausted")]
    PoolExhausted,

    /// None of the candidate formats supports the requested features
    #[error("No supported format among {candidates:?}")]
    UnsupportedFormat {
        /// Formats that were probed, in preference order
        candidates: Vec<vk::Format>,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// The surface reported no formats at all
    #[error("Surface offers no formats")]
    NoSurfaceFormats,

    /// Swapchain image or depth format changed across recreation
    #[error("Swapchain format changed across recreation: color {old_color:?} -> {new_color:?}, depth {old_depth:?} -> {new_depth:?}")]
    FormatChanged {
        /// Color format of the replaced chain
        old_color: vk::Format,
        /// Color format of the new chain
        new_color: vk::Format,
        /// Depth format of the replaced chain
        old_depth: vk::Format,
        /// Depth format of the new chain
        new_depth: vk::Format,
    },

    /// Shader bytecode could not be read or is not SPIR-V
    #[error("Invalid shader {source_name}: {reason}")]
    InvalidShader {
        /// File path, or a description for in-memory code
        source_name: String,
        /// What was wrong with it
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl VulkanError {
    /// Wrap a driver result with the name of the call that produced it
    pub fn api(call: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| Self::Api { call, result }
    }

    /// Whether the caller can reasonably retry (e.g. with another pool)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PoolExhausted)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;
