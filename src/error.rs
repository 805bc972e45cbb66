use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

/// Everything that can stop the bootstrap sequence.
///
/// None of these are recovered locally; they travel up to the caller of
/// [`Renderer::start`](crate::renderer::Renderer::start) or
/// [`ShaderCache::ensure_compiled`](crate::shader::ShaderCache::ensure_compiled).
#[derive(Debug, Error)]
pub enum Error {
    #[error("platform initialization failed: {0}")]
    PlatformInit(String),

    #[error("failed to find a GPU with Vulkan support")]
    NoGpuFound,

    #[error("failed to find a suitable GPU")]
    NoSuitableGpu,

    #[error("failed to create Vulkan surface: {0}")]
    SurfaceCreation(String),

    #[error("failed to create swapchain: {0}")]
    SwapchainCreation(String),

    #[error("{path:?} has the wrong extension, expected .{expected}")]
    InvalidShaderExtension {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("shader compilation error in {file}:\n{message}")]
    ShaderCompilation { file: String, message: String },

    #[error("compiled shader {0:?} does not exist")]
    MissingCompiledArtifact(PathBuf),

    #[error("no candidate format supports {features:?} with {tiling:?} tiling")]
    UnsupportedFormat {
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    },

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),

    #[error("failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
