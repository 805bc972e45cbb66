use std::{
    ffi::{CStr, CString},
    fs,
    path::{Path, PathBuf},
};

use ash::extensions::{ext, khr};
use serde::Deserialize;

use crate::error::{Error, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// User facing settings, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub application_name: String,
    pub window: WindowConfig,
    pub shaders: ShaderConfig,
    /// Unset follows the build mode.
    pub validation: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

/// Where shader sources live and where compiled artifacts go.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub resource_dir: PathBuf,
    pub data_dir: PathBuf,
    pub vertex: String,
    pub fragment: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "vulkan-bootstrap".to_owned(),
            window: WindowConfig::default(),
            shaders: ShaderConfig::default(),
            validation: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
        }
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("shaders"),
            data_dir: PathBuf::from("target/shaders"),
            vertex: "triangle.vert".to_owned(),
            fragment: "triangle.frag".to_owned(),
        }
    }
}

impl RendererConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn debug_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl ShaderConfig {
    pub fn vertex_path(&self) -> PathBuf {
        self.resource_dir.join(&self.vertex)
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.resource_dir.join(&self.fragment)
    }
}

/// Extension and layer lists handed to instance and device creation.
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    pub required_instance_extensions: Vec<CString>,
    pub required_device_extensions: Vec<CString>,
    pub validation_layers: Vec<CString>,
    pub debug_enabled: bool,
}

impl VulkanConfig {
    pub fn new(debug_enabled: bool) -> Self {
        let mut required_instance_extensions = Vec::new();
        let mut validation_layers = Vec::new();
        if debug_enabled {
            required_instance_extensions.push(ext::DebugUtils::name().to_owned());
            validation_layers.push(VALIDATION_LAYER.to_owned());
        }
        Self {
            required_instance_extensions,
            required_device_extensions: vec![khr::Swapchain::name().to_owned()],
            validation_layers,
            debug_enabled,
        }
    }

    pub fn missing_device_extensions<'a>(
        &self,
        available: impl IntoIterator<Item = &'a CStr> + Clone,
    ) -> Vec<String> {
        self.required_device_extensions
            .iter()
            .filter(|required| {
                !available
                    .clone()
                    .into_iter()
                    .any(|name| name == required.as_c_str())
            })
            .map(|required| required.to_string_lossy().into_owned())
            .collect()
    }
}
