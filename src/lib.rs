pub mod config;
pub mod device;
pub mod error;
pub mod files;
pub mod instance;
pub mod physical_device;
pub mod queue_family;
pub mod renderer;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use error::{Error, Result};
