use std::sync::Arc;

use ash::vk;
use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder},
};

use crate::{
    config::{RendererConfig, VulkanConfig},
    device::Device,
    error::{Error, Result},
    instance::Instance,
    shader::{ShaderCache, ShaderModules, ShaderSources},
    surface::Surface,
    swapchain::Swapchain,
};

/// Window, Vulkan objects and shaders, held in acquisition order.
///
/// Fields are listed in the order they are released.
pub struct Renderer {
    pub shaders: ShaderModules,
    pub swapchain: Option<Swapchain>,
    pub device: Arc<Device>,
    pub surface: Arc<Surface>,
    pub instance: Arc<Instance>,
    pub window: Window,
    pub depth_format: vk::Format,
}

impl Renderer {
    pub fn start<T: 'static>(event_loop: &EventLoopWindowTarget<T>, config: &RendererConfig) -> Result<Self> {
        let vulkan_config = VulkanConfig::new(config.debug_enabled());

        let window = WindowBuilder::new()
            .with_title(&config.application_name)
            .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
            .build(event_loop)
            .map_err(|e| Error::PlatformInit(e.to_string()))?;
        log::info!("Created window \"{}\"", config.application_name);

        let surface_extensions = Surface::required_extensions(&window)?;
        let instance = Arc::new(Instance::new(
            &config.application_name,
            &surface_extensions,
            &vulkan_config,
        )?);
        let surface = Arc::new(Surface::new(&window, &instance)?);
        let physical_device = instance.select_physical_device(&surface, &vulkan_config)?;
        let depth_format = physical_device.find_depth_format(&instance)?;
        log::debug!("Depth format {depth_format:?}");

        let device = Arc::new(Device::new(
            instance.clone(),
            physical_device,
            &vulkan_config,
        )?);
        let swapchain = Swapchain::new(&device, &surface, window_extent(&window))?;

        let mut shader_cache = ShaderCache::new(&config.shaders.data_dir)?;
        let stages = shader_cache.ensure_compiled(&ShaderSources {
            vertex: config.shaders.vertex_path(),
            fragment: config.shaders.fragment_path(),
        })?;
        let shaders = ShaderModules::new(&device, &stages)?;

        Ok(Self {
            shaders,
            swapchain: Some(swapchain),
            device,
            surface,
            instance,
            window,
            depth_format,
        })
    }

    /// Rebuilds the swapchain for the window's current size. Skipped while the
    /// window has no area.
    pub fn resize(&mut self) -> Result<()> {
        let extent = window_extent(&self.window);
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }
        self.device.wait_idle()?;
        self.swapchain = None;
        self.swapchain = Some(Swapchain::new(&self.device, &self.surface, extent)?);
        Ok(())
    }

    /// Releases everything in reverse acquisition order.
    pub fn stop(self) {
        let Self {
            shaders,
            swapchain,
            device,
            surface,
            instance,
            window,
            ..
        } = self;
        if let Err(e) = device.wait_idle() {
            log::warn!("Device did not go idle before teardown: {e}");
        }
        drop(shaders);
        drop(swapchain);
        drop(device);
        drop(surface);
        drop(instance);
        drop(window);
        log::info!("Destroyed window");
    }
}

fn window_extent(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}
