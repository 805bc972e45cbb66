use std::sync::Arc;

use ash::{extensions::khr, vk};

use crate::{
    device::Device,
    error::{Error, Result},
    queue_family::QueueFamilyAssignment,
    surface::{Surface, SurfaceSupport},
};

const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    Exclusive,
    Concurrent([u32; 2]),
}

/// The decisions that go into a swapchain, before anything is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfiguration {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing: ImageSharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfiguration {
    pub fn negotiate(
        support: &SurfaceSupport,
        queues: &QueueFamilyAssignment,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            Error::SwapchainCreation("surface reports no formats".to_owned())
        })?;
        let sharing = match (queues.graphics_family, queues.present_family) {
            (Some(graphics), Some(present)) => choose_sharing(graphics, present),
            _ => {
                return Err(Error::SwapchainCreation(
                    "queue families are incomplete".to_owned(),
                ))
            }
        };
        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, window_extent),
            image_count: choose_image_count(&support.capabilities),
            sharing,
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// BGRA8 sRGB when offered, otherwise whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|format| *format == PREFERRED_FORMAT)
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|&present_mode| present_mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Uses the window size only when the surface leaves the extent up to us.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: window_extent.width.clamp(min.width, max.width.max(min.width)),
        height: window_extent.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// One more than the minimum, capped by the maximum; a maximum of 0 means no cap.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

pub fn choose_sharing(graphics_family: u32, present_family: u32) -> ImageSharing {
    if graphics_family == present_family {
        ImageSharing::Exclusive
    } else {
        ImageSharing::Concurrent([graphics_family, present_family])
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub functions: khr::Swapchain,
    pub configuration: SwapchainConfiguration,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub device: Arc<Device>,
}

impl Swapchain {
    /// Probes the surface again, so this also serves for recreation after a resize.
    pub fn new(
        device: &Arc<Device>,
        surface: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self> {
        let support = SurfaceSupport::probe(surface, device.physical_device.handle)?;
        let configuration =
            SwapchainConfiguration::negotiate(&support, &device.physical_device.queues, window_extent)?;
        log::debug!("Negotiated {configuration:?}");

        let functions = khr::Swapchain::new(&device.instance.handle, &device.handle);
        let (sharing_mode, queue_family_indices) = match &configuration.sharing {
            ImageSharing::Exclusive => (vk::SharingMode::EXCLUSIVE, &[][..]),
            ImageSharing::Concurrent(families) => (vk::SharingMode::CONCURRENT, &families[..]),
        };
        let handle = unsafe {
            functions
                .create_swapchain(
                    &vk::SwapchainCreateInfoKHR::builder()
                        .surface(surface.handle)
                        .min_image_count(configuration.image_count)
                        .image_format(configuration.surface_format.format)
                        .image_color_space(configuration.surface_format.color_space)
                        .image_extent(configuration.extent)
                        .image_array_layers(1)
                        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                        .image_sharing_mode(sharing_mode)
                        .queue_family_indices(queue_family_indices)
                        .pre_transform(configuration.pre_transform)
                        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                        .present_mode(configuration.present_mode)
                        .clipped(true)
                        .old_swapchain(vk::SwapchainKHR::null()),
                    None,
                )
                .map_err(|e| Error::SwapchainCreation(e.to_string()))?
        };
        log::info!(
            "Created swapchain {}x{} {:?} {:?}",
            configuration.extent.width,
            configuration.extent.height,
            configuration.surface_format.format,
            configuration.present_mode
        );

        let mut swapchain = Self {
            handle,
            functions,
            configuration,
            images: Vec::new(),
            image_views: Vec::new(),
            device: device.clone(),
        };
        swapchain.images = unsafe { swapchain.functions.get_swapchain_images(handle)? };
        for (index, &image) in swapchain.images.iter().enumerate() {
            let image_view = create_image_view(device, image, configuration.surface_format.format)?;
            swapchain.image_views.push(image_view);
            log::debug!("Created image view {index}");
        }
        Ok(swapchain)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for image_view in self.image_views.drain(..) {
                self.device.handle.destroy_image_view(image_view, None);
            }
            self.functions.destroy_swapchain(self.handle, None);
        }
        log::info!("Destroyed swapchain");
    }
}

fn create_image_view(device: &Device, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(
            vk::ImageSubresourceRange::builder()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1)
                .build(),
        );
    Ok(unsafe { device.handle.create_image_view(&create_info, None)? })
}
