use std::ffi::CStr;

use ash::vk;

use crate::{
    config::VulkanConfig,
    error::{Error, Result},
    instance::Instance,
    queue_family::{QueueFamily, QueueFamilyAssignment},
    surface::{Surface, SurfaceSupport},
};

/// Everything learned about one GPU during selection.
///
/// Built once per enumeration pass and not changed after scoring, apart from
/// the memory snapshot filled in for the winner.
#[derive(Debug, Clone)]
pub struct PhysicalDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub queue_families: Vec<QueueFamily>,
    pub queues: QueueFamilyAssignment,
    pub missing_extensions: Vec<String>,
    /// Only probed when no required extension is missing.
    pub surface_support: Option<SurfaceSupport>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub score: u32,
}

impl PhysicalDevice {
    pub fn evaluate(
        instance: &Instance,
        handle: vk::PhysicalDevice,
        surface: &Surface,
        config: &VulkanConfig,
    ) -> Result<Self> {
        let raw = &instance.handle;
        let properties = unsafe { raw.get_physical_device_properties(handle) };
        let features = unsafe { raw.get_physical_device_features(handle) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let queue_families: Vec<QueueFamily> =
            unsafe { raw.get_physical_device_queue_family_properties(handle) }
                .iter()
                .enumerate()
                .map(|(index, &properties)| QueueFamily {
                    index: index as u32,
                    properties,
                })
                .collect();

        let extensions = unsafe { raw.enumerate_device_extension_properties(handle)? };
        let missing_extensions = config.missing_device_extensions(
            extensions
                .iter()
                .map(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }),
        );
        let surface_support = if missing_extensions.is_empty() {
            Some(SurfaceSupport::probe(surface, handle)?)
        } else {
            log::debug!("{name} is missing {missing_extensions:?}");
            None
        };

        let queues = QueueFamilyAssignment::resolve(&queue_families, |family| {
            surface.supports_present(handle, family)
        })?;

        Ok(Self::from_parts(
            handle,
            name,
            properties,
            features,
            queue_families,
            queues,
            missing_extensions,
            surface_support,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        handle: vk::PhysicalDevice,
        name: String,
        properties: vk::PhysicalDeviceProperties,
        features: vk::PhysicalDeviceFeatures,
        queue_families: Vec<QueueFamily>,
        queues: QueueFamilyAssignment,
        missing_extensions: Vec<String>,
        surface_support: Option<SurfaceSupport>,
    ) -> Self {
        let mut device = Self {
            handle,
            name,
            properties,
            features,
            queue_families,
            queues,
            missing_extensions,
            surface_support,
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            score: 0,
        };
        device.score = device.compute_score();
        device
    }

    pub fn has_required_extensions(&self) -> bool {
        self.missing_extensions.is_empty()
    }

    pub fn has_adequate_surface(&self) -> bool {
        self.surface_support
            .as_ref()
            .is_some_and(SurfaceSupport::is_adequate)
    }

    pub fn is_discrete(&self) -> bool {
        self.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    pub fn is_eligible(&self) -> bool {
        self.queues.is_complete() && self.has_required_extensions() && self.has_adequate_surface()
    }

    /// Zero for ineligible candidates, whatever criteria they do meet.
    fn compute_score(&self) -> u32 {
        if !self.is_eligible() {
            return 0;
        }
        [
            self.queues.is_complete(),
            self.has_required_extensions(),
            self.has_adequate_surface(),
            self.is_discrete(),
        ]
        .into_iter()
        .map(u32::from)
        .sum()
    }

    pub fn memory_type_index(
        &self,
        memory_type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        let memory_properties = &self.memory_properties;
        memory_properties.memory_types[..memory_properties.memory_type_count as _]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                (1 << index) & memory_type_bits != 0 && memory_type.property_flags.contains(flags)
            })
            .map(|(index, _)| index as u32)
    }

    pub fn find_supported_format(
        &self,
        instance: &Instance,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        first_supported_format(candidates, tiling, features, |format| unsafe {
            instance
                .handle
                .get_physical_device_format_properties(self.handle, format)
        })
    }

    pub fn find_depth_format(&self, instance: &Instance) -> Result<vk::Format> {
        self.find_supported_format(
            instance,
            &[
                vk::Format::D32_SFLOAT,
                vk::Format::D32_SFLOAT_S8_UINT,
                vk::Format::D24_UNORM_S8_UINT,
            ],
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
    }
}

/// Evaluates every enumerated GPU and keeps the best one. Only the winner gets
/// its memory snapshot taken.
pub fn select_from(
    handles: &[vk::PhysicalDevice],
    evaluate: impl FnMut(vk::PhysicalDevice) -> Result<PhysicalDevice>,
    memory_properties_of: impl FnOnce(vk::PhysicalDevice) -> vk::PhysicalDeviceMemoryProperties,
) -> Result<PhysicalDevice> {
    if handles.is_empty() {
        return Err(Error::NoGpuFound);
    }
    log::info!("Found {} GPUs", handles.len());

    let candidates = handles
        .iter()
        .copied()
        .map(evaluate)
        .collect::<Result<Vec<PhysicalDevice>>>()?;
    for candidate in &candidates {
        log::debug!(
            "{}: score {}, eligible {}",
            candidate.name,
            candidate.score,
            candidate.is_eligible()
        );
    }

    let mut selected = select_best(candidates)?;
    selected.memory_properties = memory_properties_of(selected.handle);
    Ok(selected)
}

/// Highest scoring eligible candidate, first one wins a tie.
pub fn select_best(candidates: impl IntoIterator<Item = PhysicalDevice>) -> Result<PhysicalDevice> {
    let mut best: Option<PhysicalDevice> = None;
    for candidate in candidates {
        if !candidate.is_eligible() {
            continue;
        }
        if best.as_ref().map_or(true, |best| candidate.score > best.score) {
            best = Some(candidate);
        }
    }
    best.ok_or(Error::NoSuitableGpu)
}

fn first_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    properties_of: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Result<vk::Format> {
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let properties = properties_of(format);
            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or(Error::UnsupportedFormat { tiling, features })
}
