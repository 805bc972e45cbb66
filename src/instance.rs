use std::ffi::{c_char, c_void, CStr, CString};

use ash::{extensions::ext, vk};

use crate::{
    config::VulkanConfig,
    error::{Error, Result},
    physical_device::{select_from, PhysicalDevice},
    surface::Surface,
};

pub struct Instance {
    pub entry: ash::Entry,
    pub handle: ash::Instance,
    /// Validation layers the loader actually offered.
    pub enabled_layers: Vec<CString>,
    debug_messenger: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// `surface_extensions` comes from the window system, see
    /// [`Surface::required_extensions`].
    pub fn new(
        application_name: &str,
        surface_extensions: &[&CStr],
        config: &VulkanConfig,
    ) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let application_name = CString::new(application_name)
            .map_err(|e| Error::PlatformInit(e.to_string()))?;
        let engine_name = CString::new(env!("CARGO_PKG_NAME"))
            .map_err(|e| Error::PlatformInit(e.to_string()))?;

        let extensions = available_extensions(&entry, &config.required_instance_extensions)?;
        let debug_utils = config.debug_enabled
            && extensions
                .iter()
                .any(|name| name.as_c_str() == ext::DebugUtils::name());
        let mut extension_names: Vec<*const c_char> =
            surface_extensions.iter().map(|name| name.as_ptr()).collect();
        for name in &extensions {
            if !surface_extensions.contains(&name.as_c_str()) {
                extension_names.push(name.as_ptr());
            }
        }

        let enabled_layers = available_layers(&entry, &config.validation_layers)?;
        let layer_names: Vec<*const c_char> =
            enabled_layers.iter().map(|name| name.as_ptr()).collect();

        let mut messenger_info = debug_messenger_info();
        let handle = {
            let application_info = vk::ApplicationInfo::builder()
                .application_name(&application_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(&engine_name)
                .engine_version(vk::make_api_version(0, 1, 0, 0))
                .api_version(vk::API_VERSION_1_0);
            let mut create_info = vk::InstanceCreateInfo::builder()
                .application_info(&application_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);
            if debug_utils {
                create_info = create_info.push_next(&mut messenger_info);
            }
            unsafe {
                entry
                    .create_instance(&create_info, None)
                    .map_err(|e| Error::PlatformInit(format!("failed to create instance: {e}")))?
            }
        };
        log::info!("Created Vulkan instance");

        let debug_messenger = if debug_utils {
            let functions = ext::DebugUtils::new(&entry, &handle);
            let messenger = unsafe { functions.create_debug_utils_messenger(&messenger_info, None) };
            match messenger {
                Ok(messenger) => Some((functions, messenger)),
                Err(e) => {
                    unsafe { handle.destroy_instance(None) };
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            handle,
            enabled_layers,
            debug_messenger,
        })
    }

    /// Looks at every GPU and keeps the best one for `surface`.
    pub fn select_physical_device(
        &self,
        surface: &Surface,
        config: &VulkanConfig,
    ) -> Result<PhysicalDevice> {
        let handles = unsafe { self.handle.enumerate_physical_devices()? };
        let selected = select_from(
            &handles,
            |handle| PhysicalDevice::evaluate(self, handle, surface, config),
            |handle| unsafe { self.handle.get_physical_device_memory_properties(handle) },
        )?;
        log::info!("Selected GPU: {}", selected.name);
        Ok(selected)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.handle.destroy_instance(None);
        }
        log::info!("Destroyed Vulkan instance");
    }
}

fn available_layers(entry: &ash::Entry, requested: &[CString]) -> Result<Vec<CString>> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let properties = unsafe { entry.enumerate_instance_layer_properties()? };
    let found: Vec<&CStr> = properties
        .iter()
        .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) })
        .collect();
    for name in &found {
        log::debug!("Found layer: {}", name.to_string_lossy());
    }
    Ok(keep_available(requested, &found, "Validation layer"))
}

fn available_extensions(entry: &ash::Entry, requested: &[CString]) -> Result<Vec<CString>> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let properties = unsafe { entry.enumerate_instance_extension_properties(None)? };
    let found: Vec<&CStr> = properties
        .iter()
        .map(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) })
        .collect();
    Ok(keep_available(requested, &found, "Instance extension"))
}

/// Requested names the loader reports, in request order. The rest are logged
/// and dropped.
fn keep_available(requested: &[CString], found: &[&CStr], kind: &str) -> Vec<CString> {
    requested
        .iter()
        .filter(|name| {
            let present = found.contains(&name.as_c_str());
            if !present {
                log::warn!("{kind} {} is not available", name.to_string_lossy());
            }
            present
        })
        .cloned()
        .collect()
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::info!("[Vulkan] {message}");
    } else {
        log::debug!("[Vulkan] {message}");
    }
    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_names_are_dropped() {
        let requested = [
            ext::DebugUtils::name().to_owned(),
            CString::new("VK_LAYER_KHRONOS_validation").unwrap(),
        ];
        let found = [c"VK_LAYER_KHRONOS_validation", c"VK_LAYER_MESA_overlay"];
        assert_eq!(
            keep_available(&requested, &found, "Layer"),
            vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()]
        );
    }

    #[test]
    fn missing_debug_utils_leaves_nothing_to_enable() {
        let requested = [ext::DebugUtils::name().to_owned()];
        assert!(keep_available(&requested, &[], "Instance extension").is_empty());
        assert_eq!(
            keep_available(&requested, &[ext::DebugUtils::name()], "Instance extension"),
            requested.to_vec()
        );
    }
}
