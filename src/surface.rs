use std::{
    ffi::{c_void, CStr},
    sync::Arc,
};

use ash::{extensions::khr, vk};
use raw_window_handle::{
    HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

use crate::{
    error::{Error, Result},
    instance::Instance,
};

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    pub functions: khr::Surface,
    pub instance: Arc<Instance>,
}

impl Surface {
    pub fn new(
        window: &(impl HasWindowHandle + HasDisplayHandle),
        instance: &Arc<Instance>,
    ) -> Result<Self> {
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::SurfaceCreation(e.to_string()))?
            .as_raw();
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::SurfaceCreation(e.to_string()))?
            .as_raw();
        let entry = &instance.entry;
        let raw_instance = &instance.handle;

        let handle = match (window_handle, display_handle) {
            (RawWindowHandle::Win32(window_handle), _) => {
                let hinstance = window_handle
                    .hinstance
                    .map_or(std::ptr::null(), |h| h.get() as *const c_void);
                let hwnd = window_handle.hwnd.get() as *const c_void;
                unsafe {
                    khr::Win32Surface::new(entry, raw_instance).create_win32_surface(
                        &vk::Win32SurfaceCreateInfoKHR::builder()
                            .hinstance(hinstance)
                            .hwnd(hwnd),
                        None,
                    )
                }
            }
            (RawWindowHandle::Xlib(window_handle), RawDisplayHandle::Xlib(display_handle)) => {
                let display = display_handle
                    .display
                    .ok_or_else(|| Error::SurfaceCreation("Xlib display is null".to_owned()))?;
                unsafe {
                    khr::XlibSurface::new(entry, raw_instance).create_xlib_surface(
                        &vk::XlibSurfaceCreateInfoKHR::builder()
                            .dpy(display.as_ptr().cast())
                            .window(window_handle.window),
                        None,
                    )
                }
            }
            (RawWindowHandle::Xcb(window_handle), RawDisplayHandle::Xcb(display_handle)) => {
                let connection = display_handle
                    .connection
                    .ok_or_else(|| Error::SurfaceCreation("XCB connection is null".to_owned()))?;
                unsafe {
                    khr::XcbSurface::new(entry, raw_instance).create_xcb_surface(
                        &vk::XcbSurfaceCreateInfoKHR::builder()
                            .connection(connection.as_ptr().cast())
                            .window(window_handle.window.get()),
                        None,
                    )
                }
            }
            (
                RawWindowHandle::Wayland(window_handle),
                RawDisplayHandle::Wayland(display_handle),
            ) => unsafe {
                khr::WaylandSurface::new(entry, raw_instance).create_wayland_surface(
                    &vk::WaylandSurfaceCreateInfoKHR::builder()
                        .display(display_handle.display.as_ptr().cast())
                        .surface(window_handle.surface.as_ptr().cast()),
                    None,
                )
            },
            (window_handle, _) => {
                return Err(Error::SurfaceCreation(format!(
                    "unsupported window system {window_handle:?}"
                )))
            }
        }
        .map_err(|e| Error::SurfaceCreation(e.to_string()))?;

        let functions = khr::Surface::new(entry, raw_instance);
        log::info!("Created Vulkan surface");
        Ok(Self {
            handle,
            functions,
            instance: instance.clone(),
        })
    }

    /// Instance extensions needed to create a surface on this display.
    pub fn required_extensions(display: &impl HasDisplayHandle) -> Result<Vec<&'static CStr>> {
        let display = display
            .display_handle()
            .map_err(|e| Error::PlatformInit(e.to_string()))?;
        let platform = match display.as_raw() {
            RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
            RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
            RawDisplayHandle::Xcb(_) => khr::XcbSurface::name(),
            RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
            other => {
                return Err(Error::PlatformInit(format!(
                    "unsupported display {other:?}"
                )))
            }
        };
        Ok(vec![khr::Surface::name(), platform])
    }

    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, family: u32) -> Result<bool> {
        Ok(unsafe {
            self.functions
                .get_physical_device_surface_support(physical_device, family, self.handle)?
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.functions.destroy_surface(self.handle, None) };
        log::info!("Destroyed Vulkan surface");
    }
}

/// What a GPU can do with a particular surface. Only valid for that pair.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn probe(surface: &Surface, physical_device: vk::PhysicalDevice) -> Result<Self> {
        let functions = &surface.functions;
        let (capabilities, formats, present_modes) = unsafe {
            (
                functions.get_physical_device_surface_capabilities(physical_device, surface.handle)?,
                functions.get_physical_device_surface_formats(physical_device, surface.handle)?,
                functions
                    .get_physical_device_surface_present_modes(physical_device, surface.handle)?,
            )
        };
        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adequate_needs_formats_and_present_modes() {
        let format = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let mut support = SurfaceSupport::default();
        assert!(!support.is_adequate());
        support.formats.push(format);
        assert!(!support.is_adequate());
        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
        support.formats.clear();
        assert!(!support.is_adequate());
    }
}
