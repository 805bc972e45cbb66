use std::{ffi::c_char, sync::Arc};

use ash::vk;

use crate::{
    config::VulkanConfig,
    error::{Error, Result},
    instance::Instance,
    physical_device::PhysicalDevice,
};

#[derive(Debug, Clone, Copy)]
pub struct Queue {
    pub handle: vk::Queue,
    pub family_index: u32,
}

pub struct Device {
    pub handle: ash::Device,
    pub instance: Arc<Instance>,
    pub physical_device: PhysicalDevice,
    pub graphics_queue: Queue,
    pub present_queue: Queue,
    pub transfer_queue: Option<Queue>,
}

impl Device {
    pub fn new(
        instance: Arc<Instance>,
        physical_device: PhysicalDevice,
        config: &VulkanConfig,
    ) -> Result<Self> {
        let queues = physical_device.queues;
        let (Some(graphics_family), Some(present_family)) =
            (queues.graphics_family, queues.present_family)
        else {
            return Err(Error::NoSuitableGpu);
        };

        let priorities = [1.0];
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queues
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();
        let extension_names: Vec<*const c_char> = config
            .required_device_extensions
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let layer_names: Vec<*const c_char> = instance
            .enabled_layers
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let handle = unsafe {
            instance.handle.create_device(
                physical_device.handle,
                &vk::DeviceCreateInfo::builder()
                    .queue_create_infos(&queue_create_infos)
                    .enabled_extension_names(&extension_names)
                    .enabled_layer_names(&layer_names),
                None,
            )?
        };
        log::info!("Created logical device");

        let queue = |family_index| Queue {
            handle: unsafe { handle.get_device_queue(family_index, 0) },
            family_index,
        };
        let graphics_queue = queue(graphics_family);
        let present_queue = queue(present_family);
        let transfer_queue = queues
            .transfer_family
            .filter(|_| queues.is_transfer_complete())
            .map(queue);

        Ok(Self {
            handle,
            instance,
            physical_device,
            graphics_queue,
            present_queue,
            transfer_queue,
        })
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.handle.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            let _ = self.handle.device_wait_idle();
            self.handle.destroy_device(None);
        }
        log::info!("Destroyed logical device");
    }
}
