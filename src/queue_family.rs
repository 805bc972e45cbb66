use ash::vk;

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

impl QueueFamily {
    pub fn supports(&self, flags: vk::QueueFlags) -> bool {
        self.properties.queue_flags.contains(flags)
    }
}

/// Which queue family each kind of work goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyAssignment {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
    pub transfer_family: Option<u32>,
}

impl QueueFamilyAssignment {
    /// Greedy scan in index order: every role goes to the first family that can
    /// take it, even when a later transfer-only family exists.
    ///
    /// `supports_present` is asked about each family index until a present
    /// family is found. The scan stops as soon as all three roles are filled.
    pub fn resolve(
        queue_families: &[QueueFamily],
        mut supports_present: impl FnMut(u32) -> Result<bool>,
    ) -> Result<Self> {
        let mut assignment = Self::default();
        for queue_family in queue_families {
            if assignment.graphics_family.is_none() && queue_family.supports(vk::QueueFlags::GRAPHICS)
            {
                assignment.graphics_family = Some(queue_family.index);
            }
            if assignment.transfer_family.is_none() && queue_family.supports(vk::QueueFlags::TRANSFER)
            {
                assignment.transfer_family = Some(queue_family.index);
            }
            if assignment.present_family.is_none() && supports_present(queue_family.index)? {
                assignment.present_family = Some(queue_family.index);
            }
            if assignment.is_transfer_complete() {
                break;
            }
        }
        Ok(assignment)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    pub fn is_transfer_complete(&self) -> bool {
        self.is_complete() && self.transfer_family.is_some()
    }

    /// Families that need a queue on the logical device, without duplicates.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = vec![self.graphics_family, self.present_family];
        if self.is_transfer_complete() {
            families.push(self.transfer_family);
        }
        let mut unique: Vec<u32> = Vec::with_capacity(3);
        for family in families.into_iter().flatten() {
            if !unique.contains(&family) {
                unique.push(family);
            }
        }
        unique
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn family(index: u32, queue_flags: vk::QueueFlags) -> QueueFamily {
        QueueFamily {
            index,
            properties: vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            },
        }
    }

    fn present_on(indices: &'static [u32]) -> impl FnMut(u32) -> Result<bool> {
        move |index| Ok(indices.contains(&index))
    }

    #[test]
    fn single_universal_family_fills_every_role() {
        let families = [family(
            0,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        )];
        let assignment = QueueFamilyAssignment::resolve(&families, present_on(&[0])).unwrap();
        assert_eq!(assignment.graphics_family, Some(0));
        assert_eq!(assignment.present_family, Some(0));
        assert_eq!(assignment.transfer_family, Some(0));
        assert!(assignment.is_transfer_complete());
        assert_eq!(assignment.unique_families(), vec![0]);
    }

    #[test]
    fn takes_first_family_not_dedicated_transfer() {
        let families = [
            family(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
            family(1, vk::QueueFlags::TRANSFER),
        ];
        let assignment = QueueFamilyAssignment::resolve(&families, present_on(&[0, 1])).unwrap();
        assert_eq!(assignment.transfer_family, Some(0));
    }

    #[test]
    fn present_may_come_from_another_family() {
        let families = [
            family(0, vk::QueueFlags::GRAPHICS),
            family(1, vk::QueueFlags::COMPUTE),
            family(2, vk::QueueFlags::TRANSFER),
        ];
        let assignment = QueueFamilyAssignment::resolve(&families, present_on(&[1])).unwrap();
        assert_eq!(
            assignment,
            QueueFamilyAssignment {
                graphics_family: Some(0),
                present_family: Some(1),
                transfer_family: Some(2),
            }
        );
        assert_eq!(assignment.unique_families(), vec![0, 1, 2]);
    }

    #[test]
    fn stops_querying_once_transfer_complete() {
        let families = [
            family(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
            family(1, vk::QueueFlags::GRAPHICS),
            family(2, vk::QueueFlags::GRAPHICS),
        ];
        let mut asked = Vec::new();
        QueueFamilyAssignment::resolve(&families, |index| {
            asked.push(index);
            Ok(true)
        })
        .unwrap();
        assert_eq!(asked, vec![0]);
    }

    #[test]
    fn no_present_support_is_incomplete() {
        let families = [family(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER)];
        let assignment = QueueFamilyAssignment::resolve(&families, present_on(&[])).unwrap();
        assert!(!assignment.is_complete());
        assert!(!assignment.is_transfer_complete());
    }

    #[test]
    fn missing_transfer_is_complete_but_not_transfer_complete() {
        let families = [family(0, vk::QueueFlags::GRAPHICS)];
        let assignment = QueueFamilyAssignment::resolve(&families, present_on(&[0])).unwrap();
        assert!(assignment.is_complete());
        assert!(!assignment.is_transfer_complete());
        assert_eq!(assignment.unique_families(), vec![0]);
    }

    #[test]
    fn transfer_complete_implies_complete() {
        let flag_sets = [
            vk::QueueFlags::empty(),
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::TRANSFER,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
        ];
        for first in flag_sets {
            for second in flag_sets {
                for present in [&[][..], &[0][..], &[1][..]] {
                    let families = [family(0, first), family(1, second)];
                    let assignment = QueueFamilyAssignment::resolve(&families, |index| {
                        Ok(present.contains(&index))
                    })
                    .unwrap();
                    if assignment.is_transfer_complete() {
                        assert!(assignment.is_complete());
                    }
                }
            }
        }
    }

    #[test]
    fn present_query_errors_propagate() {
        let families = [family(0, vk::QueueFlags::GRAPHICS)];
        let err = QueueFamilyAssignment::resolve(&families, |_| {
            Err(vk::Result::ERROR_SURFACE_LOST_KHR.into())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Vulkan(vk::Result::ERROR_SURFACE_LOST_KHR)
        ));
    }
}
