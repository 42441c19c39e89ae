//! Permission error classification and autostart device choice.

use super::state::{Permission, ScannerError};
use crate::capture::{DeviceError, VideoDevice};

/// Label fragments that mark a rear-facing camera, lowercase.
pub const REAR_CAMERA_HINTS: [&str; 6] = ["back", "trás", "rear", "traseira", "environment", "ambiente"];

/// What a failed permission request says about the device situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionOutcome {
    pub permission: Permission,
    pub has_devices: Option<bool>,
    /// No camera could be used at all; hosts get a cameras-not-found event.
    pub devices_missing: bool,
}

impl PermissionOutcome {
    fn new(permission: Permission, has_devices: Option<bool>, devices_missing: bool) -> Self {
        Self {
            permission,
            has_devices,
            devices_missing,
        }
    }
}

/// Maps a media error raised while requesting a stream to permission and
/// device state.
pub fn classify_permission_error(error: &DeviceError) -> PermissionOutcome {
    match error {
        DeviceError::NotSupported(_) => PermissionOutcome::new(Permission::Unknown, None, false),
        DeviceError::NotAllowed(_) => PermissionOutcome::new(Permission::Denied, Some(true), false),
        DeviceError::NotFound(_) | DeviceError::NotReadable(_) => {
            PermissionOutcome::new(Permission::Unknown, Some(false), true)
        }
        DeviceError::Other { .. } => PermissionOutcome::new(Permission::Unknown, None, false),
    }
}

/// Hint logged alongside a permission failure.
pub(crate) fn permission_hint(error: &DeviceError) -> &'static str {
    match error {
        DeviceError::NotSupported(_) => "Media capture is not supported here, a secure context may be required",
        DeviceError::NotAllowed(_) => "Camera access was refused",
        DeviceError::NotFound(_) => "No video input device is attached",
        DeviceError::NotReadable(_) => "The camera is in use by another application or has failed",
        DeviceError::Other { .. } => "Unrecognized media error",
    }
}

fn is_rear_facing(label: &str) -> bool {
    let label = label.to_lowercase();
    REAR_CAMERA_HINTS.iter().any(|hint| label.contains(hint))
}

/// Picks the device autostart should use: the first rear-facing one by
/// label, otherwise the last one listed.
pub fn select_autostart_device(devices: &[VideoDevice]) -> Result<&VideoDevice, ScannerError> {
    devices
        .iter()
        .find(|d| is_rear_facing(&d.label))
        .or_else(|| devices.last())
        .ok_or(ScannerError::NoInputDevices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_not_allowed_means_denied_with_devices() {
        let outcome = classify_permission_error(&DeviceError::NotAllowed("denied".into()));
        assert_eq!(outcome.permission, Permission::Denied);
        assert_eq!(outcome.has_devices, Some(true));
        assert!(!outcome.devices_missing);
    }

    #[test]
    fn test_not_found_and_not_readable_mean_no_devices() {
        for error in [
            DeviceError::NotFound("none".into()),
            DeviceError::NotReadable("busy".into()),
        ] {
            let outcome = classify_permission_error(&error);
            assert_eq!(outcome.permission, Permission::Unknown);
            assert_eq!(outcome.has_devices, Some(false));
            assert!(outcome.devices_missing);
        }
    }

    #[test]
    fn test_unrecognized_errors_leave_state_unknown() {
        let outcome = classify_permission_error(&DeviceError::Other {
            name: "AbortError".into(),
            message: "aborted".into(),
        });
        assert_eq!(outcome, PermissionOutcome::new(Permission::Unknown, None, false));

        let outcome = classify_permission_error(&DeviceError::NotSupported("insecure".into()));
        assert_eq!(outcome.has_devices, None);
    }

    #[test]
    fn test_autostart_prefers_rear_camera() {
        let devices = vec![
            VideoDevice::new("1", "Front Camera"),
            VideoDevice::new("2", "Back Camera"),
            VideoDevice::new("3", "USB Camera"),
        ];
        assert_eq!(select_autostart_device(&devices).unwrap().id.as_str(), "2");
    }

    #[test]
    fn test_autostart_matches_localized_labels() {
        let devices = vec![
            VideoDevice::new("1", "Câmera frontal"),
            VideoDevice::new("2", "Câmera TRASEIRA"),
        ];
        assert_eq!(select_autostart_device(&devices).unwrap().id.as_str(), "2");

        let devices = vec![
            VideoDevice::new("a", "camera2 0, facing environment"),
            VideoDevice::new("b", "camera2 1, facing front"),
        ];
        assert_eq!(select_autostart_device(&devices).unwrap().id.as_str(), "a");
    }

    #[test]
    fn test_autostart_falls_back_to_last_device() {
        let devices = vec![VideoDevice::new("1", "Front"), VideoDevice::new("2", "Side")];
        assert_eq!(select_autostart_device(&devices).unwrap().id.as_str(), "2");
    }

    #[test]
    fn test_autostart_without_devices_fails() {
        assert!(matches!(
            select_autostart_device(&[]),
            Err(ScannerError::NoInputDevices)
        ));
    }

    proptest! {
        #[test]
        fn prop_autostart_picks_a_listed_device(labels in prop::collection::vec("[a-zA-Z ]{0,16}", 1..8)) {
            let devices: Vec<_> = labels
                .iter()
                .enumerate()
                .map(|(i, label)| VideoDevice::new(i.to_string(), label.clone()))
                .collect();
            let chosen = select_autostart_device(&devices).unwrap();
            prop_assert!(devices.contains(chosen));
            if !devices.iter().any(|d| is_rear_facing(&d.label)) {
                prop_assert_eq!(chosen, devices.last().unwrap());
            }
        }
    }
}
