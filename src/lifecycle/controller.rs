//! The scanner lifecycle state machine.
//!
//! [`ScannerLifecycle`] reconciles permission, device selection and the
//! enabled flag into at most one running scan session, and republishes
//! that session's outcomes on [`ScannerEvents`].

use super::events::{ScanStats, ScannerEvents};
use super::permission::{classify_permission_error, permission_hint, select_autostart_device};
use super::state::{DeviceChange, IgnoreReason, LifecycleState, Permission, ScannerError};
use crate::capture::{
    DeviceCollaborator, DeviceError, DisplayTarget, ScannerConfig, StreamRegistry,
    VideoConstraints, VideoDevice,
};
use crate::decode::{parse_formats, BarcodeFormat, DecodeHints, DecoderFactory};
use crate::session::{ContinuousScanSession, ScanStream, SessionControls, SessionError};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The session currently owned by a lifecycle.
#[derive(Debug)]
pub struct ScanSession {
    device: VideoDevice,
    target: DisplayTarget,
    hints: DecodeHints,
    controls: Option<Arc<SessionControls>>,
    closed: Arc<AtomicBool>,
}

impl ScanSession {
    pub fn device(&self) -> &VideoDevice {
        &self.device
    }

    pub fn target(&self) -> &DisplayTarget {
        &self.target
    }

    /// Hints in effect when the session started.
    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    /// True once the session stopped or faulted.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.controls.as_ref().map_or(true, |c| c.is_stopped())
    }

    fn stop(&self) {
        if let Some(controls) = &self.controls {
            controls.stop();
        }
    }
}

/// Camera scanner lifecycle.
///
/// Owns the selected device, the permission state and the current scan
/// session. Every device change fully stops the previous session before
/// asking for a new one.
pub struct ScannerLifecycle {
    config: ScannerConfig,
    target: DisplayTarget,
    hints: DecodeHints,
    devices: Arc<dyn DeviceCollaborator>,
    decoders: Arc<dyn DecoderFactory>,
    registry: Arc<StreamRegistry>,
    events: Arc<ScannerEvents>,
    stats: Arc<ScanStats>,
    state: LifecycleState,
    reader: Option<ContinuousScanSession>,
    session: Option<ScanSession>,
    pending_device: Option<Option<VideoDevice>>,
}

impl ScannerLifecycle {
    /// Creates a lifecycle bound to the process-wide stream registry.
    pub fn new(
        config: ScannerConfig,
        devices: Arc<dyn DeviceCollaborator>,
        decoders: Arc<dyn DecoderFactory>,
    ) -> Result<Self, ScannerError> {
        Self::with_registry(config, devices, decoders, StreamRegistry::global())
    }

    pub fn with_registry(
        config: ScannerConfig,
        devices: Arc<dyn DeviceCollaborator>,
        decoders: Arc<dyn DecoderFactory>,
        registry: Arc<StreamRegistry>,
    ) -> Result<Self, ScannerError> {
        config.validate()?;
        Ok(Self {
            target: DisplayTarget::new(config.display_target.clone()),
            hints: config.hints(),
            config,
            devices,
            decoders,
            registry,
            events: Arc::new(ScannerEvents::new()),
            stats: Arc::new(ScanStats::default()),
            state: LifecycleState {
                enabled: true,
                ..LifecycleState::default()
            },
            reader: None,
            session: None,
            pending_device: None,
        })
    }

    pub fn events(&self) -> &Arc<ScannerEvents> {
        &self.events
    }

    pub fn stats(&self) -> &Arc<ScanStats> {
        &self.stats
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn permission(&self) -> Permission {
        self.state.permission
    }

    pub fn device(&self) -> Option<&VideoDevice> {
        self.state.selected.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn is_autostarting(&self) -> bool {
        self.state.autostarting
    }

    /// True while a session is running and has not faulted.
    pub fn is_scanning(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_closed())
    }

    pub fn session(&self) -> Option<&ScanSession> {
        self.session.as_ref()
    }

    pub fn hints(&self) -> &DecodeHints {
        &self.hints
    }

    pub fn formats(&self) -> &[BarcodeFormat] {
        &self.hints.possible_formats
    }

    pub fn target(&self) -> &DisplayTarget {
        &self.target
    }

    /// Controls of the running session.
    pub fn controls(&self) -> Result<Arc<SessionControls>, SessionError> {
        self.session
            .as_ref()
            .and_then(|s| s.controls.clone())
            .filter(|c| !c.is_stopped())
            .ok_or(SessionError::NoActiveSession)
    }

    /// Runs the host initialization sequence.
    ///
    /// With autostart off this only enumerates devices and applies a
    /// device selected before initialization, without asking for
    /// permission. With autostart on it asks for permission, picks a device
    /// and starts scanning on it. A refused permission ends autostart
    /// quietly; finding no device to start on is an error.
    pub async fn init(&mut self) -> Result<(), ScannerError> {
        self.state.ready = true;

        if self.config.autostart {
            if self.pending_device.take().is_some() {
                tracing::debug!("Autostart selects the device, dropping the earlier selection");
            }
            return self.autostart().await;
        }

        if let Err(error) = self.update_video_input_devices().await {
            tracing::warn!(error = %error, "Device enumeration failed");
        }
        if let Some(device) = self.pending_device.take() {
            self.apply_device(device).await;
        }
        Ok(())
    }

    async fn autostart(&mut self) -> Result<(), ScannerError> {
        self.set_autostarting(true);
        let result = self.autostart_sequence().await;
        if let Err(error) = &result {
            tracing::error!(error = %error, "Autostart failed");
        }
        self.state.autostarted = true;
        self.events.autostarted.emit(());
        self.set_autostarting(false);
        result
    }

    async fn autostart_sequence(&mut self) -> Result<(), ScannerError> {
        if self.request_permission().await != Some(true) {
            tracing::info!("Camera permission not granted, autostart stops here");
            return Ok(());
        }

        let devices = self.update_video_input_devices().await?;
        let device = select_autostart_device(&devices)?.clone();
        tracing::info!(device = %device.id, label = %device.label, "Autostarting on device");

        self.apply_device(Some(device.clone())).await;
        self.events.device_change.emit(Some(device));
        Ok(())
    }

    fn set_autostarting(&mut self, autostarting: bool) {
        self.state.autostarting = autostarting;
        self.events.autostarting.emit(autostarting);
    }

    /// Asks the device collaborator for camera access.
    ///
    /// Any stream acquired to obtain the grant is released straight away.
    /// Failures are classified, never returned.
    pub async fn request_permission(&mut self) -> Option<bool> {
        match self.devices.acquire_any_stream().await {
            Ok(stream) => {
                self.registry.hold(Arc::clone(&self.devices), stream).release();
                self.set_permission(Permission::Granted);
                Some(true)
            }
            Err(error) => self.permission_failed(error),
        }
    }

    fn permission_failed(&mut self, error: DeviceError) -> Option<bool> {
        tracing::error!(error = %error, kind = error.name(), "Error when asking for camera permission");
        tracing::warn!("{}", permission_hint(&error));

        let outcome = classify_permission_error(&error);
        self.state.has_devices = outcome.has_devices;
        self.events.has_devices.emit(outcome.has_devices);
        if outcome.devices_missing {
            self.events.cameras_not_found.emit(Some(error.clone()));
        }

        self.set_permission(outcome.permission);
        self.events.permission_response.emit(Err(error));
        outcome.permission.as_option()
    }

    fn set_permission(&mut self, permission: Permission) {
        self.state.permission = permission;
        self.events.permission_response.emit(Ok(permission.as_option()));
    }

    /// Re-enumerates video inputs and publishes what was found.
    pub async fn update_video_input_devices(&mut self) -> Result<Vec<VideoDevice>, ScannerError> {
        let devices = self.devices.list_video_inputs().await?;
        let has_devices = !devices.is_empty();
        tracing::debug!(count = devices.len(), "Enumerated video inputs");

        self.state.devices = devices.clone();
        self.state.has_devices = Some(has_devices);
        self.events.has_devices.emit(Some(has_devices));
        self.events.cameras_found.emit(devices.clone());
        if !has_devices {
            self.events.cameras_not_found.emit(None);
        }
        Ok(devices)
    }

    /// Host request to change the selected device.
    ///
    /// Before initialization the request is parked and applied by
    /// [`init`](Self::init). It is dropped while autostarting, when the
    /// device is already selected, and while permission is not granted.
    pub async fn set_device(&mut self, device: Option<VideoDevice>) -> DeviceChange {
        if !self.state.ready {
            tracing::debug!("Scanner not initialized yet, deferring device selection");
            self.pending_device = Some(device);
            return DeviceChange::Deferred;
        }
        if self.state.autostarting {
            tracing::warn!("Avoid setting a device during auto-start");
            return DeviceChange::Ignored(IgnoreReason::Autostarting);
        }
        if self.is_current_device(device.as_ref()) {
            tracing::warn!("Setting the same device is not allowed");
            return DeviceChange::Ignored(IgnoreReason::SameDevice);
        }
        if self.state.permission != Permission::Granted {
            tracing::warn!("Camera permission not granted, device selection dropped");
            return DeviceChange::Ignored(IgnoreReason::PermissionNotGranted);
        }

        self.apply_device(device).await;
        DeviceChange::Applied
    }

    /// Same device by identity. Clearing an already empty selection counts.
    fn is_current_device(&self, device: Option<&VideoDevice>) -> bool {
        device.map(|d| &d.id) == self.state.selected.as_ref().map(|d| &d.id)
    }

    async fn apply_device(&mut self, device: Option<VideoDevice>) {
        self.scan_stop();

        match device {
            None => {
                self.state.selected = None;
                self.devices.unbind_display_target(&self.target);
            }
            Some(device) => {
                self.state.selected = Some(device.clone());
                if self.state.enabled && self.state.permission == Permission::Granted {
                    self.scan_from_device(device).await;
                }
            }
        }
    }

    /// Turns scanning on or off.
    ///
    /// Turning it off stops the session and releases every camera stream
    /// held in the process. Turning it on resumes on the selected device,
    /// or runs [`init`](Self::init) when there is none.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<(), ScannerError> {
        self.state.enabled = enabled;

        if !enabled {
            self.scan_stop();
            self.registry.release_all();
            return Ok(());
        }

        match self.state.selected.clone() {
            Some(device) => {
                if self.state.permission == Permission::Granted && !self.is_scanning() {
                    self.scan_from_device(device).await;
                }
                Ok(())
            }
            None => self.init().await,
        }
    }

    /// Starts scanning on the selected device.
    pub async fn start_scanning(&mut self) -> Result<(), ScannerError> {
        if self.is_scanning() {
            return Err(ScannerError::AlreadyScanning);
        }
        let device = self.state.selected.clone().ok_or(ScannerError::NoDeviceSelected)?;
        if self.state.permission != Permission::Granted {
            return Err(ScannerError::PermissionNotGranted);
        }
        self.scan_from_device(device).await;
        Ok(())
    }

    /// Stops the running session, if any. The device stays selected.
    pub fn stop_scanning(&mut self) {
        self.scan_stop();
    }

    /// Rebuilds the decoder and the session on the same device.
    ///
    /// Returns `None` when no device was selected.
    pub async fn restart(&mut self) -> Option<DeviceChange> {
        let previous = self.state.selected.clone();
        self.reader = None;
        self.clear_device();

        let previous = previous?;
        tracing::info!(device = %previous.id, "Restarting scanner");
        Some(self.set_device(Some(previous)).await)
    }

    /// Stops scanning and forgets the selected device.
    pub fn reset(&mut self) {
        self.clear_device();
        self.events.device_change.emit(None);
    }

    /// Host teardown: resets and releases every camera stream.
    pub fn shutdown(&mut self) {
        self.reset();
        self.reader = None;
        let released = self.registry.release_all();
        tracing::info!(released, "Scanner shut down");
    }

    fn clear_device(&mut self) {
        self.scan_stop();
        if self.state.selected.take().is_some() {
            self.devices.unbind_display_target(&self.target);
        }
    }

    /// Replaces the formats the decoder looks for.
    pub fn set_formats<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ScannerError> {
        let formats = parse_formats(names)?;
        self.hints.possible_formats = formats;
        self.push_hints();
        Ok(())
    }

    pub fn set_try_harder(&mut self, enable: bool) {
        self.hints.try_harder = enable;
        self.push_hints();
    }

    pub fn set_hints(&mut self, hints: DecodeHints) {
        self.hints = hints;
        self.push_hints();
    }

    fn push_hints(&self) {
        if let Some(reader) = &self.reader {
            reader.decoder().set_hints(&self.hints);
        }
    }

    /// Switches the torch of the running session. Logged and ignored when
    /// there is no session or it has no torch.
    pub fn set_torch(&self, on: bool) {
        let result = match self.controls() {
            Ok(controls) => controls.switch_torch(on).map_err(|e| e.to_string()),
            Err(error) => Err(error.to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(error = %error, on, "Torch not switched");
        }
    }

    /// Stores constraints for future sessions and applies them to the
    /// running one.
    pub fn set_video_constraints(&mut self, constraints: VideoConstraints) {
        if let Err(error) = constraints.validate() {
            tracing::warn!(error = %error, "Ignoring invalid video constraints");
            return;
        }
        if let Ok(controls) = self.controls() {
            if let Err(error) = controls.apply_video_constraints(&constraints) {
                tracing::warn!(error = %error, "Video constraints not applied");
            }
        }
        self.config.video_constraints = Some(constraints);
    }

    fn reader(&mut self) -> &ContinuousScanSession {
        let decoders = &self.decoders;
        let registry = &self.registry;
        let hints = &self.hints;
        let options = self.config.reader_options();
        self.reader.get_or_insert_with(|| {
            tracing::debug!(formats = hints.possible_formats.len(), "Creating decoder");
            ContinuousScanSession::new(decoders.create(hints, &options), Arc::clone(registry))
        })
    }

    async fn scan_from_device(&mut self, device: VideoDevice) {
        self.devices.bind_display_target(&self.target);

        let target = self.target.clone();
        let reader = self.reader();
        let stream = reader.start(&device.id, &target).await;
        let controls = reader.controls().ok();

        self.stats.record_session_started();
        let closed = Arc::new(AtomicBool::new(false));
        let started = !stream.is_terminated();
        tokio::spawn(forward_outcomes(
            stream,
            Arc::clone(&self.events),
            Arc::clone(&self.stats),
            Arc::clone(&closed),
        ));

        if !started {
            tracing::warn!(device = %device.id, "Scan session ended during setup");
            return;
        }

        if let (Some(controls), Some(constraints)) = (&controls, &self.config.video_constraints) {
            if let Err(error) = controls.apply_video_constraints(constraints) {
                tracing::debug!(error = %error, "Configured video constraints not applied");
            }
        }
        let torch = controls.as_ref().is_some_and(|c| c.supports_torch());

        self.session = Some(ScanSession {
            device,
            target,
            hints: self.hints.clone(),
            controls,
            closed,
        });
        self.events.torch_compatible.emit(torch);
    }

    fn scan_stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
            tracing::debug!(device = %session.device.id, "Scanning stopped");
        }
        self.events.torch_compatible.emit(false);
    }
}

async fn forward_outcomes(
    mut stream: ScanStream,
    events: Arc<ScannerEvents>,
    stats: Arc<ScanStats>,
    closed: Arc<AtomicBool>,
) {
    while let Some(outcome) = stream.next().await {
        stats.record(&outcome);
        events.dispatch(outcome);
    }
    closed.store(true, Ordering::Release);
}

impl Drop for ScannerLifecycle {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }
}

impl std::fmt::Debug for ScannerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerLifecycle")
            .field("state", &self.state)
            .field("hints", &self.hints)
            .field("session", &self.session)
            .finish()
    }
}
