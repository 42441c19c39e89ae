//! Process-wide ownership of acquired camera resources.
//!
//! Only one party may hold the camera at a time. Every acquired stream
//! and every running decode session registers here, and
//! [`StreamRegistry::release_all`] relinquishes all of them at once even
//! if the owner lost its handle.

use super::device::{DeviceCollaborator, MediaStream};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// A resource that can be forcibly released.
pub trait Releasable: Send + Sync {
    fn release(&self);
}

/// Identifier handed out by [`StreamRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// Registry of live camera resources.
#[derive(Default)]
pub struct StreamRegistry {
    entries: Mutex<HashMap<RegistrationId, Arc<dyn Releasable>>>,
    next_id: AtomicU64,
    release_all_calls: AtomicU64,
}

static GLOBAL: OnceLock<Arc<StreamRegistry>> = OnceLock::new();

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process.
    pub fn global() -> Arc<StreamRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(StreamRegistry::new())))
    }

    pub fn register(&self, resource: Arc<dyn Releasable>) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().insert(id, resource);
        tracing::trace!(id = id.0, "Registered camera resource");
        id
    }

    /// Forgets a resource without releasing it. Unknown ids are ignored.
    pub fn deregister(&self, id: RegistrationId) {
        if self.entries.lock().remove(&id).is_some() {
            tracing::trace!(id = id.0, "Deregistered camera resource");
        }
    }

    /// Number of resources currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every registered resource and returns how many there were.
    pub fn release_all(&self) -> usize {
        self.release_all_calls.fetch_add(1, Ordering::Relaxed);
        // Drain first: releasing may call back into `deregister`.
        let drained: Vec<_> = self.entries.lock().drain().map(|(_, r)| r).collect();
        let count = drained.len();
        for resource in drained {
            resource.release();
        }
        tracing::info!(released = count, "Released all camera streams");
        count
    }

    /// How many times [`release_all`](Self::release_all) has run.
    pub fn release_all_calls(&self) -> u64 {
        self.release_all_calls.load(Ordering::Relaxed)
    }

    /// Registers a media stream and returns a lease that releases it.
    pub fn hold(
        self: &Arc<Self>,
        devices: Arc<dyn DeviceCollaborator>,
        stream: MediaStream,
    ) -> StreamLease {
        let inner = Arc::new(LeasedStream {
            devices,
            stream,
            released: Mutex::new(false),
        });
        let id = self.register(Arc::clone(&inner) as Arc<dyn Releasable>);
        StreamLease {
            registry: Arc::clone(self),
            id,
            inner,
        }
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("held", &self.len())
            .field("release_all_calls", &self.release_all_calls())
            .finish()
    }
}

struct LeasedStream {
    devices: Arc<dyn DeviceCollaborator>,
    stream: MediaStream,
    released: Mutex<bool>,
}

impl Releasable for LeasedStream {
    fn release(&self) {
        let mut released = self.released.lock();
        if !*released {
            *released = true;
            self.devices.release_stream(&self.stream);
        }
    }
}

/// An acquired media stream owned through the registry.
pub struct StreamLease {
    registry: Arc<StreamRegistry>,
    id: RegistrationId,
    inner: Arc<LeasedStream>,
}

impl StreamLease {
    pub fn stream(&self) -> &MediaStream {
        &self.inner.stream
    }

    /// Stops the stream's tracks and drops it from the registry.
    pub fn release(self) {
        self.registry.deregister(self.id);
        self.inner.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockDevices, VideoDevice};
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl Releasable for Counter {
        fn release(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_release_all_drains() {
        let registry = StreamRegistry::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        registry.register(counter.clone());
        registry.register(counter.clone());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.release_all(), 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.release_all_calls(), 1);
    }

    #[test]
    fn test_deregistered_resource_not_released() {
        let registry = StreamRegistry::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));

        let id = registry.register(counter.clone());
        registry.deregister(id);
        registry.release_all();

        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lease_released_once() {
        let registry = Arc::new(StreamRegistry::new());
        let devices = Arc::new(MockDevices::with_devices(vec![VideoDevice::new("a", "A")]));
        let stream = devices.acquire_any_stream().await.unwrap();

        let lease = registry.hold(devices.clone(), stream);
        assert_eq!(registry.len(), 1);

        lease.release();
        registry.release_all();

        assert_eq!(devices.open_streams(), 0);
        let releases = devices
            .calls()
            .into_iter()
            .filter(|c| matches!(c, crate::capture::DeviceCall::Release(_)))
            .count();
        assert_eq!(releases, 1);
    }

    #[tokio::test]
    async fn test_release_all_releases_forgotten_lease() {
        let registry = Arc::new(StreamRegistry::new());
        let devices = Arc::new(MockDevices::with_devices(vec![VideoDevice::new("a", "A")]));
        let stream = devices.acquire_any_stream().await.unwrap();

        let lease = registry.hold(devices.clone(), stream);
        std::mem::forget(lease);

        registry.release_all();
        assert_eq!(devices.open_streams(), 0);
    }
}
