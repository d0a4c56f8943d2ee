//! `VoxhostClient` builder and handle.
//!
//! This is the entry point for embedding the engine. It ties together
//! the layers: store → transport → room service.

use std::path::PathBuf;
use std::sync::Arc;

use voxhost_protocol::{DeviceCandidate, DeviceId};
use voxhost_room::{DeviceDirectory, RoomService, RoomServiceConfig, StaticDirectory};
use voxhost_store::{FileStore, MemoryStore, RoomStore};
use voxhost_timer::{Clock, SystemClock};
use voxhost_transport::{HostTransport, HttpHostTransport, HttpTransportConfig};

use crate::VoxhostError;

/// Where room state is persisted.
#[derive(Debug, Clone)]
enum StateBackend {
    Memory(MemoryStore),
    Dir(PathBuf),
}

/// Which host transport the service uses.
enum TransportChoice<T> {
    Http(HttpTransportConfig),
    Custom(T),
}

/// Builder for configuring and starting a Voxhost client.
///
/// # Example
///
/// ```rust,ignore
/// use voxhost::prelude::*;
///
/// let client = VoxhostClient::builder()
///     .state_dir("/var/lib/voxhost")
///     .devices(devices)
///     .build()
///     .await?;
/// let room = client.rooms().create_guest_room("Drop-in", "").await?;
/// ```
pub struct VoxhostClientBuilder<T = HttpHostTransport> {
    backend: StateBackend,
    room_config: RoomServiceConfig,
    transport: TransportChoice<T>,
    devices: Vec<DeviceCandidate>,
    clock: Arc<dyn Clock>,
}

impl VoxhostClientBuilder {
    /// Creates a builder with in-memory state, the HTTP transport and the
    /// system clock.
    pub fn new() -> Self {
        Self {
            backend: StateBackend::Memory(MemoryStore::new()),
            room_config: RoomServiceConfig::default(),
            transport: TransportChoice::Http(HttpTransportConfig::default()),
            devices: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the HTTP transport configuration.
    pub fn http_config(mut self, config: HttpTransportConfig) -> Self {
        self.transport = TransportChoice::Http(config);
        self
    }
}

impl Default for VoxhostClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HostTransport> VoxhostClientBuilder<T> {
    /// Persists room state as JSON files under `dir`.
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backend = StateBackend::Dir(dir.into());
        self
    }

    /// Keeps room state in `store`. Clones of a [`MemoryStore`] share
    /// their contents, so a test can inspect what was written.
    pub fn memory_store(mut self, store: MemoryStore) -> Self {
        self.backend = StateBackend::Memory(store);
        self
    }

    /// Sets the room service configuration.
    pub fn room_config(mut self, config: RoomServiceConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the initial device list.
    pub fn devices(mut self, devices: Vec<DeviceCandidate>) -> Self {
        self.devices = devices;
        self
    }

    /// Replaces the HTTP transport with `transport`.
    pub fn transport<U: HostTransport>(self, transport: U) -> VoxhostClientBuilder<U> {
        VoxhostClientBuilder {
            backend: self.backend,
            room_config: self.room_config,
            transport: TransportChoice::Custom(transport),
            devices: self.devices,
            clock: self.clock,
        }
    }

    /// Sets where "now" comes from.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads persisted state and starts the room service.
    ///
    /// Must be called inside a Tokio runtime. The service reconciles
    /// guest and OpenLink deadlines before it handles the first call.
    ///
    /// # Errors
    /// Fails if the state directory can't be opened, a stored entry
    /// can't be read, or the HTTP client can't be built.
    pub async fn build(self) -> Result<VoxhostClient, VoxhostError> {
        let store = match self.backend {
            StateBackend::Memory(backend) => RoomStore::open(backend)?,
            StateBackend::Dir(dir) => {
                tracing::debug!(dir = %dir.display(), "opening state directory");
                RoomStore::open(FileStore::open(dir)?)?
            }
        };

        let directory = Arc::new(StaticDirectory::new(self.devices));
        let shared: Arc<dyn DeviceDirectory> = directory.clone();

        let rooms = match self.transport {
            TransportChoice::Http(config) => RoomService::spawn(
                self.room_config,
                store,
                HttpHostTransport::new(config)?,
                shared,
                self.clock,
            ),
            TransportChoice::Custom(transport) => {
                RoomService::spawn(self.room_config, store, transport, shared, self.clock)
            }
        };

        Ok(VoxhostClient { rooms, directory })
    }
}

/// A running Voxhost engine.
///
/// Room operations live on [`rooms()`](Self::rooms); the device list is
/// managed here.
#[derive(Debug, Clone)]
pub struct VoxhostClient {
    rooms: RoomService,
    directory: Arc<StaticDirectory>,
}

impl VoxhostClient {
    /// Creates a new builder.
    pub fn builder() -> VoxhostClientBuilder {
        VoxhostClientBuilder::new()
    }

    /// The room service handle.
    pub fn rooms(&self) -> &RoomService {
        &self.rooms
    }

    /// Current device candidates.
    pub fn devices(&self) -> Vec<DeviceCandidate> {
        self.directory.devices()
    }

    /// Replaces the device list, e.g. after re-reading a device registry.
    pub fn replace_devices(&self, devices: Vec<DeviceCandidate>) {
        tracing::debug!(count = devices.len(), "device list replaced");
        self.directory.replace(devices);
    }

    /// Marks a device online or offline. Returns `false` for an unknown
    /// device.
    pub fn set_device_online(&self, id: &DeviceId, online: bool) -> bool {
        self.directory.set_online(id, online)
    }

    /// Stops the room service. Pending deadlines stay persisted.
    pub async fn shutdown(&self) -> Result<(), VoxhostError> {
        self.rooms.shutdown().await?;
        Ok(())
    }
}
