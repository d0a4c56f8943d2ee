//! Shared fixtures for the room service tests: a scripted host transport,
//! a static device list, and a paused-clock harness.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use voxhost_protocol::{ApiResponse, DeviceCandidate, DeviceId, HostRequest, RoomId, UserId};
use voxhost_quota::QuotaProfile;
use voxhost_room::{
    DeviceDirectory, NewPermanentRoom, RoomEvent, RoomService, RoomServiceConfig,
    StaticDirectory,
};
use voxhost_store::{MemoryStore, RoomStore};
use voxhost_timer::TokioClock;
use voxhost_transport::{HostTransport, TransportError};

// =========================================================================
// Mock transport
// =========================================================================

/// One call the service made.
#[derive(Debug, Clone)]
pub struct Call {
    pub device: DeviceId,
    pub request: HostRequest,
}

/// A transport that records every call and answers from a script.
///
/// Unscripted create calls succeed with `room-N`; everything else gets a
/// bare success. An optional delay holds each reply, which under a paused
/// clock keeps a create in flight until the test advances time.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    next_id: AtomicU64,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    /// Queues the answer to the next call.
    pub fn script(&self, reply: Result<ApiResponse, TransportError>) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Paths of every recorded call, in order.
    pub fn paths(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.request.path()).collect()
    }

    /// Calls whose path equals `path`.
    pub fn calls_to(&self, path: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.request.path() == path)
            .collect()
    }
}

impl HostTransport for MockTransport {
    async fn call(
        &self,
        device: &DeviceCandidate,
        request: &HostRequest,
    ) -> Result<ApiResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            device: device.id.clone(),
            request: request.clone(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(reply) = scripted {
            return reply;
        }
        match request {
            HostRequest::CreatePermanent(_)
            | HostRequest::CreateGuest(_)
            | HostRequest::CreateOpenLink(_) => {
                let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                Ok(ApiResponse::created(RoomId::new(format!("room-{n}"))))
            }
            _ => Ok(ApiResponse::ok()),
        }
    }
}

// =========================================================================
// Fixtures
// =========================================================================

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-04-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

pub fn device(id: &str, online: bool) -> DeviceCandidate {
    DeviceCandidate {
        id: DeviceId::new(id),
        base_url: format!("http://{id}.local:9000"),
        access_token: format!("token-{id}"),
        is_online: online,
    }
}

pub fn new_room(owner: &str, name: &str) -> NewPermanentRoom {
    NewPermanentRoom {
        name: name.into(),
        description: format!("{name} description"),
        is_private: false,
        password: None,
        owner_id: UserId::new(owner),
        owner_handle: format!("@{owner}"),
    }
}

/// Newbie, free tier: one permanent room, two members per room.
pub fn newbie() -> QuotaProfile {
    QuotaProfile::default()
}

/// Config with the sweep off, so only one-shot timers remove rooms.
pub fn quiet_config() -> RoomServiceConfig {
    RoomServiceConfig {
        client_id: "test-client".into(),
        sweep_interval: Duration::ZERO,
        ..RoomServiceConfig::default()
    }
}

/// Lets spawned host calls and their completions run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =========================================================================
// Harness
// =========================================================================

pub struct Harness {
    pub service: RoomService,
    pub transport: Arc<MockTransport>,
    pub directory: Arc<StaticDirectory>,
    pub backend: MemoryStore,
    pub clock: Arc<TokioClock>,
}

impl Harness {
    /// A service over an empty store with the given devices.
    pub fn start(devices: Vec<DeviceCandidate>) -> Self {
        Self::start_with(quiet_config(), MemoryStore::new(), devices, MockTransport::new())
    }

    pub fn start_with(
        config: RoomServiceConfig,
        backend: MemoryStore,
        devices: Vec<DeviceCandidate>,
        transport: Arc<MockTransport>,
    ) -> Self {
        let clock = Arc::new(TokioClock::starting_at(t0()));
        let directory = Arc::new(StaticDirectory::new(devices));
        let service = spawn(&config, &backend, &directory, &transport, &clock);
        Self {
            service,
            transport,
            directory,
            backend,
            clock,
        }
    }

    /// Stops the service and starts a fresh one over the same backend,
    /// as a process restart would.
    pub async fn restart(&mut self, config: RoomServiceConfig) {
        self.service.shutdown().await.unwrap();
        self.service = spawn(
            &config,
            &self.backend,
            &self.directory,
            &self.transport,
            &self.clock,
        );
    }
}

fn spawn(
    config: &RoomServiceConfig,
    backend: &MemoryStore,
    directory: &Arc<StaticDirectory>,
    transport: &Arc<MockTransport>,
    clock: &Arc<TokioClock>,
) -> RoomService {
    let store = RoomStore::open(backend.clone()).unwrap();
    let directory: Arc<dyn DeviceDirectory> = directory.clone();
    RoomService::spawn(
        config.clone(),
        store,
        Arc::clone(transport),
        directory,
        clock.clone(),
    )
}

/// The next broadcast event, failing the test if none arrives within a
/// second of (paused) time.
pub async fn next_event(events: &mut broadcast::Receiver<RoomEvent>) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no room event within a second")
        .expect("event channel closed")
}
