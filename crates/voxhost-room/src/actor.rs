//! The service actor: the single task that owns the room store.
//!
//! Everything that mutates rooms runs here, one event at a time:
//! commands from [`RoomService`](crate::RoomService) handles, completions
//! of host calls, due removal deadlines, and the periodic sweep. Host
//! calls themselves run on their own tasks so the loop never waits on
//! the network.
//!
//! ## Reservations
//!
//! A create call goes out over the network and may take seconds to come
//! back. Meanwhile the actor keeps handling commands, so a second
//! "create" for the same owner could slip past the quota check if only
//! stored rooms were counted. To close that gap the actor records a
//! *reservation* before spawning the call:
//!
//! ```text
//! create ──→ check quota (stored + pending) ──→ reserve ──→ spawn host call
//!                                                              │
//!            release reservation ←── Completion ←──────────────┘
//!            insert room on success
//! ```
//!
//! - Permanent rooms: `pending_permanent` counts in-flight creates per
//!   owner, and the quota check adds it to the owner's stored rooms.
//! - Guest rooms: `pending_guest` makes a second guest create fail with
//!   `AlreadyHasRoom` while the first is still outbound.
//!
//! The reservation is released when the [`Completion`] arrives, whatever
//! its outcome. If the caller stopped waiting (its oneshot receiver was
//! dropped), a successful completion still inserts the room, because the
//! host has already created it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use voxhost_protocol::{
    ApiResponse, DeviceCandidate, DeviceId, HostRequest, RoomId, UserId,
};
use voxhost_quota::{CapacityCalculator, DeviceSelector};
use voxhost_store::{RoomStore, StoreError};
use voxhost_timer::{Clock, DeadlineScheduler, Sweeper};
use voxhost_transport::{HostTransport, TransportError};

use crate::error::{MISSING_ROOM_ID, REJECTED_WITHOUT_REASON};
use crate::guest::PendingGuest;
use crate::openlink::PendingOpenLink;
use crate::permanent::PendingPermanent;
use crate::service::{CleanupReport, Command};
use crate::{CloseReason, DeviceDirectory, RoomError, RoomEvent, RoomServiceConfig};

/// Which removal a deadline belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TimerKey {
    Guest(RoomId),
    OpenLink(RoomId),
}

/// A finished host create call, posted back to the actor.
pub(crate) enum Completion {
    Permanent(PendingPermanent, Result<ApiResponse, TransportError>),
    Guest(PendingGuest, Result<ApiResponse, TransportError>),
    OpenLink(PendingOpenLink, Result<ApiResponse, TransportError>),
}

pub(crate) struct RoomActor<T> {
    pub(crate) config: RoomServiceConfig,
    pub(crate) store: RoomStore,
    pub(crate) transport: Arc<T>,
    pub(crate) directory: Arc<dyn DeviceDirectory>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) calculator: CapacityCalculator,
    pub(crate) selector: DeviceSelector,
    pub(crate) rng: StdRng,
    pub(crate) timers: DeadlineScheduler<TimerKey>,
    sweeper: Sweeper,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<RoomEvent>,
    /// Permanent creates in flight, per owner.
    pub(crate) pending_permanent: HashMap<UserId, usize>,
    /// Guest creates in flight.
    pub(crate) pending_guest: usize,
}

impl<T: HostTransport> RoomActor<T> {
    pub(crate) fn new(
        config: RoomServiceConfig,
        store: RoomStore,
        transport: Arc<T>,
        directory: Arc<dyn DeviceDirectory>,
        clock: Arc<dyn Clock>,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<RoomEvent>,
    ) -> Self {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        Self {
            calculator: CapacityCalculator::new(config.quota_tables.clone()),
            selector: DeviceSelector,
            rng: StdRng::from_os_rng(),
            timers: DeadlineScheduler::new(Arc::clone(&clock)),
            sweeper: Sweeper::new(config.sweep_interval),
            config,
            store,
            transport,
            directory,
            clock,
            commands,
            completions_tx,
            completions,
            events,
            pending_permanent: HashMap::new(),
            pending_guest: 0,
        }
    }

    /// Runs until shutdown or until every handle is gone.
    pub(crate) async fn run(mut self) {
        info!(client_id = %self.config.client_id, "room service started");
        let report = self.cleanup_on_startup();
        if report.removed() > 0 || report.rescheduled() > 0 {
            info!(?report, "startup cleanup finished");
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(done) = self.completions.recv() => self.complete(done),
                due = self.timers.wait_for_due() => {
                    for key in due {
                        self.on_deadline(key);
                    }
                }
                _ = self.sweeper.wait() => self.sweep(),
            }
        }

        info!(
            pending_timers = self.timers.len(),
            "room service stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::CreatePermanent {
                room,
                profile,
                reply,
            } => self.create_permanent(room, profile, reply),
            Command::DeletePermanent { room_id, reply } => {
                let _ = reply.send(self.delete_permanent(room_id));
            }
            Command::MigratePermanent { room_id, to, reply } => {
                let _ = reply.send(self.migrate_permanent(room_id, to));
            }
            Command::SyncAcrossDevices { reply } => {
                let _ = reply.send(self.sync_across_devices());
            }
            Command::PermanentRooms { reply } => {
                let _ = reply.send(self.store.permanent_rooms().to_vec());
            }

            Command::CreateGuest {
                name,
                description,
                reply,
            } => self.create_guest(name, description, reply),
            Command::CancelGuest { room_id, reply } => {
                let result = self
                    .close_guest(&room_id, CloseReason::Cancelled)
                    .ok_or(RoomError::NotFound(room_id));
                let _ = reply.send(result);
            }
            Command::GuestRooms { reply } => {
                let _ = reply.send(self.store.guest_rooms().to_vec());
            }

            Command::CreateOpenLink {
                initiator_id,
                visitor_id,
                reply,
            } => self.create_openlink(initiator_id, visitor_id, reply),
            Command::EndConnection {
                room_id,
                needs_extension,
                reply,
            } => {
                let _ = reply.send(self.end_connection(room_id, needs_extension));
            }
            Command::Extend {
                room_id,
                additional_minutes,
                reply,
            } => {
                let _ = reply.send(self.extend(room_id, additional_minutes));
            }
            Command::CancelOpenLink { room_id, reply } => {
                let result = self
                    .close_openlink(&room_id, CloseReason::Cancelled)
                    .ok_or(RoomError::NotFound(room_id));
                let _ = reply.send(result);
            }
            Command::OpenLinkRooms { reply } => {
                let _ = reply.send(self.store.openlink_rooms().to_vec());
            }

            Command::QuotaSummary {
                owner_id,
                profile,
                reply,
            } => {
                let _ = reply.send(self.quota_summary(&owner_id, &profile));
            }
            Command::RefreshServerCapacity { profile, reply } => {
                let _ = reply.send(self.refresh_server_capacity(&profile));
            }
            Command::LastServerCapacity { reply } => {
                let _ = reply.send(self.store.server_capacity());
            }
            Command::SetRotationPolicy { policy, reply } => {
                self.store.set_rotation_policy(policy);
                self.persist("rotation", self.store.persist_rotation());
                info!(%policy, "rotation policy changed");
                let _ = reply.send(());
            }
            Command::SetPreferredDevice { device, reply } => {
                debug!(device_id = ?device, "preferred device changed");
                self.store.set_preferred_device(device);
                self.persist("rotation", self.store.persist_rotation());
                let _ = reply.send(());
            }
            Command::RotationSettings { reply } => {
                let _ = reply.send(self.store.rotation().clone());
            }

            Command::CleanupOnStartup { reply } => {
                let _ = reply.send(self.cleanup_on_startup());
            }
            // Intercepted by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn complete(&mut self, done: Completion) {
        match done {
            Completion::Permanent(pending, outcome) => {
                self.complete_permanent(pending, outcome)
            }
            Completion::Guest(pending, outcome) => self.complete_guest(pending, outcome),
            Completion::OpenLink(pending, outcome) => {
                self.complete_openlink(pending, outcome)
            }
        }
    }

    fn on_deadline(&mut self, key: TimerKey) {
        match key {
            TimerKey::Guest(room_id) => {
                self.close_guest(&room_id, CloseReason::Expired);
            }
            TimerKey::OpenLink(room_id) => {
                self.close_openlink(&room_id, CloseReason::Expired);
            }
        }
    }

    /// Removes ephemeral rooms whose deadline has passed, in case a
    /// one-shot timer was delayed (e.g. the machine slept).
    fn sweep(&mut self) {
        let now = self.clock.now();
        let guests = self.overdue_guests(now);
        let links = self.overdue_openlinks(now);
        if guests.is_empty() && links.is_empty() {
            return;
        }

        debug!(
            guest = guests.len(),
            openlink = links.len(),
            "sweep found overdue rooms"
        );
        for room_id in guests {
            self.close_guest(&room_id, CloseReason::Expired);
        }
        for room_id in links {
            self.close_openlink(&room_id, CloseReason::Expired);
        }
    }

    /// Reconciles persisted ephemeral rooms with the current time.
    pub(crate) fn cleanup_on_startup(&mut self) -> CleanupReport {
        let now = self.clock.now();
        let mut report = CleanupReport::default();
        self.cleanup_guests(now, &mut report);
        self.cleanup_openlinks(now, &mut report);
        report
    }

    // -----------------------------------------------------------------------
    // Shared plumbing
    // -----------------------------------------------------------------------

    /// Picks a host under the current rotation policy, persisting the
    /// round-robin pointer when it moves.
    pub(crate) fn select_device(&mut self) -> Result<DeviceCandidate, RoomError> {
        let candidates = self.directory.devices();
        let load = self.store.hosted_counts();
        let selection =
            self.selector
                .select(&candidates, self.store.rotation(), &load, &mut self.rng)?;

        if let Some(last_host) = selection.last_host {
            self.store.set_last_host(Some(last_host));
            self.persist("rotation pointer", self.store.persist_last_host());
        }
        Ok(selection.device)
    }

    /// Runs a create call on its own task and posts the outcome back.
    pub(crate) fn spawn_call<F>(&self, device: DeviceCandidate, request: HostRequest, finish: F)
    where
        F: FnOnce(Result<ApiResponse, TransportError>) -> Completion + Send + 'static,
    {
        let transport = Arc::clone(&self.transport);
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let outcome = transport.call(&device, &request).await;
            // The actor is gone only after shutdown; nothing left to update.
            let _ = completions.send(finish(outcome));
        });
    }

    /// Sends a fire-and-forget notification to `host` if it is online.
    pub(crate) fn notify(&self, host: &DeviceId, request: HostRequest) {
        match self.directory.device(host) {
            Some(device) if device.is_online => self.fire(device, request),
            known => warn!(
                device_id = %host,
                path = %request.path(),
                known = known.is_some(),
                "host unreachable, skipping notification"
            ),
        }
    }

    /// Sends `request` to `device` without waiting for the outcome.
    pub(crate) fn fire(&self, device: DeviceCandidate, request: HostRequest) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let path = request.path();
            match transport.call(&device, &request).await {
                Ok(response) if response.success => {
                    debug!(device_id = %device.id, %path, "notification delivered");
                }
                Ok(response) => warn!(
                    device_id = %device.id,
                    %path,
                    error = response.error.as_deref().unwrap_or(REJECTED_WITHOUT_REASON),
                    "notification rejected"
                ),
                Err(e) => warn!(
                    device_id = %device.id,
                    %path,
                    error = %e,
                    "notification failed"
                ),
            }
        });
    }

    pub(crate) fn emit(&self, event: RoomEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Logs a failed write. The in-memory state stays authoritative.
    pub(crate) fn persist(&self, entry: &'static str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            error!(entry, error = %e, "failed to persist room state");
        }
    }
}

/// Converts a host outcome into success or the matching [`RoomError`].
pub(crate) fn accepted(
    outcome: Result<ApiResponse, TransportError>,
) -> Result<ApiResponse, RoomError> {
    let response = outcome?;
    if response.success {
        return Ok(response);
    }
    let reason = response
        .error
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| REJECTED_WITHOUT_REASON.to_string());
    Err(RoomError::ServerRejected(reason))
}

/// Extracts the room ID a host assigned on a create call.
pub(crate) fn created_room_id(
    outcome: Result<ApiResponse, TransportError>,
) -> Result<RoomId, RoomError> {
    accepted(outcome)?
        .room_id
        .ok_or_else(|| RoomError::ServerRejected(MISSING_ROOM_ID.to_string()))
}

/// Converts a configured duration into a wall-clock span.
pub(crate) fn span(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// Whether a deadline has been reached at `now`.
pub(crate) fn is_due(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    deadline <= now
}
