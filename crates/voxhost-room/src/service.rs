//! The room service handle.
//!
//! [`RoomService`] is what the rest of the application holds. Every
//! method sends a command to the service actor and awaits its reply on a
//! oneshot channel, so the actor is the only code that ever touches the
//! room store.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use voxhost_protocol::{DeviceId, GuestRoom, OpenLinkRoom, PermanentRoom, RoomId, UserId};
use voxhost_quota::{QuotaProfile, QuotaSummary, RotationPolicy, RotationState};
use voxhost_store::RoomStore;
use voxhost_timer::Clock;
use voxhost_transport::HostTransport;

use crate::actor::RoomActor;
use crate::permanent::NewPermanentRoom;
use crate::{DeviceDirectory, RoomError, RoomEvent, RoomServiceConfig};

/// Reply channel for a fallible command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to the service actor.
pub(crate) enum Command {
    // -- Permanent rooms --
    CreatePermanent {
        room: NewPermanentRoom,
        profile: QuotaProfile,
        reply: Reply<PermanentRoom>,
    },
    DeletePermanent {
        room_id: RoomId,
        reply: Reply<PermanentRoom>,
    },
    MigratePermanent {
        room_id: RoomId,
        to: DeviceId,
        reply: Reply<PermanentRoom>,
    },
    SyncAcrossDevices {
        reply: oneshot::Sender<usize>,
    },
    PermanentRooms {
        reply: oneshot::Sender<Vec<PermanentRoom>>,
    },

    // -- Guest rooms --
    CreateGuest {
        name: String,
        description: String,
        reply: Reply<GuestRoom>,
    },
    CancelGuest {
        room_id: RoomId,
        reply: Reply<GuestRoom>,
    },
    GuestRooms {
        reply: oneshot::Sender<Vec<GuestRoom>>,
    },

    // -- OpenLink rooms --
    CreateOpenLink {
        initiator_id: UserId,
        visitor_id: UserId,
        reply: Reply<OpenLinkRoom>,
    },
    EndConnection {
        room_id: RoomId,
        needs_extension: bool,
        reply: Reply<OpenLinkRoom>,
    },
    Extend {
        room_id: RoomId,
        additional_minutes: u32,
        reply: Reply<OpenLinkRoom>,
    },
    CancelOpenLink {
        room_id: RoomId,
        reply: Reply<OpenLinkRoom>,
    },
    OpenLinkRooms {
        reply: oneshot::Sender<Vec<OpenLinkRoom>>,
    },

    // -- Quotas and placement --
    QuotaSummary {
        owner_id: UserId,
        profile: QuotaProfile,
        reply: oneshot::Sender<QuotaSummary>,
    },
    RefreshServerCapacity {
        profile: QuotaProfile,
        reply: oneshot::Sender<u32>,
    },
    LastServerCapacity {
        reply: oneshot::Sender<Option<u32>>,
    },
    SetRotationPolicy {
        policy: RotationPolicy,
        reply: oneshot::Sender<()>,
    },
    SetPreferredDevice {
        device: Option<DeviceId>,
        reply: oneshot::Sender<()>,
    },
    RotationSettings {
        reply: oneshot::Sender<RotationState>,
    },

    // -- Lifecycle --
    CleanupOnStartup {
        reply: oneshot::Sender<CleanupReport>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// What a startup reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Guest rooms already past their deadline, removed immediately.
    pub guest_removed: usize,
    /// Guest rooms whose removal was rescheduled from the stored deadline.
    pub guest_rescheduled: usize,
    /// OpenLink rooms already past their deadline, removed immediately.
    pub openlink_removed: usize,
    /// OpenLink rooms whose removal was rescheduled from the stored deadline.
    pub openlink_rescheduled: usize,
}

impl CleanupReport {
    pub fn removed(&self) -> usize {
        self.guest_removed + self.openlink_removed
    }

    pub fn rescheduled(&self) -> usize {
        self.guest_rescheduled + self.openlink_rescheduled
    }
}

/// Handle to a running room service.
///
/// Cheap to clone; every clone talks to the same actor. The actor stops
/// on [`shutdown`](Self::shutdown) or once every handle is dropped.
/// After that every call returns [`RoomError::Unavailable`].
#[derive(Clone)]
pub struct RoomService {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<RoomEvent>,
}

impl std::fmt::Debug for RoomService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomService")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl RoomService {
    /// Spawns the service actor on the current Tokio runtime.
    ///
    /// The actor runs [`cleanup_on_startup`](Self::cleanup_on_startup)
    /// before handling its first command.
    pub fn spawn<T: HostTransport>(
        config: RoomServiceConfig,
        store: RoomStore,
        transport: T,
        directory: Arc<dyn DeviceDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.validated();
        let (commands, receiver) = mpsc::channel(config.command_channel_size);
        let (events, _) = broadcast::channel(config.event_channel_size);

        let actor = RoomActor::new(
            config,
            store,
            Arc::new(transport),
            directory,
            clock,
            receiver,
            events.clone(),
        );
        tokio::spawn(actor.run());

        Self { commands, events }
    }

    /// Subscribes to room events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| RoomError::Unavailable)?;
        response.await.map_err(|_| RoomError::Unavailable)
    }

    // -- Permanent rooms --

    /// Creates a permanent room for `room.owner_id`.
    ///
    /// # Errors
    /// `Banned` and `QuotaExceeded` are checked first, then
    /// `NoDeviceAvailable`. Only after those pass is the host contacted;
    /// its refusal surfaces as `ServerRejected` with the host's message.
    pub async fn create_permanent_room(
        &self,
        room: NewPermanentRoom,
        profile: QuotaProfile,
    ) -> Result<PermanentRoom, RoomError> {
        self.request(|reply| Command::CreatePermanent {
            room,
            profile,
            reply,
        })
        .await?
    }

    /// Deletes a permanent room locally and notifies its host if it is
    /// online. The local removal happens whatever the host says.
    pub async fn delete_permanent_room(
        &self,
        room_id: RoomId,
    ) -> Result<PermanentRoom, RoomError> {
        self.request(|reply| Command::DeletePermanent { room_id, reply })
            .await?
    }

    /// Points a permanent room at another host device.
    ///
    /// Only the recorded host changes. Live sessions are not handed over.
    pub async fn migrate_permanent_room(
        &self,
        room_id: RoomId,
        to: DeviceId,
    ) -> Result<PermanentRoom, RoomError> {
        self.request(|reply| Command::MigratePermanent { room_id, to, reply })
            .await?
    }

    /// Broadcasts permanent-room summaries to every online device.
    ///
    /// Returns the number of devices targeted. Delivery is not tracked.
    pub async fn sync_across_devices(&self) -> Result<usize, RoomError> {
        self.request(|reply| Command::SyncAcrossDevices { reply })
            .await
    }

    pub async fn permanent_rooms(&self) -> Result<Vec<PermanentRoom>, RoomError> {
        self.request(|reply| Command::PermanentRooms { reply }).await
    }

    // -- Guest rooms --

    /// Creates the guest room with a random 10–30 minute lifetime.
    pub async fn create_guest_room(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<GuestRoom, RoomError> {
        let name = name.into();
        let description = description.into();
        self.request(|reply| Command::CreateGuest {
            name,
            description,
            reply,
        })
        .await?
    }

    /// Closes a guest room before its deadline.
    pub async fn cancel_guest_room(&self, room_id: RoomId) -> Result<GuestRoom, RoomError> {
        self.request(|reply| Command::CancelGuest { room_id, reply })
            .await?
    }

    pub async fn guest_rooms(&self) -> Result<Vec<GuestRoom>, RoomError> {
        self.request(|reply| Command::GuestRooms { reply }).await
    }

    // -- OpenLink rooms --

    /// Creates a hidden room for an ad-hoc visitor connection.
    pub async fn create_openlink_room(
        &self,
        initiator_id: UserId,
        visitor_id: UserId,
    ) -> Result<OpenLinkRoom, RoomError> {
        self.request(|reply| Command::CreateOpenLink {
            initiator_id,
            visitor_id,
            reply,
        })
        .await?
    }

    /// Marks the connection ended and starts the grace window.
    pub async fn end_connection(
        &self,
        room_id: RoomId,
        needs_extension: bool,
    ) -> Result<OpenLinkRoom, RoomError> {
        self.request(|reply| Command::EndConnection {
            room_id,
            needs_extension,
            reply,
        })
        .await?
    }

    /// Moves the removal deadline to `now + additional_minutes`, never
    /// past the cap measured from the connection's end.
    ///
    /// # Errors
    /// [`RoomError::ConnectionStillActive`] if the connection never ended.
    pub async fn extend(
        &self,
        room_id: RoomId,
        additional_minutes: u32,
    ) -> Result<OpenLinkRoom, RoomError> {
        self.request(|reply| Command::Extend {
            room_id,
            additional_minutes,
            reply,
        })
        .await?
    }

    /// Removes an OpenLink room immediately.
    pub async fn cancel_openlink_room(
        &self,
        room_id: RoomId,
    ) -> Result<OpenLinkRoom, RoomError> {
        self.request(|reply| Command::CancelOpenLink { room_id, reply })
            .await?
    }

    pub async fn openlink_rooms(&self) -> Result<Vec<OpenLinkRoom>, RoomError> {
        self.request(|reply| Command::OpenLinkRooms { reply }).await
    }

    // -- Quotas and placement --

    /// Every quota for `owner_id`, with the rooms they currently own.
    pub async fn quota_summary(
        &self,
        owner_id: UserId,
        profile: QuotaProfile,
    ) -> Result<QuotaSummary, RoomError> {
        self.request(|reply| Command::QuotaSummary {
            owner_id,
            profile,
            reply,
        })
        .await
    }

    /// Recomputes and persists this host's capacity.
    pub async fn refresh_server_capacity(
        &self,
        profile: QuotaProfile,
    ) -> Result<u32, RoomError> {
        self.request(|reply| Command::RefreshServerCapacity { profile, reply })
            .await
    }

    /// The capacity stored by the last refresh, if any.
    pub async fn last_server_capacity(&self) -> Result<Option<u32>, RoomError> {
        self.request(|reply| Command::LastServerCapacity { reply })
            .await
    }

    pub async fn set_rotation_policy(&self, policy: RotationPolicy) -> Result<(), RoomError> {
        self.request(|reply| Command::SetRotationPolicy { policy, reply })
            .await
    }

    pub async fn set_preferred_device(
        &self,
        device: Option<DeviceId>,
    ) -> Result<(), RoomError> {
        self.request(|reply| Command::SetPreferredDevice { device, reply })
            .await
    }

    pub async fn rotation_settings(&self) -> Result<RotationState, RoomError> {
        self.request(|reply| Command::RotationSettings { reply })
            .await
    }

    // -- Lifecycle --

    /// Removes overdue ephemeral rooms and reschedules the rest from
    /// their stored deadlines.
    pub async fn cleanup_on_startup(&self) -> Result<CleanupReport, RoomError> {
        self.request(|reply| Command::CleanupOnStartup { reply })
            .await
    }

    /// Stops the actor. Pending timers are dropped; their deadlines stay
    /// persisted for the next startup.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
