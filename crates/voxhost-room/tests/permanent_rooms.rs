//! Integration tests for permanent rooms, host placement and quotas.

mod common;

use std::time::Duration;

use common::*;
use voxhost_protocol::{ApiResponse, DeviceId, HostRequest, RoomId, UserId};
use voxhost_quota::{PaidTier, QuotaProfile, RotationPolicy, TrustStatus};
use voxhost_room::{RoomError, RoomEvent};
use voxhost_store::{MemoryStore, RoomStore};
use voxhost_transport::TransportError;

// =========================================================================
// Creation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_records_host_and_quota_member_cap() {
    let h = Harness::start(vec![device("desk", true)]);

    let room = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();

    assert_eq!(room.id, RoomId::new("room-1"));
    assert_eq!(room.max_members, 2);
    assert_eq!(room.host_device_id, Some(DeviceId::new("desk")));
    assert_eq!(room.created_at, t0());
    assert!(!room.has_password);
    assert_eq!(h.service.permanent_rooms().await.unwrap(), vec![room.clone()]);

    let reopened = RoomStore::open(h.backend.clone()).unwrap();
    assert_eq!(reopened.permanent_rooms(), &[room]);
}

#[tokio::test(start_paused = true)]
async fn test_create_sends_request_body_to_selected_device() {
    let h = Harness::start(vec![device("desk", true)]);
    let mut room = new_room("alice", "Lounge");
    room.is_private = true;
    room.password = Some("hunter2".into());

    let created = h
        .service
        .create_permanent_room(room, newbie())
        .await
        .unwrap();
    assert!(created.has_password);

    let calls = h.transport.calls_to("/api/rooms/create");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].device, DeviceId::new("desk"));
    match &calls[0].request {
        HostRequest::CreatePermanent(body) => {
            assert!(body.permanent);
            assert!(body.is_private);
            assert_eq!(body.max_members, 2);
            assert_eq!(body.owner_id, UserId::new("alice"));
            assert_eq!(body.owner_username, "@alice");
            assert_eq!(body.password.as_deref(), Some("hunter2"));
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_empty_password_is_not_recorded() {
    let h = Harness::start(vec![device("desk", true)]);
    let mut room = new_room("alice", "Lounge");
    room.password = Some(String::new());

    let created = h
        .service
        .create_permanent_room(room, newbie())
        .await
        .unwrap();
    assert!(!created.has_password);
}

#[tokio::test(start_paused = true)]
async fn test_quota_exceeded_makes_no_host_call() {
    let h = Harness::start(vec![device("desk", true)]);
    h.service
        .create_permanent_room(new_room("alice", "one"), newbie())
        .await
        .unwrap();

    let err = h
        .service
        .create_permanent_room(new_room("alice", "two"), newbie())
        .await
        .unwrap_err();

    assert_eq!(err, RoomError::QuotaExceeded { owned: 1, limit: 1 });
    assert_eq!(h.transport.calls().len(), 1);
    assert_eq!(h.service.permanent_rooms().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_quota_is_per_owner() {
    let h = Harness::start(vec![device("desk", true)]);
    h.service
        .create_permanent_room(new_room("alice", "one"), newbie())
        .await
        .unwrap();

    h.service
        .create_permanent_room(new_room("carol", "one"), newbie())
        .await
        .unwrap();
    assert_eq!(h.service.permanent_rooms().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_create_counts_against_quota() {
    let h = Harness::start_with(
        quiet_config(),
        MemoryStore::new(),
        vec![device("desk", true)],
        MockTransport::with_delay(Duration::from_secs(1)),
    );

    let service = h.service.clone();
    let first = tokio::spawn(async move {
        service
            .create_permanent_room(new_room("alice", "one"), newbie())
            .await
    });
    settle().await;

    let err = h
        .service
        .create_permanent_room(new_room("alice", "two"), newbie())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::QuotaExceeded { owned: 1, limit: 1 });

    first.await.unwrap().unwrap();
    assert_eq!(h.transport.calls_to("/api/rooms/create").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_create_releases_reservation() {
    let h = Harness::start(vec![device("desk", true)]);
    h.transport
        .script(Err(TransportError::Network("connection refused".into())));

    let err = h
        .service
        .create_permanent_room(new_room("alice", "one"), newbie())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NetworkFailure("connection refused".into()));
    assert!(h.service.permanent_rooms().await.unwrap().is_empty());

    h.service
        .create_permanent_room(new_room("alice", "one"), newbie())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_banned_is_checked_before_devices() {
    let h = Harness::start(vec![]);
    let banned = QuotaProfile {
        trust_status: TrustStatus::Banned,
        ..QuotaProfile::default()
    };

    let err = h
        .service
        .create_permanent_room(new_room("mallory", "x"), banned)
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::Banned);

    let err = h
        .service
        .create_permanent_room(new_room("alice", "x"), newbie())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NoDeviceAvailable);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_offline_devices_are_never_chosen() {
    let h = Harness::start(vec![device("desk", false), device("laptop", false)]);

    let err = h
        .service
        .create_permanent_room(new_room("alice", "x"), newbie())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NoDeviceAvailable);

    h.directory.set_online(&DeviceId::new("laptop"), true);
    let room = h
        .service
        .create_permanent_room(new_room("alice", "x"), newbie())
        .await
        .unwrap();
    assert_eq!(room.host_device_id, Some(DeviceId::new("laptop")));
}

#[tokio::test(start_paused = true)]
async fn test_host_rejection_surfaces_message_verbatim() {
    let h = Harness::start(vec![device("desk", true)]);
    h.transport
        .script(Ok(ApiResponse::rejected("Room name already taken")));

    let err = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap_err();

    assert_eq!(err, RoomError::ServerRejected("Room name already taken".into()));
    assert_eq!(err.to_string(), "Room name already taken");
    assert!(h.service.permanent_rooms().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_success_without_room_id_is_rejected() {
    let h = Harness::start(vec![device("desk", true)]);
    h.transport.script(Ok(ApiResponse::ok()));

    let err = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap_err();

    assert!(matches!(err, RoomError::ServerRejected(_)));
    assert!(h.service.permanent_rooms().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_success_is_recorded_after_caller_leaves() {
    let h = Harness::start_with(
        quiet_config(),
        MemoryStore::new(),
        vec![device("desk", true)],
        MockTransport::with_delay(Duration::from_secs(1)),
    );
    let mut events = h.service.subscribe();

    let service = h.service.clone();
    let caller = tokio::spawn(async move {
        service
            .create_permanent_room(new_room("alice", "Lounge"), newbie())
            .await
    });
    settle().await;
    caller.abort();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let rooms = h.service.permanent_rooms().await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, RoomId::new("room-1"));
    assert_eq!(
        next_event(&mut events).await,
        RoomEvent::PermanentCreated {
            room_id: RoomId::new("room-1"),
            host: DeviceId::new("desk"),
        }
    );
}

// =========================================================================
// Deletion, migration and sync
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_delete_notifies_online_host() {
    let h = Harness::start(vec![device("desk", true)]);
    let room = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();

    h.service.delete_permanent_room(room.id.clone()).await.unwrap();
    settle().await;

    assert!(h.service.permanent_rooms().await.unwrap().is_empty());
    let deletes = h.transport.calls_to("/api/rooms/room-1/delete");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].device, DeviceId::new("desk"));
}

#[tokio::test(start_paused = true)]
async fn test_delete_with_offline_host_still_removes_locally() {
    let h = Harness::start(vec![device("desk", true)]);
    let room = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();
    h.directory.set_online(&DeviceId::new("desk"), false);

    h.service.delete_permanent_room(room.id).await.unwrap();
    settle().await;

    assert!(h.service.permanent_rooms().await.unwrap().is_empty());
    assert!(h.transport.calls_to("/api/rooms/room-1/delete").is_empty());

    // The quota slot is free again.
    h.directory.set_online(&DeviceId::new("desk"), true);
    h.service
        .create_permanent_room(new_room("alice", "Again"), newbie())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_delete_succeeds_when_host_refuses() {
    let h = Harness::start(vec![device("desk", true)]);
    let room = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();
    h.transport
        .script(Err(TransportError::Network("connection reset".into())));

    let deleted = h.service.delete_permanent_room(room.id).await.unwrap();
    settle().await;

    assert_eq!(deleted.name, "Lounge");
    assert!(h.service.permanent_rooms().await.unwrap().is_empty());
    assert_eq!(h.transport.calls_to("/api/rooms/room-1/delete").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_unknown_room() {
    let h = Harness::start(vec![device("desk", true)]);
    let err = h
        .service
        .delete_permanent_room(RoomId::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::NotFound(RoomId::new("nope")));
}

#[tokio::test(start_paused = true)]
async fn test_migrate_repoints_host_without_host_calls() {
    let h = Harness::start(vec![device("desk", true), device("laptop", true)]);
    let mut events = h.service.subscribe();
    let room = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();
    let _ = next_event(&mut events).await;
    let calls_before = h.transport.calls().len();

    let moved = h
        .service
        .migrate_permanent_room(room.id.clone(), DeviceId::new("laptop"))
        .await
        .unwrap();
    settle().await;

    assert_eq!(moved.host_device_id, Some(DeviceId::new("laptop")));
    assert_eq!(h.transport.calls().len(), calls_before);
    assert_eq!(
        next_event(&mut events).await,
        RoomEvent::PermanentMigrated {
            room_id: room.id,
            from: Some(DeviceId::new("desk")),
            to: DeviceId::new("laptop"),
        }
    );

    let reopened = RoomStore::open(h.backend.clone()).unwrap();
    assert_eq!(
        reopened.permanent_rooms()[0].host_device_id,
        Some(DeviceId::new("laptop"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_sync_targets_every_online_device() {
    let h = Harness::start(vec![
        device("desk", true),
        device("laptop", true),
        device("phone", false),
    ]);
    h.service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();

    let targeted = h.service.sync_across_devices().await.unwrap();
    settle().await;

    assert_eq!(targeted, 2);
    let syncs = h.transport.calls_to("/api/rooms/sync");
    let devices: Vec<_> = syncs.iter().map(|c| c.device.as_str().to_owned()).collect();
    assert_eq!(devices.len(), 2);
    assert!(devices.contains(&"desk".to_owned()));
    assert!(devices.contains(&"laptop".to_owned()));
    for call in &syncs {
        match &call.request {
            HostRequest::SyncRooms(body) => {
                assert_eq!(body.client_id, "test-client");
                assert_eq!(body.rooms.len(), 1);
                assert_eq!(body.rooms[0].id, RoomId::new("room-1"));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_sync_failures_are_not_reported() {
    let h = Harness::start(vec![device("desk", true)]);
    h.transport
        .script(Err(TransportError::Network("unreachable".into())));

    assert_eq!(h.service.sync_across_devices().await.unwrap(), 1);
}

// =========================================================================
// Placement
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_round_robin_rotates_and_survives_restart() {
    let mut h = Harness::start(vec![device("a", true), device("b", true), device("c", true)]);

    let mut hosts = Vec::new();
    for n in 0..4 {
        let room = h
            .service
            .create_openlink_room(UserId::new(format!("host{n}")), UserId::new("visitor"))
            .await
            .unwrap();
        hosts.push(room.host_device_id.as_str().to_owned());
    }
    assert_eq!(hosts, ["a", "b", "c", "a"]);
    assert_eq!(
        h.service.rotation_settings().await.unwrap().last_host,
        Some(DeviceId::new("a"))
    );

    h.restart(quiet_config()).await;
    let room = h
        .service
        .create_openlink_room(UserId::new("host"), UserId::new("visitor"))
        .await
        .unwrap();
    assert_eq!(room.host_device_id, DeviceId::new("b"));
}

#[tokio::test(start_paused = true)]
async fn test_load_balanced_counts_every_room_kind() {
    let h = Harness::start(vec![device("a", true), device("b", true)]);
    h.service
        .set_rotation_policy(RotationPolicy::LoadBalanced)
        .await
        .unwrap();

    let permanent = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();
    let openlink = h
        .service
        .create_openlink_room(UserId::new("alice"), UserId::new("bob"))
        .await
        .unwrap();
    let guest = h
        .service
        .create_guest_room("Drop-in", "")
        .await
        .unwrap();

    assert_eq!(permanent.host_device_id, Some(DeviceId::new("a")));
    assert_eq!(openlink.host_device_id, DeviceId::new("b"));
    assert_eq!(guest.host_device_id, DeviceId::new("a"));
}

#[tokio::test(start_paused = true)]
async fn test_preferred_device_with_fallback() {
    let h = Harness::start(vec![device("a", true), device("b", true)]);
    h.service
        .set_rotation_policy(RotationPolicy::Preferred)
        .await
        .unwrap();
    h.service
        .set_preferred_device(Some(DeviceId::new("b")))
        .await
        .unwrap();

    let first = h
        .service
        .create_openlink_room(UserId::new("alice"), UserId::new("bob"))
        .await
        .unwrap();
    assert_eq!(first.host_device_id, DeviceId::new("b"));

    h.directory.set_online(&DeviceId::new("b"), false);
    let second = h
        .service
        .create_openlink_room(UserId::new("alice"), UserId::new("carol"))
        .await
        .unwrap();
    assert_eq!(second.host_device_id, DeviceId::new("a"));
}

#[tokio::test(start_paused = true)]
async fn test_rotation_settings_persist() {
    let mut h = Harness::start(vec![device("a", true)]);
    h.service
        .set_rotation_policy(RotationPolicy::Random)
        .await
        .unwrap();
    h.service
        .set_preferred_device(Some(DeviceId::new("a")))
        .await
        .unwrap();

    h.restart(quiet_config()).await;

    let settings = h.service.rotation_settings().await.unwrap();
    assert_eq!(settings.policy, RotationPolicy::Random);
    assert_eq!(settings.preferred_device, Some(DeviceId::new("a")));
}

// =========================================================================
// Quotas and lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_quota_summary_reflects_owned_rooms() {
    let h = Harness::start(vec![device("desk", true)]);
    let unlimited = QuotaProfile {
        paid_tier: PaidTier::Unlimited,
        ..QuotaProfile::default()
    };

    let before = h
        .service
        .quota_summary(UserId::new("alice"), newbie())
        .await
        .unwrap();
    assert_eq!(before.owned_rooms, 0);
    assert_eq!(before.max_permanent_rooms, 1);
    assert_eq!(before.max_members_per_room, 2);
    assert_eq!(before.remaining_rooms(), 1);

    h.service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap();
    let after = h
        .service
        .quota_summary(UserId::new("alice"), newbie())
        .await
        .unwrap();
    assert_eq!(after.owned_rooms, 1);
    assert_eq!(after.remaining_rooms(), 0);

    let paid = h
        .service
        .quota_summary(UserId::new("alice"), unlimited)
        .await
        .unwrap();
    assert!(paid.max_permanent_rooms > 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_capacity_is_persisted() {
    let mut h = Harness::start(vec![device("desk", true)]);
    assert_eq!(h.service.last_server_capacity().await.unwrap(), None);

    let capacity = h.service.refresh_server_capacity(newbie()).await.unwrap();
    assert_eq!(capacity, 50);

    h.restart(quiet_config()).await;
    assert_eq!(h.service.last_server_capacity().await.unwrap(), Some(50));
}

#[tokio::test(start_paused = true)]
async fn test_calls_after_shutdown_are_unavailable() {
    let h = Harness::start(vec![device("desk", true)]);
    h.service.shutdown().await.unwrap();
    settle().await;

    let err = h.service.permanent_rooms().await.unwrap_err();
    assert_eq!(err, RoomError::Unavailable);
    let err = h
        .service
        .create_permanent_room(new_room("alice", "Lounge"), newbie())
        .await
        .unwrap_err();
    assert_eq!(err, RoomError::Unavailable);
}
