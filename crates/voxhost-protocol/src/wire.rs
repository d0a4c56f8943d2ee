//! JSON contracts spoken with a hosting device.
//!
//! Every call is an HTTP request against the selected device's base URL.
//! Field names on the wire are camelCase, so every body type carries
//! `#[serde(rename_all = "camelCase")]`.
//!
//! | Request | Method / path |
//! |---|---|
//! | [`HostRequest::CreatePermanent`] | `POST /api/rooms/create` |
//! | [`HostRequest::DeletePermanent`] | `DELETE /api/rooms/{id}/delete` |
//! | [`HostRequest::CreateGuest`] | `POST /api/rooms/create-guest` |
//! | [`HostRequest::ExpireGuest`] | `POST /api/rooms/{id}/expire` |
//! | [`HostRequest::CreateOpenLink`] | `POST /api/rooms/create-openlink` |
//! | [`HostRequest::RemoveOpenLink`] | `POST /api/rooms/{id}/remove-openlink` |
//! | [`HostRequest::SyncRooms`] | `POST /api/rooms/sync` |

use serde::{Deserialize, Serialize};

use crate::{Codec, DeviceId, PermanentRoom, ProtocolError, RoomId, UserId};

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/rooms/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermanentRoomRequest {
    pub name: String,
    pub description: String,
    pub is_private: bool,
    pub max_members: u32,
    pub owner_id: UserId,
    pub owner_username: String,
    /// Always `true` for this call.
    pub permanent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Body of `POST /api/rooms/create-guest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuestRoomRequest {
    pub name: String,
    pub description: String,
    pub max_members: u32,
    pub duration_minutes: u32,
    /// Always `true` for this call.
    pub is_guest: bool,
    pub device_id: DeviceId,
}

/// Body of `POST /api/rooms/create-openlink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpenLinkRequest {
    pub initiator_id: UserId,
    pub visitor_id: UserId,
    /// Always `true` for this call.
    pub is_hidden: bool,
    /// Always `"openlink"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub device_id: DeviceId,
}

impl CreateOpenLinkRequest {
    /// The fixed `type` discriminator hosts expect.
    pub const KIND: &'static str = "openlink";
}

/// One entry of the sync broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub host_device_id: Option<DeviceId>,
    pub max_members: u32,
    pub current_members: u32,
}

impl From<&PermanentRoom> for RoomSummary {
    fn from(room: &PermanentRoom) -> Self {
        Self {
            id: room.id.clone(),
            name: room.name.clone(),
            description: room.description.clone(),
            host_device_id: room.host_device_id.clone(),
            max_members: room.max_members,
            current_members: room.current_members,
        }
    }
}

/// Body of `POST /api/rooms/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRoomsRequest {
    pub rooms: Vec<RoomSummary>,
    pub client_id: String,
}

// ---------------------------------------------------------------------------
// HostRequest
// ---------------------------------------------------------------------------

/// HTTP method of a host call. Only the two verbs the host API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMethod {
    Post,
    Delete,
}

/// A single call against a hosting device's room API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRequest {
    CreatePermanent(CreatePermanentRoomRequest),
    DeletePermanent { room_id: RoomId },
    CreateGuest(CreateGuestRoomRequest),
    ExpireGuest { room_id: RoomId },
    CreateOpenLink(CreateOpenLinkRequest),
    RemoveOpenLink { room_id: RoomId },
    SyncRooms(SyncRoomsRequest),
}

impl HostRequest {
    /// The HTTP method for this call.
    pub fn method(&self) -> HostMethod {
        match self {
            Self::DeletePermanent { .. } => HostMethod::Delete,
            _ => HostMethod::Post,
        }
    }

    /// Path segments below the device's base URL.
    ///
    /// Returned unescaped; the transport is responsible for percent
    /// encoding (room IDs are chosen by the host and may contain
    /// anything).
    pub fn path_segments(&self) -> Vec<&str> {
        match self {
            Self::CreatePermanent(_) => vec!["api", "rooms", "create"],
            Self::DeletePermanent { room_id } => {
                vec!["api", "rooms", room_id.as_str(), "delete"]
            }
            Self::CreateGuest(_) => vec!["api", "rooms", "create-guest"],
            Self::ExpireGuest { room_id } => {
                vec!["api", "rooms", room_id.as_str(), "expire"]
            }
            Self::CreateOpenLink(_) => {
                vec!["api", "rooms", "create-openlink"]
            }
            Self::RemoveOpenLink { room_id } => {
                vec!["api", "rooms", room_id.as_str(), "remove-openlink"]
            }
            Self::SyncRooms(_) => vec!["api", "rooms", "sync"],
        }
    }

    /// The path as a display string, e.g. `/api/rooms/create`.
    pub fn path(&self) -> String {
        let mut path = String::new();
        for segment in self.path_segments() {
            path.push('/');
            path.push_str(segment);
        }
        path
    }

    /// Encodes the request body, or `None` for body-less calls.
    pub fn encode_body<C: Codec>(
        &self,
        codec: &C,
    ) -> Result<Option<Vec<u8>>, ProtocolError> {
        let body = match self {
            Self::CreatePermanent(body) => codec.encode(body)?,
            Self::CreateGuest(body) => codec.encode(body)?,
            Self::CreateOpenLink(body) => codec.encode(body)?,
            Self::SyncRooms(body) => codec.encode(body)?,
            Self::DeletePermanent { .. }
            | Self::ExpireGuest { .. }
            | Self::RemoveOpenLink { .. } => return Ok(None),
        };
        Ok(Some(body))
    }
}

// ---------------------------------------------------------------------------
// ApiResponse
// ---------------------------------------------------------------------------

/// The envelope every host answers with.
///
/// Success: `{"success": true, "roomId": "..."}` (roomId only for create
/// calls). Failure: `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    /// A bare success without a room ID.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A success carrying a newly assigned room ID.
    pub fn created(room_id: RoomId) -> Self {
        Self {
            success: true,
            room_id: Some(room_id),
            error: None,
        }
    }

    /// A rejection with the host's error message.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            room_id: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::JsonCodec;

    fn body_json(request: &HostRequest) -> serde_json::Value {
        let bytes = request.encode_body(&JsonCodec).unwrap().unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_create_permanent_json_format() {
        let request = HostRequest::CreatePermanent(CreatePermanentRoomRequest {
            name: "Lounge".into(),
            description: "evening chat".into(),
            is_private: true,
            max_members: 35,
            owner_id: UserId::new("u-1"),
            owner_username: "alice".into(),
            permanent: true,
            password: None,
        });
        let json = body_json(&request);

        assert_eq!(json["name"], "Lounge");
        assert_eq!(json["isPrivate"], true);
        assert_eq!(json["maxMembers"], 35);
        assert_eq!(json["ownerId"], "u-1");
        assert_eq!(json["ownerUsername"], "alice");
        assert_eq!(json["permanent"], true);
        // Absent password is omitted, not sent as null.
        assert!(json.get("password").is_none());
        assert_eq!(request.path(), "/api/rooms/create");
        assert_eq!(request.method(), HostMethod::Post);
    }

    #[test]
    fn test_create_guest_json_format() {
        let request = HostRequest::CreateGuest(CreateGuestRoomRequest {
            name: "Quick".into(),
            description: String::new(),
            max_members: 15,
            duration_minutes: 22,
            is_guest: true,
            device_id: DeviceId::new("d1"),
        });
        let json = body_json(&request);

        assert_eq!(json["maxMembers"], 15);
        assert_eq!(json["durationMinutes"], 22);
        assert_eq!(json["isGuest"], true);
        assert_eq!(json["deviceId"], "d1");
        assert_eq!(request.path(), "/api/rooms/create-guest");
    }

    #[test]
    fn test_create_openlink_uses_type_key() {
        let request = HostRequest::CreateOpenLink(CreateOpenLinkRequest {
            initiator_id: UserId::new("a"),
            visitor_id: UserId::new("b"),
            is_hidden: true,
            kind: CreateOpenLinkRequest::KIND.into(),
            device_id: DeviceId::new("d2"),
        });
        let json = body_json(&request);

        assert_eq!(json["type"], "openlink");
        assert_eq!(json["isHidden"], true);
        assert_eq!(json["initiatorId"], "a");
        assert_eq!(json["visitorId"], "b");
    }

    #[test]
    fn test_sync_body_lists_summaries() {
        let request = HostRequest::SyncRooms(SyncRoomsRequest {
            rooms: vec![RoomSummary {
                id: RoomId::new("r1"),
                name: "Lounge".into(),
                description: String::new(),
                host_device_id: Some(DeviceId::new("d1")),
                max_members: 10,
                current_members: 3,
            }],
            client_id: "client-9".into(),
        });
        let json = body_json(&request);

        assert_eq!(json["clientId"], "client-9");
        assert_eq!(json["rooms"][0]["hostDeviceId"], "d1");
        assert_eq!(json["rooms"][0]["currentMembers"], 3);
    }

    #[test]
    fn test_room_scoped_paths() {
        let id = RoomId::new("r-42");
        let delete = HostRequest::DeletePermanent { room_id: id.clone() };
        assert_eq!(delete.path(), "/api/rooms/r-42/delete");
        assert_eq!(delete.method(), HostMethod::Delete);
        assert!(delete.encode_body(&JsonCodec).unwrap().is_none());

        let expire = HostRequest::ExpireGuest { room_id: id.clone() };
        assert_eq!(expire.path(), "/api/rooms/r-42/expire");

        let remove = HostRequest::RemoveOpenLink { room_id: id };
        assert_eq!(remove.path(), "/api/rooms/r-42/remove-openlink");
        assert_eq!(remove.method(), HostMethod::Post);
    }

    #[test]
    fn test_api_response_parses_success_and_failure() {
        let ok: ApiResponse =
            serde_json::from_str(r#"{"success":true,"roomId":"r9"}"#).unwrap();
        assert_eq!(ok, ApiResponse::created(RoomId::new("r9")));

        let err: ApiResponse =
            serde_json::from_str(r#"{"success":false,"error":"Room limit"}"#)
                .unwrap();
        assert_eq!(err, ApiResponse::rejected("Room limit"));
    }

    #[test]
    fn test_api_response_missing_success_reads_as_failure() {
        let resp: ApiResponse = serde_json::from_str("{}").unwrap();
        assert!(!resp.success);
        assert!(resp.error.is_none());
    }
}
