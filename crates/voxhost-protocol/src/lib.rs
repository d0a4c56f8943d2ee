//! Data model and host API contracts for Voxhost.
//!
//! This crate is the vocabulary shared by every other layer:
//!
//! - **Types** ([`PermanentRoom`], [`GuestRoom`], [`OpenLinkRoom`],
//!   [`DeviceCandidate`], identifier newtypes): the records the room
//!   engine keeps and persists.
//! - **Wire** ([`HostRequest`], [`ApiResponse`]): the JSON contracts
//!   spoken with a hosting device.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values are
//!   converted to and from bytes, both on the wire and on disk.
//!
//! ```text
//! Room engine (records) → Protocol (HostRequest) → Transport (HTTP)
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    DeviceCandidate, DeviceId, GraceKind, GuestRoom, OpenLinkPhase,
    OpenLinkRoom, PermanentRoom, RoomId, UserId,
};
pub use wire::{
    ApiResponse, CreateGuestRoomRequest, CreateOpenLinkRequest,
    CreatePermanentRoomRequest, HostMethod, HostRequest, RoomSummary,
    SyncRoomsRequest,
};
