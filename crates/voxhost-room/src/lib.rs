//! Room lifecycle management for Voxhost.
//!
//! One actor task owns every room record. A [`RoomService`] handle sends
//! it commands; host calls run on their own tasks and report back to the
//! actor, and removal deadlines fire inside the same loop. Nothing else
//! touches the store, so creates, deletes, and expiries never race.
//!
//! # Key types
//!
//! - [`RoomService`]: the handle: permanent, guest, and OpenLink
//!   operations plus quota and rotation settings
//! - [`RoomServiceConfig`]: lifetimes, grace windows, channel sizes
//! - [`DeviceDirectory`]: where hosting devices come from
//! - [`RoomEvent`]: broadcast of every change, for the UI
//! - [`RoomError`]: why an operation failed

mod actor;
mod config;
mod directory;
mod error;
mod events;
mod guest;
mod openlink;
mod permanent;
mod service;

pub use config::{GUEST_MAX_MINUTES, GUEST_MIN_MINUTES, OPENLINK_GRACE_LIMIT, RoomServiceConfig};
pub use directory::{DeviceDirectory, StaticDirectory};
pub use error::RoomError;
pub use events::{CloseReason, RoomEvent};
pub use permanent::NewPermanentRoom;
pub use service::{CleanupReport, RoomService};
