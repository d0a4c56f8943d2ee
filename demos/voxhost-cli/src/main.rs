//! Voxhost demo CLI.
//!
//! Drives the room engine against a state directory and a JSON device
//! list, the way the desktop client does behind its UI.
//!
//! ```text
//! voxhost-cli -s ./state -d devices.json create-room --owner alice --name Lounge
//! voxhost-cli -s ./state -d devices.json guest --name "Drop-in"
//! voxhost-cli -s ./state -d devices.json watch --seconds 1800
//! ```
//!
//! `devices.json` holds an array of
//! `{"id", "baseURL", "accessToken", "isOnline"}` objects.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use voxhost::prelude::*;

/// Detached host notifications get this long to finish before exit.
const NOTIFY_DRAIN: Duration = Duration::from_millis(500);

/// Manage Voxhost rooms from a state directory.
#[derive(Parser, Debug)]
#[command(name = "voxhost-cli", version, about, long_about = None)]
struct Cli {
    /// Directory holding persisted room state.
    #[arg(long, short = 's', default_value = "./voxhost-state")]
    state_dir: PathBuf,

    /// JSON file listing the paired devices.
    #[arg(long, short = 'd')]
    devices: Option<PathBuf>,

    /// Identity sent with room-summary broadcasts.
    #[arg(long)]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every room and the placement settings.
    Status,

    /// Create a permanent room.
    CreateRoom {
        #[arg(long)]
        owner: String,
        /// Display handle; defaults to `@<owner>`.
        #[arg(long)]
        handle: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        private: bool,
        #[arg(long)]
        password: Option<String>,
        /// JSON quota profile; defaults to a newbie on the free tier.
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Delete a permanent room.
    DeleteRoom { room_id: String },

    /// Point a permanent room at another device.
    Migrate { room_id: String, device_id: String },

    /// Broadcast permanent-room summaries to every online device.
    Sync,

    /// Create the guest room.
    Guest {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Close the guest room early.
    CancelGuest { room_id: String },

    /// Create an OpenLink room for one visitor.
    Openlink {
        #[arg(long)]
        initiator: String,
        #[arg(long)]
        visitor: String,
    },

    /// End an OpenLink connection and start its grace window.
    EndConnection {
        room_id: String,
        /// Add a random extension to the standard grace.
        #[arg(long)]
        extend: bool,
    },

    /// Push an OpenLink removal out by some minutes (capped).
    Extend { room_id: String, minutes: u32 },

    /// Close an OpenLink room early.
    CancelOpenlink { room_id: String },

    /// Show the quotas for an owner.
    Quota {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Set the rotation policy: random, round-robin, preferred, load-balanced.
    Policy {
        policy: String,
        /// Device used by the `preferred` policy.
        #[arg(long)]
        preferred: Option<String>,
    },

    /// Keep the engine running and print room events, so pending
    /// deadlines fire.
    Watch {
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

#[derive(Serialize)]
struct Status {
    permanent: Vec<PermanentRoom>,
    guest: Vec<GuestRoom>,
    openlink: Vec<OpenLinkRoom>,
    rotation: RotationState,
    last_server_capacity: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    voxhost::init_tracing();

    let devices = match &cli.devices {
        Some(path) => load_devices(path)?,
        None => Vec::new(),
    };
    let mut config = RoomServiceConfig::default();
    if let Some(client_id) = cli.client_id.clone() {
        config.client_id = client_id;
    }

    let client = VoxhostClient::builder()
        .state_dir(&cli.state_dir)
        .room_config(config)
        .devices(devices)
        .build()
        .await
        .with_context(|| format!("opening state in {}", cli.state_dir.display()))?;

    let outcome = run(&client, cli.command).await;
    tokio::time::sleep(NOTIFY_DRAIN).await;
    client.shutdown().await?;
    outcome
}

async fn run(client: &VoxhostClient, command: Command) -> Result<()> {
    let rooms = client.rooms();
    match command {
        Command::Status => print_json(&Status {
            permanent: rooms.permanent_rooms().await?,
            guest: rooms.guest_rooms().await?,
            openlink: rooms.openlink_rooms().await?,
            rotation: rooms.rotation_settings().await?,
            last_server_capacity: rooms.last_server_capacity().await?,
        }),
        Command::CreateRoom {
            owner,
            handle,
            name,
            description,
            private,
            password,
            profile,
        } => {
            let profile = load_profile(profile.as_deref())?;
            let room = NewPermanentRoom {
                name,
                description,
                is_private: private,
                password,
                owner_handle: handle.unwrap_or_else(|| format!("@{owner}")),
                owner_id: UserId::new(owner),
            };
            rooms.refresh_server_capacity(profile.clone()).await?;
            print_json(&rooms.create_permanent_room(room, profile).await?)
        }
        Command::DeleteRoom { room_id } => {
            print_json(&rooms.delete_permanent_room(RoomId::new(room_id)).await?)
        }
        Command::Migrate { room_id, device_id } => print_json(
            &rooms
                .migrate_permanent_room(RoomId::new(room_id), DeviceId::new(device_id))
                .await?,
        ),
        Command::Sync => {
            let targeted = rooms.sync_across_devices().await?;
            println!("summaries sent to {targeted} device(s)");
            Ok(())
        }
        Command::Guest { name, description } => {
            print_json(&rooms.create_guest_room(name, description).await?)
        }
        Command::CancelGuest { room_id } => {
            print_json(&rooms.cancel_guest_room(RoomId::new(room_id)).await?)
        }
        Command::Openlink { initiator, visitor } => print_json(
            &rooms
                .create_openlink_room(UserId::new(initiator), UserId::new(visitor))
                .await?,
        ),
        Command::EndConnection { room_id, extend } => {
            print_json(&rooms.end_connection(RoomId::new(room_id), extend).await?)
        }
        Command::Extend { room_id, minutes } => {
            print_json(&rooms.extend(RoomId::new(room_id), minutes).await?)
        }
        Command::CancelOpenlink { room_id } => {
            print_json(&rooms.cancel_openlink_room(RoomId::new(room_id)).await?)
        }
        Command::Quota { owner, profile } => {
            let profile = load_profile(profile.as_deref())?;
            print_json(&rooms.quota_summary(UserId::new(owner), profile).await?)
        }
        Command::Policy { policy, preferred } => {
            let policy = parse_policy(&policy)?;
            rooms.set_rotation_policy(policy).await?;
            if preferred.is_some() || policy == RotationPolicy::Preferred {
                rooms.set_preferred_device(preferred.map(DeviceId::new)).await?;
            }
            print_json(&rooms.rotation_settings().await?)
        }
        Command::Watch { seconds } => watch(rooms, Duration::from_secs(seconds)).await,
    }
}

/// Prints room events until `duration` has passed.
async fn watch(rooms: &RoomService, duration: Duration) -> Result<()> {
    let mut events = rooms.subscribe();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => println!("{event:?}"),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event stream lagged");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = &mut deadline => return Ok(()),
        }
    }
}

fn load_devices(path: &Path) -> Result<Vec<DeviceCandidate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading device list {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing device list {}", path.display()))
}

fn load_profile(path: Option<&Path>) -> Result<QuotaProfile> {
    let Some(path) = path else {
        return Ok(QuotaProfile::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading quota profile {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing quota profile {}", path.display()))
}

fn parse_policy(name: &str) -> Result<RotationPolicy> {
    serde_json::from_value(serde_json::Value::String(name.to_owned()))
        .with_context(|| format!("unknown rotation policy {name:?}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
