use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;

use crate::shared::{LocalId, RegionHandle, Vector3};

/// One tick of the simulation frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub frame: u64,
    pub uptime: Duration,
}

/// An avatar presence entering or already in the scene.
///
/// Carries a snapshot of presence data, not the presence itself; handlers
/// that need live state look it up through the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceArgs {
    pub agent_id: Uuid,
    pub name: String,
    pub position: Vector3,
}

/// Avatar position/velocity change reported by the movement integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvatarMovement {
    pub agent_id: Uuid,
    pub position: Vector3,
    pub velocity: Vector3,
}

/// A script asset being instantiated into a part's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RezScriptArgs {
    pub part_local_id: LocalId,
    pub item_id: Uuid,
    pub source: String,
    pub start_param: i32,
}

/// Identifies one script instance for lifecycle transitions
/// (start/stop/reset/remove).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptTarget {
    pub part_local_id: LocalId,
    pub item_id: Uuid,
}

/// An object entering or leaving the scene graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectArgs {
    pub local_id: LocalId,
    pub object_id: Uuid,
    pub name: String,
}

/// Who originated a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum ChatSource {
    Agent,
    Object,
}

/// A routed chat message, sender already resolved against scene state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatArgs {
    pub sender_id: Uuid,
    pub sender_name: String,
    pub source: ChatSource,
    pub channel: i32,
    pub message: String,
    pub position: Vector3,
    /// Non-empty for private routing to a single listener.
    pub target_id: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
}

/// A land purchase being validated or committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandBuyArgs {
    pub agent_id: Uuid,
    pub parcel_local_id: i32,
    pub price: i32,
    pub area: i32,
    pub authenticated: bool,
}

/// A request to move a linked object group, subject to permission veto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupMoveArgs {
    pub group_root_local_id: LocalId,
    pub mover_id: Uuid,
}

/// An avatar beginning a teleport out of this region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportArgs {
    pub agent_id: Uuid,
    pub destination_handle: RegionHandle,
    pub destination_position: Vector3,
    pub teleport_flags: u32,
}

/// One contact point between a part and another collider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Local id of the other collider; zero for terrain contacts.
    pub with_local_id: LocalId,
    pub position: Vector3,
    pub depth: f32,
}

/// Collision notification for one part on one frame.
///
/// The physics integration computes the start/continuing/end transition per
/// colliding pair and fires the matching topic; the bus is state-agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderArgs {
    pub part_local_id: LocalId,
    pub contacts: Vec<ContactPoint>,
}

/// A touch delivered to one part, after bubbling rules were applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchArgs {
    /// The part this delivery targets (may be the root after bubbling).
    pub part_local_id: LocalId,
    /// The part the user actually touched.
    pub touched_part_local_id: LocalId,
    pub agent_id: Uuid,
    pub touch_position: Vector3,
}
