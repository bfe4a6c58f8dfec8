use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::context::RegionContext;
use crate::dispatch::FolderContents;
use crate::event::{AvatarMovement, ObjectArgs, PresenceArgs};
use crate::shared::{LocalId, RegionHandle, Vector3};

/// Abstract handle to a connected client, capable of receiving typed
/// updates. The wire protocol behind it is external to this core.
#[async_trait]
pub trait ClientView: Send + Sync {
    fn agent_id(&self) -> Uuid;

    /// Delivers the result of an inventory descendants fetch.
    async fn send_inventory_descendants(&self, contents: &FolderContents);
}

/// A connected avatar's presence in this region.
pub struct ScenePresence {
    pub agent_id: Uuid,
    pub name: String,
    pub client: Arc<dyn ClientView>,
    pub joined_at: DateTime<Utc>,
    movement: RwLock<(Vector3, Vector3)>,
    /// Handles of every region this avatar currently has a presence in
    /// (root here, children on neighbours). Std lock on purpose: the
    /// coordinator snapshots it with `try_read` and treats contention as a
    /// benign skip.
    known_regions: RwLock<Vec<RegionHandle>>,
}

impl ScenePresence {
    fn new(agent_id: Uuid, name: String, position: Vector3, client: Arc<dyn ClientView>) -> Self {
        Self {
            agent_id,
            name,
            client,
            joined_at: Utc::now(),
            movement: RwLock::new((position, Vector3::default())),
            known_regions: RwLock::new(Vec::new()),
        }
    }

    /// Current (position, velocity) snapshot.
    pub fn movement(&self) -> (Vector3, Vector3) {
        *self.movement.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_movement(&self, position: Vector3, velocity: Vector3) {
        *self.movement.write().unwrap_or_else(|p| p.into_inner()) = (position, velocity);
    }

    pub fn add_known_region(&self, handle: RegionHandle) {
        let mut known = self
            .known_regions
            .write()
            .unwrap_or_else(|p| p.into_inner());
        if !known.contains(&handle) {
            known.push(handle);
        }
    }

    pub fn drop_known_region(&self, handle: RegionHandle) {
        let mut known = self
            .known_regions
            .write()
            .unwrap_or_else(|p| p.into_inner());
        known.retain(|h| *h != handle);
    }

    /// Non-blocking snapshot of the known-region set. `None` when the set
    /// is concurrently being mutated; callers treat that as "stop, the
    /// data is already stale" rather than retrying.
    pub fn try_known_regions(&self) -> Option<Vec<RegionHandle>> {
        self.known_regions.try_read().ok().map(|g| g.clone())
    }
}

/// Per-phase "this part has a script handler" flags, maintained by the
/// scripting host as scripts subscribe to touch events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchHandlerFlags {
    pub start: bool,
    pub hold: bool,
    pub end: bool,
}

/// One part of a (possibly linked) scene object.
#[derive(Debug, Clone)]
pub struct SceneObjectPart {
    pub local_id: LocalId,
    pub id: Uuid,
    pub name: String,
    /// Local id of the root part of the containing object; equals
    /// `local_id` for the root itself.
    pub root_local_id: LocalId,
    pub touch_handlers: TouchHandlerFlags,
    /// When set, touches handled by this part are additionally passed to
    /// the root part.
    pub pass_touches: bool,
}

impl SceneObjectPart {
    pub fn is_root(&self) -> bool {
        self.local_id == self.root_local_id
    }
}

/// The scene state the request dispatcher resolves against: who is present
/// and which object parts exist. Everything else about the scene (physics,
/// terrain, parcels) lives in external subsystems.
///
/// Presence add/remove and client-closed topics are triggered from here;
/// callers invoke these under their per-agent lock, so handlers must avoid
/// long-running work.
pub struct Scene {
    ctx: Arc<RegionContext>,
    presences: RwLock<HashMap<Uuid, Arc<ScenePresence>>>,
    parts: RwLock<HashMap<LocalId, Arc<SceneObjectPart>>>,
    part_ids: RwLock<HashMap<Uuid, LocalId>>,
}

impl Scene {
    pub fn new(ctx: Arc<RegionContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            presences: RwLock::new(HashMap::new()),
            parts: RwLock::new(HashMap::new()),
            part_ids: RwLock::new(HashMap::new()),
        })
    }

    pub fn ctx(&self) -> &Arc<RegionContext> {
        &self.ctx
    }

    pub fn add_presence(
        &self,
        agent_id: Uuid,
        name: impl Into<String>,
        position: Vector3,
        client: Arc<dyn ClientView>,
    ) -> Arc<ScenePresence> {
        let presence = Arc::new(ScenePresence::new(agent_id, name.into(), position, client));
        {
            let mut presences = self.presences.write().unwrap_or_else(|p| p.into_inner());
            presences.insert(agent_id, Arc::clone(&presence));
        }

        self.ctx.events.on_new_presence.trigger(&PresenceArgs {
            agent_id,
            name: presence.name.clone(),
            position,
        });
        presence
    }

    pub fn remove_presence(&self, agent_id: Uuid) -> Option<Arc<ScenePresence>> {
        let removed = {
            let mut presences = self.presences.write().unwrap_or_else(|p| p.into_inner());
            presences.remove(&agent_id)
        };

        if removed.is_some() {
            self.ctx.events.on_remove_presence.trigger(&agent_id);
            self.ctx.events.on_client_closed.trigger(&agent_id);
        } else {
            debug!(agent_id = %agent_id, "Remove requested for unknown presence");
        }
        removed
    }

    pub fn presence(&self, agent_id: Uuid) -> Option<Arc<ScenePresence>> {
        let presences = self.presences.read().unwrap_or_else(|p| p.into_inner());
        presences.get(&agent_id).cloned()
    }

    /// Applies a movement update and publishes it to the bus.
    pub fn update_presence_movement(&self, agent_id: Uuid, position: Vector3, velocity: Vector3) {
        let Some(presence) = self.presence(agent_id) else {
            debug!(agent_id = %agent_id, "Movement update for unknown presence - dropping");
            return;
        };
        presence.set_movement(position, velocity);
        self.ctx.events.on_avatar_moved.trigger(&AvatarMovement {
            agent_id,
            position,
            velocity,
        });
    }

    pub fn add_part(&self, part: SceneObjectPart) -> Arc<SceneObjectPart> {
        let part = Arc::new(part);
        {
            let mut parts = self.parts.write().unwrap_or_else(|p| p.into_inner());
            let mut part_ids = self.part_ids.write().unwrap_or_else(|p| p.into_inner());
            parts.insert(part.local_id, Arc::clone(&part));
            part_ids.insert(part.id, part.local_id);
        }

        self.ctx.events.on_object_added.trigger(&ObjectArgs {
            local_id: part.local_id,
            object_id: part.id,
            name: part.name.clone(),
        });
        part
    }

    pub fn remove_part(&self, local_id: LocalId) -> Option<Arc<SceneObjectPart>> {
        let removed = {
            let mut parts = self.parts.write().unwrap_or_else(|p| p.into_inner());
            let mut part_ids = self.part_ids.write().unwrap_or_else(|p| p.into_inner());
            let removed = parts.remove(&local_id);
            if let Some(part) = &removed {
                part_ids.remove(&part.id);
            }
            removed
        };

        if let Some(part) = &removed {
            self.ctx.events.on_object_removed.trigger(&ObjectArgs {
                local_id: part.local_id,
                object_id: part.id,
                name: part.name.clone(),
            });
        }
        removed
    }

    pub fn part(&self, local_id: LocalId) -> Option<Arc<SceneObjectPart>> {
        let parts = self.parts.read().unwrap_or_else(|p| p.into_inner());
        parts.get(&local_id).cloned()
    }

    pub fn part_by_uuid(&self, id: Uuid) -> Option<Arc<SceneObjectPart>> {
        let local_id = {
            let part_ids = self.part_ids.read().unwrap_or_else(|p| p.into_inner());
            part_ids.get(&id).copied()
        }?;
        self.part(local_id)
    }
}
