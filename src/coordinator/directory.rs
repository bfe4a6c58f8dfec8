use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::module::AgentStateFormat;
use crate::shared::{RegionError, RegionHandle, Vector3};

/// Directory record for one region process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    pub id: Uuid,
    pub name: String,
    pub handle: RegionHandle,
    /// Server endpoint hosting the region. Multiple regions can share one
    /// hosting server, which is why coordination calls deduplicate on this.
    pub endpoint: String,
}

/// A geographic neighbour as reported by the grid directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborDescriptor {
    pub region: RegionDescriptor,
    /// Liveness flag; older directory services omit it entirely.
    pub online: Option<bool>,
}

impl NeighborDescriptor {
    /// A neighbour with no liveness flag is treated as online.
    pub fn is_online(&self) -> bool {
        self.online.unwrap_or(true)
    }
}

/// Live state relayed to every region an avatar has a presence in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateUpdate {
    pub agent_id: Uuid,
    pub position: Vector3,
    pub velocity: Vector3,
    /// Formats the sending region can render, for handoff negotiation.
    pub renderable_formats: Vec<AgentStateFormat>,
}

/// Grid directory service: the source of truth for which regions exist and
/// where they are hosted. Consumed, not implemented, by this core; results
/// are not cached beyond a single coordination operation.
#[async_trait]
pub trait GridDirectory: Send + Sync {
    async fn get_neighbours(
        &self,
        region_id: Uuid,
    ) -> Result<Vec<NeighborDescriptor>, RegionError>;

    async fn get_region_by_handle(
        &self,
        handle: RegionHandle,
    ) -> Result<Option<RegionDescriptor>, RegionError>;
}

/// Transport to neighbouring region processes. All calls are best-effort;
/// any timeout is enforced inside the implementation, not by callers.
#[async_trait]
pub trait SimulationTransport: Send + Sync {
    /// Announces `self_descriptor` to the region behind `handle`; returns
    /// the neighbour's acknowledging descriptor.
    async fn hello_neighbour(
        &self,
        handle: RegionHandle,
        self_descriptor: &RegionDescriptor,
    ) -> Result<RegionDescriptor, RegionError>;

    /// Relays a moving avatar's live state to a destination region.
    async fn update_agent(
        &self,
        destination: &RegionDescriptor,
        update: &AgentStateUpdate,
    ) -> Result<(), RegionError>;

    /// Closes an avatar's child presence on a destination region.
    async fn close_agent(
        &self,
        destination: &RegionDescriptor,
        agent_id: Uuid,
        auth_token: &str,
    ) -> Result<(), RegionError>;
}

/// In-process grid directory over explicitly registered regions, with
/// 8-neighbourhood adjacency. Used by the host binary and tests; a real
/// deployment points the coordinator at a remote directory instead.
pub struct InMemoryGridDirectory {
    regions: RwLock<HashMap<RegionHandle, RegionDescriptor>>,
}

impl InMemoryGridDirectory {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_region(&self, descriptor: RegionDescriptor) {
        let mut regions = self.regions.write().await;
        debug!(
            region = %descriptor.name,
            handle = %descriptor.handle,
            "Registered region in directory"
        );
        regions.insert(descriptor.handle, descriptor);
    }

    pub async fn deregister_region(&self, handle: RegionHandle) {
        let mut regions = self.regions.write().await;
        regions.remove(&handle);
    }
}

impl Default for InMemoryGridDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GridDirectory for InMemoryGridDirectory {
    async fn get_neighbours(
        &self,
        region_id: Uuid,
    ) -> Result<Vec<NeighborDescriptor>, RegionError> {
        let regions = self.regions.read().await;
        let own = regions
            .values()
            .find(|r| r.id == region_id)
            .cloned()
            .ok_or_else(|| RegionError::NotFound(format!("region {region_id}")))?;

        let neighbours = regions
            .values()
            .filter(|r| r.id != region_id && r.handle.is_neighbour_of(&own.handle))
            .map(|r| NeighborDescriptor {
                region: r.clone(),
                // The in-memory directory tracks registration, not
                // liveness; absent means "assume online".
                online: None,
            })
            .collect();
        Ok(neighbours)
    }

    async fn get_region_by_handle(
        &self,
        handle: RegionHandle,
    ) -> Result<Option<RegionDescriptor>, RegionError> {
        let regions = self.regions.read().await;
        Ok(regions.get(&handle).cloned())
    }
}

/// Convenience constructor used by hosts and tests.
pub fn descriptor(name: &str, handle: RegionHandle, endpoint: &str) -> RegionDescriptor {
    RegionDescriptor {
        id: Uuid::new_v4(),
        name: name.to_string(),
        handle,
        endpoint: endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_directory_returns_adjacent_regions_only() {
        let directory = InMemoryGridDirectory::new();
        let own = descriptor("own", RegionHandle::from_cells(10, 10), "http://sim-a");
        let own_id = own.id;
        directory.register_region(own).await;
        directory
            .register_region(descriptor(
                "east",
                RegionHandle::from_cells(11, 10),
                "http://sim-b",
            ))
            .await;
        directory
            .register_region(descriptor(
                "far",
                RegionHandle::from_cells(14, 10),
                "http://sim-c",
            ))
            .await;

        let neighbours = directory.get_neighbours(own_id).await.unwrap();
        assert_eq!(neighbours.len(), 1);
        assert_eq!(neighbours[0].region.name, "east");
        assert!(neighbours[0].is_online());
    }

    #[tokio::test]
    async fn test_unknown_handle_resolves_to_absent() {
        let directory = InMemoryGridDirectory::new();
        let resolved = directory
            .get_region_by_handle(RegionHandle::from_cells(1, 1))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
