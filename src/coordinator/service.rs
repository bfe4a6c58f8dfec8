use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::directory::{
    AgentStateUpdate, GridDirectory, NeighborDescriptor, RegionDescriptor, SimulationTransport,
};
use crate::region::{RegionContext, ScenePresence};
use crate::shared::RegionHandle;

/// Best-effort coordination with neighbouring region processes.
///
/// Every operation here is swallow-and-log: a broken neighbour or an
/// unresolvable handle produces a log entry and the batch continues. The
/// `spawn_*` wrappers run the operation fire-and-forget so the triggering
/// thread (commonly the frame loop or a per-agent lock holder) never
/// blocks on network I/O; the awaitable cores exist for test determinism.
pub struct RegionCoordinator {
    ctx: Arc<RegionContext>,
    directory: Arc<dyn GridDirectory>,
    transport: Arc<dyn SimulationTransport>,
}

impl RegionCoordinator {
    pub fn new(
        ctx: Arc<RegionContext>,
        directory: Arc<dyn GridDirectory>,
        transport: Arc<dyn SimulationTransport>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            directory,
            transport,
        })
    }

    /// Announces this region's liveness to every online geographic
    /// neighbour. Each successful hello publishes the `region_up` topic
    /// with that neighbour's descriptor; failures log and continue.
    #[instrument(skip(self), fields(region = %self.ctx.name))]
    pub async fn announce_region_up(&self) {
        let neighbours = match self.directory.get_neighbours(self.ctx.id).await {
            Ok(neighbours) => neighbours,
            Err(e) => {
                warn!(error = %e, "Neighbour query failed - skipping region-up announcement");
                return;
            }
        };

        let online: Vec<NeighborDescriptor> = neighbours
            .into_iter()
            .filter(|n| n.is_online())
            .collect();
        info!(neighbour_count = online.len(), "Announcing region up");

        join_all(online.into_iter().map(|n| self.hello_one(n))).await;
    }

    /// Fire-and-forget variant of `announce_region_up`.
    pub fn spawn_announce(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.announce_region_up().await;
        });
    }

    async fn hello_one(&self, neighbour: NeighborDescriptor) {
        let self_descriptor = self.ctx.descriptor();
        match self
            .transport
            .hello_neighbour(neighbour.region.handle, &self_descriptor)
            .await
        {
            Ok(acked) => {
                info!(
                    neighbour = %acked.name,
                    endpoint = %acked.endpoint,
                    "Neighbour acknowledged region up"
                );
                self.ctx.events.on_region_up.trigger(&acked);
            }
            Err(e) => {
                warn!(
                    neighbour = %neighbour.region.name,
                    endpoint = %neighbour.region.endpoint,
                    error = %e,
                    "Neighbour hello failed - continuing with remaining neighbours"
                );
            }
        }
    }

    /// Closes a departed avatar's child presences on the regions named by
    /// `handles`. Handles that fail to resolve are skipped; close calls go
    /// out once per distinct server endpoint, best-effort, no retries.
    #[instrument(skip(self, auth_token), fields(region = %self.ctx.name))]
    pub async fn close_child_agents(
        &self,
        agent_id: Uuid,
        auth_token: String,
        handles: Vec<RegionHandle>,
    ) {
        let destinations = self.resolve_distinct(handles).await;
        debug!(
            agent_id = %agent_id,
            destination_count = destinations.len(),
            "Closing child agents"
        );

        join_all(destinations.iter().map(|destination| async {
            if let Err(e) = self
                .transport
                .close_agent(destination, agent_id, &auth_token)
                .await
            {
                warn!(
                    agent_id = %agent_id,
                    endpoint = %destination.endpoint,
                    error = %e,
                    "Close-agent call failed - continuing with remaining endpoints"
                );
            }
        }))
        .await;
    }

    /// Fire-and-forget variant of `close_child_agents`; never blocks the
    /// thread that detected the avatar's departure.
    pub fn spawn_close_child_agents(
        self: &Arc<Self>,
        agent_id: Uuid,
        auth_token: String,
        handles: Vec<RegionHandle>,
    ) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator
                .close_child_agents(agent_id, auth_token, handles)
                .await;
        });
    }

    /// Relays a moving avatar's live state to every region it has a
    /// presence in, one update per distinct server endpoint.
    ///
    /// When the avatar's known-region set is concurrently being mutated
    /// the operation silently stops: the snapshot is already stale and not
    /// worth retrying.
    #[instrument(skip(self, presence), fields(region = %self.ctx.name, agent_id = %presence.agent_id))]
    pub async fn propagate_avatar_state(&self, presence: &ScenePresence) {
        let Some(handles) = presence.try_known_regions() else {
            debug!("Known-region set busy - skipping state propagation");
            return;
        };

        let (position, velocity) = presence.movement();
        let update = AgentStateUpdate {
            agent_id: presence.agent_id,
            position,
            velocity,
            renderable_formats: self.ctx.modules.renderable_formats(),
        };

        let destinations = self.resolve_distinct(handles).await;
        join_all(destinations.iter().map(|destination| async {
            if let Err(e) = self.transport.update_agent(destination, &update).await {
                warn!(
                    endpoint = %destination.endpoint,
                    error = %e,
                    "Agent state update failed - continuing with remaining endpoints"
                );
            }
        }))
        .await;
    }

    /// Fire-and-forget variant of `propagate_avatar_state`.
    pub fn spawn_propagate_avatar_state(self: &Arc<Self>, presence: Arc<ScenePresence>) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            coordinator.propagate_avatar_state(&presence).await;
        });
    }

    /// Resolves region handles through the directory, deduplicating by
    /// hosting endpoint: a neighbour server is contacted at most once per
    /// coordination call even when several handles resolve to it.
    async fn resolve_distinct(&self, handles: Vec<RegionHandle>) -> Vec<RegionDescriptor> {
        let mut seen_endpoints = HashSet::new();
        let mut destinations = Vec::new();

        for handle in handles {
            match self.directory.get_region_by_handle(handle).await {
                Ok(Some(region)) => {
                    if seen_endpoints.insert(region.endpoint.clone()) {
                        destinations.push(region);
                    }
                }
                Ok(None) => {
                    debug!(handle = %handle, "Region handle did not resolve - skipping");
                }
                Err(e) => {
                    warn!(handle = %handle, error = %e, "Directory lookup failed - skipping");
                }
            }
        }
        destinations
    }
}
