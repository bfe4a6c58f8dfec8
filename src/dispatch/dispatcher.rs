use std::sync::Arc;

use tracing::{instrument, warn};
use uuid::Uuid;

use super::inventory::{
    DescendantFetchConfig, DescendantFetcher, InventoryService, PendingDescendantRequest,
};
use crate::region::{ClientView, Scene};
use crate::shared::RegionError;

/// Consumes client-originated requests arriving off the network layer,
/// resolves them against scene state, and publishes the resulting domain
/// events onto the bus.
///
/// Chat and touch dispatch run synchronously on the calling thread (they
/// end in bus triggers); inventory browsing is serialized onto the
/// region's single descendants worker, and folder purges are offloaded
/// fire-and-forget, so neither can preempt the simulation frame.
pub struct RequestDispatcher {
    pub(super) scene: Arc<Scene>,
    inventory: Arc<dyn InventoryService>,
    descendants: Arc<DescendantFetcher>,
}

impl RequestDispatcher {
    pub fn new(
        scene: Arc<Scene>,
        inventory: Arc<dyn InventoryService>,
        config: DescendantFetchConfig,
    ) -> Self {
        let descendants = DescendantFetcher::new(Arc::clone(&inventory), config);
        Self {
            scene,
            inventory,
            descendants,
        }
    }

    /// Builds a dispatcher with the inventory backend resolved through the
    /// region's module registry.
    pub fn from_registry(
        scene: Arc<Scene>,
        config: DescendantFetchConfig,
    ) -> Result<Self, RegionError> {
        let inventory = scene
            .ctx()
            .modules
            .get::<dyn InventoryService>()
            .ok_or_else(|| RegionError::NotFound("inventory service capability".to_string()))?;
        Ok(Self::new(scene, inventory, config))
    }

    /// Queues an inventory browse request for the single background
    /// worker. Returns immediately; results reach the client through its
    /// `ClientView` handle.
    pub fn queue_descendants_request(
        &self,
        client: Arc<dyn ClientView>,
        folder_id: Uuid,
        fetch_folders: bool,
        fetch_items: bool,
    ) {
        self.descendants.enqueue(PendingDescendantRequest {
            client,
            folder_id,
            fetch_folders,
            fetch_items,
        });
    }

    /// Deletes a folder's contents as a fire-and-forget task; the caller
    /// is never blocked on the purge completing.
    #[instrument(skip(self))]
    pub fn purge_folder(&self, folder_id: Uuid) {
        let inventory = Arc::clone(&self.inventory);
        tokio::spawn(async move {
            if let Err(e) = inventory.purge_folder(folder_id).await {
                warn!(folder_id = %folder_id, error = %e, "Folder purge failed");
            }
        });
    }

    /// The descendants queue, exposed for diagnostics and tests.
    pub fn descendants(&self) -> &Arc<DescendantFetcher> {
        &self.descendants
    }
}
