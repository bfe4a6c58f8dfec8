use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::region::ClientView;
use crate::shared::RegionError;

/// One inventory folder, as listed to a browsing client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryFolder {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
}

/// One inventory item, as listed to a browsing client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub folder_id: Uuid,
    pub name: String,
}

/// Result of a descendants fetch for one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderContents {
    pub folder_id: Uuid,
    pub folders: Vec<InventoryFolder>,
    pub items: Vec<InventoryItem>,
}

/// Inventory backend capability. Registered into the module registry at
/// region start-up and resolved by the request dispatcher.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn fetch_descendants(
        &self,
        folder_id: Uuid,
        fetch_folders: bool,
        fetch_items: bool,
    ) -> Result<FolderContents, RegionError>;

    async fn purge_folder(&self, folder_id: Uuid) -> Result<(), RegionError>;
}

/// A client's request to browse one inventory folder. Queued, consumed
/// exactly once by the background worker, then discarded.
pub struct PendingDescendantRequest {
    pub client: Arc<dyn ClientView>,
    pub folder_id: Uuid,
    pub fetch_folders: bool,
    pub fetch_items: bool,
}

/// Configuration for the descendants fetch worker.
#[derive(Debug, Clone)]
pub struct DescendantFetchConfig {
    /// Pause between served requests. Caps the rate at which one client
    /// (or a client flood) can consume the region's inventory capacity.
    pub drain_delay: Duration,
}

impl Default for DescendantFetchConfig {
    fn default() -> Self {
        Self {
            drain_delay: Duration::from_millis(20),
        }
    }
}

/// Serializes bursty inventory browsing onto a single background worker so
/// it cannot starve the real-time loop.
///
/// Multi-producer/single-consumer: `enqueue` is callable from any thread;
/// the worker drains strictly FIFO with a rate-limiting sleep between
/// items. The worker-start decision is an atomic test-and-set, so at most
/// one worker is ever active per region and starting a second is a no-op.
pub struct DescendantFetcher {
    inventory: Arc<dyn InventoryService>,
    config: DescendantFetchConfig,
    queue: Mutex<VecDeque<PendingDescendantRequest>>,
    worker_active: AtomicBool,
}

impl DescendantFetcher {
    pub fn new(inventory: Arc<dyn InventoryService>, config: DescendantFetchConfig) -> Arc<Self> {
        Arc::new(Self {
            inventory,
            config,
            queue: Mutex::new(VecDeque::new()),
            worker_active: AtomicBool::new(false),
        })
    }

    /// Queues a browse request and ensures the worker is running.
    pub fn enqueue(self: &Arc<Self>, request: PendingDescendantRequest) {
        {
            let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
            queue.push_back(request);
        }
        self.try_start_worker();
    }

    /// Number of requests waiting to be served (diagnostics and tests).
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Whether the background worker is currently active.
    pub fn worker_active(&self) -> bool {
        self.worker_active.load(Ordering::Acquire)
    }

    fn try_start_worker(self: &Arc<Self>) {
        let claimed = self
            .worker_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            return;
        }

        debug!("Starting inventory descendants worker");
        let fetcher = Arc::clone(self);
        tokio::spawn(async move {
            fetcher.drain().await;
        });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
                queue.pop_front()
            };

            match next {
                Some(request) => {
                    self.serve(request).await;
                    sleep(self.config.drain_delay).await;
                }
                None => {
                    self.worker_active.store(false, Ordering::Release);
                    // A producer may have enqueued between the empty pop
                    // and the flag clearing above; reclaim the flag and
                    // keep draining in that case so the item is not
                    // stranded until the next enqueue.
                    let refilled =
                        !self.queue.lock().unwrap_or_else(|p| p.into_inner()).is_empty();
                    if refilled
                        && self
                            .worker_active
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok()
                    {
                        continue;
                    }
                    debug!("Inventory descendants worker idle - stopping");
                    break;
                }
            }
        }
    }

    async fn serve(&self, request: PendingDescendantRequest) {
        match self
            .inventory
            .fetch_descendants(request.folder_id, request.fetch_folders, request.fetch_items)
            .await
        {
            Ok(contents) => {
                request.client.send_inventory_descendants(&contents).await;
            }
            Err(e) => {
                warn!(
                    agent_id = %request.client.agent_id(),
                    folder_id = %request.folder_id,
                    error = %e,
                    "Descendants fetch failed - dropping request"
                );
            }
        }
    }
}

/// In-process inventory backend for local hosting and tests.
pub struct InMemoryInventoryService {
    folders: tokio::sync::RwLock<HashMap<Uuid, InventoryFolder>>,
    items: tokio::sync::RwLock<HashMap<Uuid, InventoryItem>>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self {
            folders: tokio::sync::RwLock::new(HashMap::new()),
            items: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_folder(&self, parent_id: Option<Uuid>, name: &str) -> Uuid {
        let folder = InventoryFolder {
            id: Uuid::new_v4(),
            parent_id,
            name: name.to_string(),
        };
        let id = folder.id;
        self.folders.write().await.insert(id, folder);
        id
    }

    pub async fn add_item(&self, folder_id: Uuid, name: &str) -> Uuid {
        let item = InventoryItem {
            id: Uuid::new_v4(),
            folder_id,
            name: name.to_string(),
        };
        let id = item.id;
        self.items.write().await.insert(id, item);
        id
    }
}

impl Default for InMemoryInventoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn fetch_descendants(
        &self,
        folder_id: Uuid,
        fetch_folders: bool,
        fetch_items: bool,
    ) -> Result<FolderContents, RegionError> {
        let folders = self.folders.read().await;
        if !folders.contains_key(&folder_id) {
            return Err(RegionError::Inventory(format!(
                "unknown folder {folder_id}"
            )));
        }

        let child_folders = if fetch_folders {
            folders
                .values()
                .filter(|f| f.parent_id == Some(folder_id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let child_items = if fetch_items {
            let items = self.items.read().await;
            items
                .values()
                .filter(|i| i.folder_id == folder_id)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        Ok(FolderContents {
            folder_id,
            folders: child_folders,
            items: child_items,
        })
    }

    async fn purge_folder(&self, folder_id: Uuid) -> Result<(), RegionError> {
        let mut folders = self.folders.write().await;
        if !folders.contains_key(&folder_id) {
            return Err(RegionError::Inventory(format!(
                "unknown folder {folder_id}"
            )));
        }

        folders.retain(|_, f| f.parent_id != Some(folder_id));
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|_, i| i.folder_id != folder_id);

        info!(
            folder_id = %folder_id,
            purged_items = before - items.len(),
            "Purged folder contents"
        );
        Ok(())
    }
}
