use std::sync::Arc;

use uuid::Uuid;

use crate::coordinator::RegionDescriptor;
use crate::event::EventBus;
use crate::module::ModuleRegistry;
use crate::shared::RegionHandle;

/// Process-scoped context for one hosted region.
///
/// Owns the event bus and the module registry; every component that needs
/// to publish, subscribe, or look up a capability holds this context rather
/// than reaching for ambient global state, so multiple regions in one
/// process stay isolated and independently testable.
pub struct RegionContext {
    pub id: Uuid,
    pub name: String,
    pub handle: RegionHandle,
    pub endpoint: String,
    pub events: EventBus,
    pub modules: ModuleRegistry,
}

impl RegionContext {
    pub fn new(
        name: impl Into<String>,
        handle: RegionHandle,
        endpoint: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            handle,
            endpoint: endpoint.into(),
            events: EventBus::new(),
            modules: ModuleRegistry::new(),
        })
    }

    /// This region's own directory record, as sent in coordination calls.
    pub fn descriptor(&self) -> RegionDescriptor {
        RegionDescriptor {
            id: self.id,
            name: self.name.clone(),
            handle: self.handle,
            endpoint: self.endpoint.clone(),
        }
    }
}
