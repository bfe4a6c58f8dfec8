// Library crate for the region simulation core
// This file exposes the public API for integration tests

pub mod coordinator;
pub mod dispatch;
pub mod event;
pub mod module;
pub mod region;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use coordinator::{
    AgentStateUpdate, GridDirectory, InMemoryGridDirectory, NeighborDescriptor, RegionCoordinator,
    RegionDescriptor, SimulationTransport,
};
pub use dispatch::{
    ChatRequest, DescendantFetchConfig, InMemoryInventoryService, InventoryService,
    RequestDispatcher,
};
pub use event::{EventBus, SubscriptionId, Topic, VetoTopic};
pub use module::{ModuleRegistry, RegionModule};
pub use region::{ClientView, RegionContext, Scene, SceneObjectPart, ScenePresence};
pub use shared::{RegionError, RegionHandle, Vector3};
