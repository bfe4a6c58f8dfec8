// Cross-region coordination
//
// Talks to the grid directory and the simulation transport to keep
// neighbouring regions informed: region liveness, live avatar state for
// child presences, and child-agent teardown. Everything here is
// best-effort and fire-and-forget from the caller's perspective.

// Public API - what other modules can use
pub use directory::{
    descriptor, AgentStateUpdate, GridDirectory, InMemoryGridDirectory, NeighborDescriptor,
    RegionDescriptor, SimulationTransport,
};
pub use service::RegionCoordinator;

// Internal modules
mod directory;
mod service;
