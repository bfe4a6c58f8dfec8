// Runtime capability registry
//
// Modules register the capability interfaces they implement at region
// start-up; everything else discovers them here instead of through static
// linkage.

// Public API - what other modules can use
pub use capability::{
    AgentStateFormat, AgentStateModule, EntityCode, EntityCreator, RegionModule,
};
pub use registry::ModuleRegistry;

// Internal modules
mod capability;
mod registry;
