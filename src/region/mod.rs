// Region hosting: context, scene state, frame loop
//
// One `RegionContext` per hosted region; the scene holds the minimal state
// the request dispatcher resolves against.

// Public API - what other modules can use
pub use context::RegionContext;
pub use heartbeat::{start_heartbeat, HeartbeatConfig};
pub use scene::{ClientView, Scene, SceneObjectPart, ScenePresence, TouchHandlerFlags};

// Internal modules
mod context;
mod heartbeat;
mod scene;
