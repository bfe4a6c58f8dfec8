use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

use crate::shared::{RegionError, Vector3};

/// Creation code selecting which entity creator builds a new scene entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum EntityCode {
    Primitive = 9,
    Avatar = 47,
    Grass = 95,
    NewTree = 111,
    ParticleSystem = 143,
    Tree = 255,
}

/// A named state representation a module can produce or consume for a
/// handed-off agent (e.g. an appearance or attachment serialization).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentStateFormat(pub String);

impl AgentStateFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for AgentStateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base trait for everything installable into the module registry.
///
/// Capabilities are declared explicitly through the accessor methods rather
/// than discovered by downcasting: a module that carries stateful agent
/// data overrides `as_agent_state`, everything else inherits the `None`
/// default.
pub trait RegionModule: Send + Sync {
    /// Human-readable module name for logs.
    fn name(&self) -> &'static str;

    /// Present when this module contributes agent-state formats to the
    /// handoff negotiation indexes.
    fn as_agent_state(&self) -> Option<&dyn AgentStateModule> {
        None
    }
}

/// Capability of modules that carry per-agent state across region
/// boundaries. The declared formats feed two process-wide indexes consulted
/// when negotiating a compatible representation for a handed-off agent.
pub trait AgentStateModule: Send + Sync {
    /// Formats this module can render for an outgoing agent.
    fn renderable_formats(&self) -> Vec<AgentStateFormat>;

    /// Formats this module accepts from an incoming handed-off agent.
    fn acceptable_formats(&self) -> Vec<AgentStateFormat>;
}

/// Capability of modules that materialize new scene entities for a
/// creation code.
pub trait EntityCreator: Send + Sync {
    fn create_entity(
        &self,
        owner_id: Uuid,
        code: EntityCode,
        position: Vector3,
    ) -> Result<Uuid, RegionError>;
}
