use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::capability::{AgentStateFormat, EntityCode, EntityCreator, RegionModule};

type Binding = Box<dyn Any + Send + Sync>;

/// Per-region registry mapping capability traits to implementing modules.
///
/// External subsystems discover each other here at runtime instead of
/// through static linkage. Bindings are keyed by the `TypeId` of the
/// capability trait object and hold a type-erased `Arc<T>`, so both
/// `dyn Trait` capabilities and concrete types register through the same
/// generic API.
///
/// Mutation happens during region start-up and shutdown; steady-state
/// traffic is read-only lookups, so plain `RwLock` maps suffice.
pub struct ModuleRegistry {
    singular: RwLock<HashMap<TypeId, Binding>>,
    stacked: RwLock<HashMap<TypeId, Vec<Binding>>>,
    entity_creators: RwLock<HashMap<EntityCode, Arc<dyn EntityCreator>>>,
    renderable_formats: RwLock<Vec<AgentStateFormat>>,
    acceptable_formats: RwLock<Vec<AgentStateFormat>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            singular: RwLock::new(HashMap::new()),
            stacked: RwLock::new(HashMap::new()),
            entity_creators: RwLock::new(HashMap::new()),
            renderable_formats: RwLock::new(Vec::new()),
            acceptable_formats: RwLock::new(Vec::new()),
        }
    }

    /// Binds a singular capability. A second registration against the same
    /// capability is silently ignored - the first registrant wins.
    pub fn register_singular<T>(&self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut singular = self.singular.write().unwrap_or_else(|p| p.into_inner());
        let key = TypeId::of::<T>();
        if singular.contains_key(&key) {
            debug!(
                capability = std::any::type_name::<T>(),
                "Singular capability already bound - ignoring registration"
            );
            return;
        }
        singular.insert(key, Box::new(instance));
    }

    /// Appends to a stacked capability, unless this exact instance is
    /// already present. Most-recently-added is last in `get_all` order.
    pub fn register_stacked<T>(&self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let mut stacked = self.stacked.write().unwrap_or_else(|p| p.into_inner());
        let bindings = stacked.entry(TypeId::of::<T>()).or_default();
        let already_present = bindings.iter().any(|b| {
            b.downcast_ref::<Arc<T>>()
                .is_some_and(|bound| Arc::ptr_eq(bound, &instance))
        });
        if already_present {
            debug!(
                capability = std::any::type_name::<T>(),
                "Instance already stacked - ignoring registration"
            );
            return;
        }
        bindings.push(Box::new(instance));
    }

    /// Removes one instance from both the singular slot and the stack of a
    /// capability.
    pub fn unregister<T>(&self, instance: &Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();

        {
            let mut singular = self.singular.write().unwrap_or_else(|p| p.into_inner());
            let bound_here = singular.get(&key).is_some_and(|b| {
                b.downcast_ref::<Arc<T>>()
                    .is_some_and(|bound| Arc::ptr_eq(bound, instance))
            });
            if bound_here {
                singular.remove(&key);
            }
        }

        let mut stacked = self.stacked.write().unwrap_or_else(|p| p.into_inner());
        if let Some(bindings) = stacked.get_mut(&key) {
            bindings.retain(|b| {
                !b.downcast_ref::<Arc<T>>()
                    .is_some_and(|bound| Arc::ptr_eq(bound, instance))
            });
        }
    }

    /// Looks up a singular capability. An unpopulated capability yields
    /// `None`, never a panic.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let singular = self.singular.read().unwrap_or_else(|p| p.into_inner());
        singular
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Looks up a stacked capability in registration order; empty when the
    /// capability was never populated.
    pub fn get_all<T>(&self) -> Vec<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let stacked = self.stacked.read().unwrap_or_else(|p| p.into_inner());
        stacked
            .get(&TypeId::of::<T>())
            .map(|bindings| {
                bindings
                    .iter()
                    .filter_map(|b| b.downcast_ref::<Arc<T>>().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Binds the creator for one entity creation code (last registration
    /// wins, mirroring module load order).
    pub fn register_entity_creator(&self, code: EntityCode, creator: Arc<dyn EntityCreator>) {
        let mut creators = self
            .entity_creators
            .write()
            .unwrap_or_else(|p| p.into_inner());
        creators.insert(code, creator);
    }

    pub fn entity_creator(&self, code: EntityCode) -> Option<Arc<dyn EntityCreator>> {
        let creators = self
            .entity_creators
            .read()
            .unwrap_or_else(|p| p.into_inner());
        creators.get(&code).cloned()
    }

    /// Installs a region module: logs it and, when the module declares the
    /// stateful-agent-data capability, folds its formats into the two
    /// process-wide handoff negotiation indexes. Interface bindings are
    /// still registered explicitly by the caller via
    /// `register_singular`/`register_stacked`.
    pub fn install(&self, module: &Arc<dyn RegionModule>) {
        info!(module = module.name(), "Installing region module");

        if let Some(agent_state) = module.as_agent_state() {
            let mut renderable = self
                .renderable_formats
                .write()
                .unwrap_or_else(|p| p.into_inner());
            for format in agent_state.renderable_formats() {
                if !renderable.contains(&format) {
                    renderable.push(format);
                }
            }

            let mut acceptable = self
                .acceptable_formats
                .write()
                .unwrap_or_else(|p| p.into_inner());
            for format in agent_state.acceptable_formats() {
                if !acceptable.contains(&format) {
                    acceptable.push(format);
                }
            }
        }
    }

    /// Agent-state formats this region can render for outgoing handoffs.
    pub fn renderable_formats(&self) -> Vec<AgentStateFormat> {
        self.renderable_formats
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Agent-state formats this region accepts from incoming handoffs.
    pub fn acceptable_formats(&self) -> Vec<AgentStateFormat> {
        self.acceptable_formats
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
