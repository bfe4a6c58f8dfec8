use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use simregion::coordinator::{
    descriptor, AgentStateUpdate, InMemoryGridDirectory, RegionCoordinator, RegionDescriptor,
    SimulationTransport,
};
use simregion::dispatch::{DescendantFetchConfig, InMemoryInventoryService, InventoryService};
use simregion::module::{AgentStateFormat, AgentStateModule, RegionModule};
use simregion::region::{start_heartbeat, HeartbeatConfig, RegionContext, Scene};
use simregion::shared::{RegionError, RegionHandle};
use simregion::RequestDispatcher;

/// Sample module carrying avatar appearance across region boundaries.
struct AppearanceModule;

impl RegionModule for AppearanceModule {
    fn name(&self) -> &'static str {
        "AppearanceModule"
    }

    fn as_agent_state(&self) -> Option<&dyn AgentStateModule> {
        Some(self)
    }
}

impl AgentStateModule for AppearanceModule {
    fn renderable_formats(&self) -> Vec<AgentStateFormat> {
        vec![AgentStateFormat::new("appearance/v2")]
    }

    fn acceptable_formats(&self) -> Vec<AgentStateFormat> {
        vec![
            AgentStateFormat::new("appearance/v2"),
            AgentStateFormat::new("appearance/v1"),
        ]
    }
}

/// Transport that resolves destinations through the local directory and
/// logs instead of crossing process boundaries. Stands in for the real
/// simulation transport when every region lives in this process.
struct LoopbackTransport {
    directory: Arc<InMemoryGridDirectory>,
}

#[async_trait]
impl SimulationTransport for LoopbackTransport {
    async fn hello_neighbour(
        &self,
        handle: RegionHandle,
        self_descriptor: &RegionDescriptor,
    ) -> Result<RegionDescriptor, RegionError> {
        use simregion::coordinator::GridDirectory;
        let neighbour = self
            .directory
            .get_region_by_handle(handle)
            .await?
            .ok_or_else(|| RegionError::Transport(format!("no region at {handle}")))?;
        info!(
            from = %self_descriptor.name,
            to = %neighbour.name,
            "Loopback hello"
        );
        Ok(neighbour)
    }

    async fn update_agent(
        &self,
        destination: &RegionDescriptor,
        update: &AgentStateUpdate,
    ) -> Result<(), RegionError> {
        info!(
            destination = %destination.name,
            agent_id = %update.agent_id,
            "Loopback agent state update"
        );
        Ok(())
    }

    async fn close_agent(
        &self,
        destination: &RegionDescriptor,
        agent_id: Uuid,
        _auth_token: &str,
    ) -> Result<(), RegionError> {
        info!(
            destination = %destination.name,
            agent_id = %agent_id,
            "Loopback close agent"
        );
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simregion=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting region host");

    let ctx = RegionContext::new(
        "Sandbox Island",
        RegionHandle::from_cells(1000, 1000),
        "http://localhost:9000",
    );
    info!(
        descriptor = %serde_json::to_string(&ctx.descriptor()).unwrap(),
        "Hosting region"
    );

    // Local directory with one neighbouring region registered so the
    // announcement has someone to greet.
    let directory = Arc::new(InMemoryGridDirectory::new());
    directory.register_region(ctx.descriptor()).await;
    directory
        .register_region(descriptor(
            "East Sandbox",
            RegionHandle::from_cells(1001, 1000),
            "http://localhost:9001",
        ))
        .await;

    // Region modules: the inventory backend registers as a capability and
    // the dispatcher resolves it through the registry.
    let inventory: Arc<dyn InventoryService> = Arc::new(InMemoryInventoryService::new());
    ctx.modules
        .register_singular::<dyn InventoryService>(inventory);
    let appearance: Arc<dyn RegionModule> = Arc::new(AppearanceModule);
    ctx.modules.install(&appearance);

    let scene = Scene::new(Arc::clone(&ctx));
    let dispatcher = RequestDispatcher::from_registry(
        Arc::clone(&scene),
        DescendantFetchConfig::default(),
    )
    .expect("inventory capability registered above");

    // Log every ~9 seconds of simulated frames.
    ctx.events.on_frame.subscribe("frame_logger", |tick| {
        if tick.frame % 100 == 0 {
            info!(frame = tick.frame, uptime_secs = tick.uptime.as_secs(), "Frame");
        }
    });

    let transport = Arc::new(LoopbackTransport {
        directory: Arc::clone(&directory),
    });
    let coordinator = RegionCoordinator::new(Arc::clone(&ctx), directory, transport);
    coordinator.spawn_announce();

    let heartbeat = start_heartbeat(Arc::clone(&ctx), HeartbeatConfig::default());
    ctx.events.on_region_ready.trigger(&ctx.descriptor());

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed waiting for shutdown signal");
    }
    info!("Shutting down region host");
    ctx.events.on_shutdown.trigger(&());
    heartbeat.abort();

    // Keep the dispatcher alive for the process lifetime.
    drop(dispatcher);
}
