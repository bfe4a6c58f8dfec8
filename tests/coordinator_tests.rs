use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use simregion::coordinator::{
    descriptor, AgentStateUpdate, InMemoryGridDirectory, RegionCoordinator, RegionDescriptor,
    SimulationTransport,
};
use simregion::region::{ClientView, RegionContext, Scene};
use simregion::shared::{RegionError, RegionHandle, Vector3};

/// Transport double that records every call and fails on request.
struct RecordingTransport {
    fail_hello_handles: HashSet<RegionHandle>,
    fail_close_endpoints: HashSet<String>,
    hellos: Mutex<Vec<RegionHandle>>,
    closes: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, Uuid)>>,
}

impl RecordingTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_hello_handles: HashSet::new(),
            fail_close_endpoints: HashSet::new(),
            hellos: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }

    fn failing_hello(handles: impl IntoIterator<Item = RegionHandle>) -> Arc<Self> {
        Arc::new(Self {
            fail_hello_handles: handles.into_iter().collect(),
            fail_close_endpoints: HashSet::new(),
            hellos: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SimulationTransport for RecordingTransport {
    async fn hello_neighbour(
        &self,
        handle: RegionHandle,
        _self_descriptor: &RegionDescriptor,
    ) -> Result<RegionDescriptor, RegionError> {
        self.hellos.lock().unwrap().push(handle);
        if self.fail_hello_handles.contains(&handle) {
            return Err(RegionError::Transport("connection refused".to_string()));
        }
        Ok(descriptor("ack", handle, "http://acked"))
    }

    async fn update_agent(
        &self,
        destination: &RegionDescriptor,
        update: &AgentStateUpdate,
    ) -> Result<(), RegionError> {
        self.updates
            .lock()
            .unwrap()
            .push((destination.endpoint.clone(), update.agent_id));
        Ok(())
    }

    async fn close_agent(
        &self,
        destination: &RegionDescriptor,
        _agent_id: Uuid,
        _auth_token: &str,
    ) -> Result<(), RegionError> {
        self.closes.lock().unwrap().push(destination.endpoint.clone());
        if self.fail_close_endpoints.contains(&destination.endpoint) {
            return Err(RegionError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

struct NullClient(Uuid);

#[async_trait]
impl ClientView for NullClient {
    fn agent_id(&self) -> Uuid {
        self.0
    }

    async fn send_inventory_descendants(&self, _contents: &simregion::dispatch::FolderContents) {}
}

async fn directory_with(
    own: &RegionDescriptor,
    others: &[RegionDescriptor],
) -> Arc<InMemoryGridDirectory> {
    let directory = Arc::new(InMemoryGridDirectory::new());
    directory.register_region(own.clone()).await;
    for other in others {
        directory.register_region(other.clone()).await;
    }
    directory
}

#[tokio::test]
async fn test_region_up_fires_only_for_reachable_neighbours() {
    let ctx = RegionContext::new("own", RegionHandle::from_cells(10, 10), "http://sim-own");
    let n1 = descriptor("n1", RegionHandle::from_cells(9, 10), "http://sim-1");
    let n2 = descriptor("n2", RegionHandle::from_cells(11, 10), "http://sim-2");
    let n3 = descriptor("n3", RegionHandle::from_cells(10, 11), "http://sim-3");
    let directory = directory_with(&ctx.descriptor(), &[n1, n2.clone(), n3]).await;

    let transport = RecordingTransport::failing_hello([n2.handle]);

    let announced = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&announced);
    ctx.events.on_region_up.subscribe("collector", move |region| {
        seen.lock().unwrap().push(region.handle);
    });

    let coordinator = RegionCoordinator::new(Arc::clone(&ctx), directory, transport.clone());
    coordinator.announce_region_up().await;

    // All three neighbours were attempted...
    assert_eq!(transport.hellos.lock().unwrap().len(), 3);

    // ...but region_up fired only for the two that acknowledged.
    let fired = announced.lock().unwrap().clone();
    assert_eq!(fired.len(), 2);
    assert!(!fired.contains(&n2.handle));
}

#[tokio::test]
async fn test_close_child_agents_contacts_each_endpoint_once() {
    let ctx = RegionContext::new("own", RegionHandle::from_cells(10, 10), "http://sim-own");
    let a = descriptor("a", RegionHandle::from_cells(20, 20), "http://sim-a");
    // b and c are hosted on the same server.
    let b = descriptor("b", RegionHandle::from_cells(21, 20), "http://sim-shared");
    let c = descriptor("c", RegionHandle::from_cells(22, 20), "http://sim-shared");
    let directory = directory_with(&ctx.descriptor(), &[a.clone(), b.clone(), c.clone()]).await;

    let transport = RecordingTransport::new();
    let coordinator = RegionCoordinator::new(ctx, directory, transport.clone());

    let unresolvable = RegionHandle::from_cells(99, 99);
    coordinator
        .close_child_agents(
            Uuid::new_v4(),
            "auth-token".to_string(),
            vec![a.handle, b.handle, c.handle, unresolvable],
        )
        .await;

    let closes = transport.closes.lock().unwrap().clone();
    assert_eq!(closes.len(), 2);
    let endpoints: HashSet<_> = closes.into_iter().collect();
    assert_eq!(
        endpoints,
        HashSet::from(["http://sim-a".to_string(), "http://sim-shared".to_string()])
    );
}

#[tokio::test]
async fn test_close_failure_on_one_endpoint_does_not_stop_others() {
    let ctx = RegionContext::new("own", RegionHandle::from_cells(10, 10), "http://sim-own");
    let a = descriptor("a", RegionHandle::from_cells(20, 20), "http://sim-a");
    let b = descriptor("b", RegionHandle::from_cells(21, 20), "http://sim-b");
    let directory = directory_with(&ctx.descriptor(), &[a.clone(), b.clone()]).await;

    let transport = Arc::new(RecordingTransport {
        fail_hello_handles: HashSet::new(),
        fail_close_endpoints: HashSet::from(["http://sim-a".to_string()]),
        hellos: Mutex::new(Vec::new()),
        closes: Mutex::new(Vec::new()),
        updates: Mutex::new(Vec::new()),
    });
    let coordinator = RegionCoordinator::new(ctx, directory, transport.clone());

    // Must not error outward despite sim-a refusing.
    coordinator
        .close_child_agents(Uuid::new_v4(), "auth".to_string(), vec![a.handle, b.handle])
        .await;

    assert_eq!(transport.closes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_avatar_state_propagates_once_per_distinct_endpoint() {
    let ctx = RegionContext::new("own", RegionHandle::from_cells(10, 10), "http://sim-own");
    let a = descriptor("a", RegionHandle::from_cells(20, 20), "http://sim-a");
    let b = descriptor("b", RegionHandle::from_cells(21, 20), "http://sim-shared");
    let c = descriptor("c", RegionHandle::from_cells(22, 20), "http://sim-shared");
    let directory = directory_with(&ctx.descriptor(), &[a.clone(), b.clone(), c.clone()]).await;

    let transport = RecordingTransport::new();
    let coordinator = RegionCoordinator::new(Arc::clone(&ctx), directory, transport.clone());

    let scene = Scene::new(ctx);
    let agent_id = Uuid::new_v4();
    let presence = scene.add_presence(
        agent_id,
        "alice",
        Vector3::new(128.0, 128.0, 22.0),
        Arc::new(NullClient(agent_id)),
    );
    presence.add_known_region(a.handle);
    presence.add_known_region(b.handle);
    presence.add_known_region(c.handle);
    presence.set_movement(Vector3::new(130.0, 128.0, 22.0), Vector3::new(2.0, 0.0, 0.0));

    coordinator.propagate_avatar_state(&presence).await;

    let updates = transport.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(_, id)| *id == agent_id));
    let endpoints: HashSet<_> = updates.into_iter().map(|(endpoint, _)| endpoint).collect();
    assert_eq!(
        endpoints,
        HashSet::from(["http://sim-a".to_string(), "http://sim-shared".to_string()])
    );
}
