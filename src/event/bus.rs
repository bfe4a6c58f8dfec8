use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, error};
use uuid::Uuid;

use super::topics::{
    AvatarMovement, ChatArgs, ColliderArgs, FrameTick, GroupMoveArgs, LandBuyArgs, ObjectArgs,
    PresenceArgs, RezScriptArgs, ScriptTarget, TeleportArgs, TouchArgs,
};
use crate::coordinator::RegionDescriptor;

/// Handle identifying one subscription on one topic; returned by
/// `Topic::subscribe` and consumed by `Topic::unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<P, R> {
    id: u64,
    name: &'static str,
    callback: Arc<dyn Fn(&P) -> R + Send + Sync>,
}

impl<P, R> Clone for Subscriber<P, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            callback: Arc::clone(&self.callback),
        }
    }
}

/// An ordered, append-only subscriber list for one event contract.
///
/// Dispatch is synchronous on the calling thread, in registration order.
/// The subscriber list is copy-on-write: mutations build a new list and swap
/// it in, so an in-flight dispatch iterates the consistent snapshot it took
/// when it began, regardless of concurrent subscribe/unsubscribe calls.
///
/// There is no cancellation and no timeout: a slow or hanging subscriber
/// stalls the simulation frame.
pub struct Topic<P> {
    name: &'static str,
    next_id: AtomicU64,
    subscribers: RwLock<Arc<Vec<Subscriber<P, ()>>>>,
}

impl<P> Topic<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Topic name used in logs and fault reports.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends a subscriber; it will be invoked after all existing ones.
    pub fn subscribe<F>(&self, handler_name: &'static str, callback: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            id,
            name: handler_name,
            callback: Arc::new(callback),
        };

        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.as_ref().clone();
        next.push(subscriber);
        *guard = Arc::new(next);

        debug!(topic = self.name, handler = handler_name, "Subscribed");
        SubscriptionId(id)
    }

    /// Removes one subscription. Returns false if the id was not present
    /// (already removed, or from another topic).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = guard.len();
        let next: Vec<_> = guard
            .iter()
            .filter(|s| s.id != id.0)
            .cloned()
            .collect();
        let removed = next.len() < before;
        *guard = Arc::new(next);
        removed
    }

    /// Invokes every subscriber in registration order on the calling thread.
    ///
    /// Each subscriber runs inside its own isolation boundary: a panic is
    /// logged with the failing handler's identity and dispatch continues
    /// with the next subscriber. Nothing propagates back to the publisher.
    pub fn trigger(&self, payload: &P) {
        let snapshot = self.snapshot();
        for subscriber in snapshot.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(payload)));
            if let Err(panic) = result {
                error!(
                    topic = self.name,
                    handler = subscriber.name,
                    reason = panic_message(&panic),
                    "Event subscriber panicked - continuing dispatch"
                );
            }
        }
    }

    /// Number of live subscriptions (diagnostics and tests).
    pub fn subscriber_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<Vec<Subscriber<P, ()>>> {
        let guard = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }
}

/// A topic whose subscribers vote on a yes/no question.
///
/// `query` aggregates responses with logical AND; with no subscribers the
/// answer defaults to "allowed". Used for permission-style checks such as
/// group-move authorization and land-buy validation.
pub struct VetoTopic<P> {
    name: &'static str,
    next_id: AtomicU64,
    subscribers: RwLock<Arc<Vec<Subscriber<P, bool>>>>,
}

impl<P> VetoTopic<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&self, handler_name: &'static str, callback: F) -> SubscriptionId
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            id,
            name: handler_name,
            callback: Arc::new(callback),
        };

        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = guard.as_ref().clone();
        next.push(subscriber);
        *guard = Arc::new(next);

        debug!(topic = self.name, handler = handler_name, "Subscribed");
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut guard = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = guard.len();
        let next: Vec<_> = guard
            .iter()
            .filter(|s| s.id != id.0)
            .cloned()
            .collect();
        let removed = next.len() < before;
        *guard = Arc::new(next);
        removed
    }

    /// Asks every subscriber in registration order; the result is the
    /// logical AND of all responses, true when none are registered.
    ///
    /// A panicking subscriber is logged and excluded from the aggregate;
    /// all remaining subscribers are still asked.
    pub fn query(&self, payload: &P) -> bool {
        let snapshot = {
            let guard = self
                .subscribers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&guard)
        };

        let mut allowed = true;
        for subscriber in snapshot.iter() {
            match catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(payload))) {
                Ok(vote) => allowed = allowed && vote,
                Err(panic) => {
                    error!(
                        topic = self.name,
                        handler = subscriber.name,
                        reason = panic_message(&panic),
                        "Veto subscriber panicked - excluded from aggregate"
                    );
                }
            }
        }
        allowed
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// The scene-wide event bus: one typed topic per event contract.
///
/// Every subsystem (physics, scripting host, persistence, network
/// transport) publishes and subscribes through these topics without
/// compile-time coupling to each other. The bus hangs off the region
/// context, never off global state, so multiple regions in one process
/// stay isolated.
///
/// Callers invoking presence add/remove and client-closed topics do so
/// under their per-agent lock; handlers on those topics must avoid
/// long-running work.
pub struct EventBus {
    // Frame loop
    pub on_frame: Topic<FrameTick>,

    // Avatar lifecycle and movement
    pub on_new_presence: Topic<PresenceArgs>,
    pub on_remove_presence: Topic<Uuid>,
    pub on_client_closed: Topic<Uuid>,
    pub on_avatar_moved: Topic<AvatarMovement>,

    // Script lifecycle
    pub on_rez_script: Topic<RezScriptArgs>,
    pub on_start_script: Topic<ScriptTarget>,
    pub on_stop_script: Topic<ScriptTarget>,
    pub on_script_reset: Topic<ScriptTarget>,
    pub on_remove_script: Topic<ScriptTarget>,

    // Scene objects and land
    pub on_object_added: Topic<ObjectArgs>,
    pub on_object_removed: Topic<ObjectArgs>,
    pub on_parcel_prim_count_tainted: Topic<()>,
    pub validate_land_buy: VetoTopic<LandBuyArgs>,
    pub on_land_buy: Topic<LandBuyArgs>,
    pub allow_group_move: VetoTopic<GroupMoveArgs>,

    // Chat
    pub on_chat_from_world: Topic<ChatArgs>,
    pub on_chat_broadcast: Topic<ChatArgs>,
    pub on_chat_from_client: Topic<ChatArgs>,

    // Teleport
    pub on_teleport_start: Topic<TeleportArgs>,
    pub on_teleport_fail: Topic<Uuid>,

    // Region lifecycle
    pub on_region_up: Topic<RegionDescriptor>,
    pub on_region_ready: Topic<RegionDescriptor>,
    pub on_shutdown: Topic<()>,

    // Object-object collisions (transition computed by the physics caller)
    pub on_collision_start: Topic<ColliderArgs>,
    pub on_collision_continuing: Topic<ColliderArgs>,
    pub on_collision_end: Topic<ColliderArgs>,

    // Object-terrain collisions
    pub on_ground_collision_start: Topic<ColliderArgs>,
    pub on_ground_collision_continuing: Topic<ColliderArgs>,
    pub on_ground_collision_end: Topic<ColliderArgs>,

    // Touch (delivery targets resolved by the request dispatcher)
    pub on_touch_start: Topic<TouchArgs>,
    pub on_touch_continue: Topic<TouchArgs>,
    pub on_touch_end: Topic<TouchArgs>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            on_frame: Topic::new("frame"),
            on_new_presence: Topic::new("new_presence"),
            on_remove_presence: Topic::new("remove_presence"),
            on_client_closed: Topic::new("client_closed"),
            on_avatar_moved: Topic::new("avatar_moved"),
            on_rez_script: Topic::new("rez_script"),
            on_start_script: Topic::new("start_script"),
            on_stop_script: Topic::new("stop_script"),
            on_script_reset: Topic::new("script_reset"),
            on_remove_script: Topic::new("remove_script"),
            on_object_added: Topic::new("object_added"),
            on_object_removed: Topic::new("object_removed"),
            on_parcel_prim_count_tainted: Topic::new("parcel_prim_count_tainted"),
            validate_land_buy: VetoTopic::new("validate_land_buy"),
            on_land_buy: Topic::new("land_buy"),
            allow_group_move: VetoTopic::new("allow_group_move"),
            on_chat_from_world: Topic::new("chat_from_world"),
            on_chat_broadcast: Topic::new("chat_broadcast"),
            on_chat_from_client: Topic::new("chat_from_client"),
            on_teleport_start: Topic::new("teleport_start"),
            on_teleport_fail: Topic::new("teleport_fail"),
            on_region_up: Topic::new("region_up"),
            on_region_ready: Topic::new("region_ready"),
            on_shutdown: Topic::new("shutdown"),
            on_collision_start: Topic::new("collision_start"),
            on_collision_continuing: Topic::new("collision_continuing"),
            on_collision_end: Topic::new("collision_end"),
            on_ground_collision_start: Topic::new("ground_collision_start"),
            on_ground_collision_continuing: Topic::new("ground_collision_continuing"),
            on_ground_collision_end: Topic::new("ground_collision_end"),
            on_touch_start: Topic::new("touch_start"),
            on_touch_continue: Topic::new("touch_continue"),
            on_touch_end: Topic::new("touch_end"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn test_trigger_runs_subscribers_in_registration_order() {
        let topic: Topic<u32> = Topic::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            topic.subscribe(tag, move |_| order.lock().unwrap().push(tag));
        }

        topic.trigger(&7);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_dispatch() {
        let topic: Topic<u32> = Topic::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let before = Arc::clone(&calls);
        topic.subscribe("before", move |_| {
            before.fetch_add(1, Ordering::SeqCst);
        });
        topic.subscribe("faulty", |_| panic!("handler bug"));
        let after = Arc::clone(&calls);
        topic.subscribe("after", move |_| {
            after.fetch_add(1, Ordering::SeqCst);
        });

        // Must not panic outward.
        topic.trigger(&1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_removes_only_target() {
        let topic: Topic<u32> = Topic::new("test");
        let calls = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&calls);
        let keep = topic.subscribe("keep", move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = Arc::clone(&calls);
        let drop_me = topic.subscribe("drop", move |_| {
            b.fetch_add(10, Ordering::SeqCst);
        });

        assert!(topic.unsubscribe(drop_me));
        assert!(!topic.unsubscribe(drop_me));
        topic.trigger(&0);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(topic.subscriber_count(), 1);
        let _ = keep;
    }

    #[test]
    fn test_subscribe_during_dispatch_affects_next_trigger_only() {
        let topic: Arc<Topic<u32>> = Arc::new(Topic::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_topic = Arc::clone(&topic);
        let inner_calls = Arc::clone(&calls);
        topic.subscribe("registrar", move |_| {
            let late_calls = Arc::clone(&inner_calls);
            inner_topic.subscribe("late", move |_| {
                late_calls.fetch_add(1, Ordering::SeqCst);
            });
        });

        // The snapshot taken at dispatch start does not include "late".
        topic.trigger(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        topic.trigger(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_veto_aggregate_is_logical_and() {
        let topic: VetoTopic<u32> = VetoTopic::new("test");
        topic.subscribe("yes_1", |_| true);
        topic.subscribe("no", |_| false);
        topic.subscribe("yes_2", |_| true);

        assert!(!topic.query(&0));
    }

    #[test]
    fn test_veto_defaults_to_allowed_without_subscribers() {
        let topic: VetoTopic<u32> = VetoTopic::new("test");
        assert!(topic.query(&0));
    }

    #[test]
    fn test_veto_panicking_subscriber_excluded_from_aggregate() {
        let topic: VetoTopic<u32> = VetoTopic::new("test");
        topic.subscribe("faulty", |_| panic!("veto bug"));
        topic.subscribe("yes", |_| true);

        assert!(topic.query(&0));
    }
}
