use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use simregion::event::{ChatArgs, ChatSource, LandBuyArgs};
use simregion::shared::{RegionHandle, Vector3};
use simregion::RegionContext;

fn chat_args() -> ChatArgs {
    ChatArgs {
        sender_id: Uuid::new_v4(),
        sender_name: "alice".to_string(),
        source: ChatSource::Agent,
        channel: 0,
        message: "hello".to_string(),
        position: Vector3::default(),
        target_id: None,
        sent_at: Utc::now(),
    }
}

fn land_buy_args() -> LandBuyArgs {
    LandBuyArgs {
        agent_id: Uuid::new_v4(),
        parcel_local_id: 4,
        price: 100,
        area: 512,
        authenticated: true,
    }
}

#[test]
fn test_faulting_subscriber_is_isolated_and_order_preserved() {
    let ctx = RegionContext::new("test", RegionHandle::from_cells(1, 1), "http://sim");
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    ctx.events.on_chat_from_world.subscribe("h1", move |_| {
        first.lock().unwrap().push("h1");
    });
    let second = Arc::clone(&order);
    ctx.events.on_chat_from_world.subscribe("h2", move |_| {
        second.lock().unwrap().push("h2");
        panic!("h2 is broken");
    });
    let third = Arc::clone(&order);
    ctx.events.on_chat_from_world.subscribe("h3", move |_| {
        third.lock().unwrap().push("h3");
    });

    // The trigger itself must not panic.
    ctx.events.on_chat_from_world.trigger(&chat_args());

    assert_eq!(*order.lock().unwrap(), vec!["h1", "h2", "h3"]);
}

#[test]
fn test_vetoing_topic_aggregates_with_logical_and() {
    let ctx = RegionContext::new("test", RegionHandle::from_cells(1, 1), "http://sim");

    ctx.events.validate_land_buy.subscribe("approve_1", |_| true);
    ctx.events.validate_land_buy.subscribe("deny", |_| false);
    ctx.events.validate_land_buy.subscribe("approve_2", |_| true);

    assert!(!ctx.events.validate_land_buy.query(&land_buy_args()));
}

#[test]
fn test_vetoing_topic_without_subscribers_allows() {
    let ctx = RegionContext::new("test", RegionHandle::from_cells(1, 1), "http://sim");
    assert!(ctx.events.validate_land_buy.query(&land_buy_args()));
    assert!(ctx.events.allow_group_move.query(&simregion::event::GroupMoveArgs {
        group_root_local_id: 1,
        mover_id: Uuid::new_v4(),
    }));
}

#[test]
fn test_concurrent_triggers_and_subscriptions_do_not_interfere() {
    let ctx = RegionContext::new("test", RegionHandle::from_cells(1, 1), "http://sim");
    let calls = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&calls);
    ctx.events.on_parcel_prim_count_tainted.subscribe("counter", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                for _ in 0..250 {
                    ctx.events.on_parcel_prim_count_tainted.trigger(&());
                }
            })
        })
        .collect();

    // Churn the subscriber list while dispatch is in flight.
    for _ in 0..50 {
        let id = ctx
            .events
            .on_parcel_prim_count_tainted
            .subscribe("transient", |_| {});
        ctx.events.on_parcel_prim_count_tainted.unsubscribe(id);
    }

    for publisher in publishers {
        publisher.join().unwrap();
    }

    // The durable subscriber saw every one of the 1000 triggers.
    assert_eq!(calls.load(Ordering::SeqCst), 1000);
    assert_eq!(
        ctx.events.on_parcel_prim_count_tainted.subscriber_count(),
        1
    );
}
