use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{info, instrument};

use super::context::RegionContext;
use crate::event::FrameTick;

/// Configuration for the simulation frame loop.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Target interval between frames.
    pub frame_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            // ~11 fps, the classic region frame rate
            frame_interval: Duration::from_millis(90),
        }
    }
}

/// Starts the frame loop: a dedicated task that periodically triggers the
/// frame topic. Physics, networking, and scripting run elsewhere and fire
/// their topics asynchronously relative to this loop.
///
/// Frame dispatch is synchronous inside the tick: a slow frame subscriber
/// delays the next frame rather than overlapping with it.
#[instrument(skip(ctx))]
pub fn start_heartbeat(ctx: Arc<RegionContext>, config: HeartbeatConfig) -> JoinHandle<()> {
    info!(
        region = %ctx.name,
        frame_interval_ms = config.frame_interval.as_millis() as u64,
        "Starting region heartbeat"
    );

    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = interval(config.frame_interval);
        let mut frame: u64 = 0;

        loop {
            ticker.tick().await;
            frame += 1;
            ctx.events.on_frame.trigger(&FrameTick {
                frame,
                uptime: started.elapsed(),
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::RegionHandle;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_heartbeat_triggers_frame_topic() {
        let ctx = RegionContext::new("test", RegionHandle::from_cells(1, 1), "http://sim");
        let frames = Arc::new(AtomicU64::new(0));

        let seen = Arc::clone(&frames);
        ctx.events.on_frame.subscribe("counter", move |tick| {
            seen.store(tick.frame, Ordering::SeqCst);
        });

        let handle = start_heartbeat(
            Arc::clone(&ctx),
            HeartbeatConfig {
                frame_interval: Duration::from_millis(5),
            },
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(frames.load(Ordering::SeqCst) >= 2);
    }
}
