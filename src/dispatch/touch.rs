use tracing::debug;
use uuid::Uuid;

use super::RequestDispatcher;
use crate::event::{Topic, TouchArgs};
use crate::region::SceneObjectPart;
use crate::shared::{LocalId, Vector3};

/// Which phase of a touch interaction a client reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TouchPhase {
    Start,
    Continue,
    End,
}

impl RequestDispatcher {
    /// Routes an initial touch on a part.
    pub fn dispatch_touch_start(&self, part_local_id: LocalId, agent_id: Uuid, position: Vector3) {
        self.deliver_touch(part_local_id, agent_id, position, TouchPhase::Start);
    }

    /// Routes a held/continuing touch on a part.
    pub fn dispatch_touch_continue(
        &self,
        part_local_id: LocalId,
        agent_id: Uuid,
        position: Vector3,
    ) {
        self.deliver_touch(part_local_id, agent_id, position, TouchPhase::Continue);
    }

    /// Routes the release of a touch on a part.
    pub fn dispatch_touch_end(&self, part_local_id: LocalId, agent_id: Uuid, position: Vector3) {
        self.deliver_touch(part_local_id, agent_id, position, TouchPhase::End);
    }

    /// Touch bubbling: a part with its own handler for this phase receives
    /// the touch, plus the root part when pass-touches is set; a part
    /// without a handler bubbles the touch to the root only. A part never
    /// receives the same touch twice, even when it is its own root.
    fn deliver_touch(
        &self,
        part_local_id: LocalId,
        agent_id: Uuid,
        position: Vector3,
        phase: TouchPhase,
    ) {
        let Some(part) = self.scene.part(part_local_id) else {
            debug!(part_local_id, "Touch on unknown part - dropping");
            return;
        };

        let root = if part.is_root() {
            part.clone()
        } else {
            match self.scene.part(part.root_local_id) {
                Some(root) => root,
                None => {
                    // Link info out of date; treat the part as its own root.
                    debug!(
                        part_local_id,
                        root_local_id = part.root_local_id,
                        "Root part missing - delivering to touched part"
                    );
                    part.clone()
                }
            }
        };

        let events = &self.scene.ctx().events;
        let (topic, has_handler): (&Topic<TouchArgs>, bool) = match phase {
            TouchPhase::Start => (&events.on_touch_start, part.touch_handlers.start),
            TouchPhase::Continue => (&events.on_touch_continue, part.touch_handlers.hold),
            TouchPhase::End => (&events.on_touch_end, part.touch_handlers.end),
        };

        let fire = |target: &SceneObjectPart| {
            topic.trigger(&TouchArgs {
                part_local_id: target.local_id,
                touched_part_local_id: part.local_id,
                agent_id,
                touch_position: position,
            });
        };

        if has_handler {
            fire(&part);
            if part.pass_touches && root.local_id != part.local_id {
                fire(&root);
            }
        } else {
            // No handler on the touched part: the root gets it, exactly
            // once even when the touched part is the root.
            fire(&root);
        }
    }
}
