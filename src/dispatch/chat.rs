use chrono::Utc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::RequestDispatcher;
use crate::event::{ChatArgs, ChatSource};
use crate::shared::Vector3;

/// A chat utterance as it arrives off the network layer, sender not yet
/// resolved against scene state.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub sender_id: Uuid,
    pub message: String,
    pub channel: i32,
    pub position: Vector3,
    pub broadcast: bool,
    /// Non-empty routes to a single listener (private chat); the same
    /// dispatch path handles it, listeners filter on the target.
    pub target_id: Option<Uuid>,
}

impl RequestDispatcher {
    /// Resolves the sender (live avatar vs. scene object) and publishes
    /// the message onto the matching chat topic. Unresolvable senders are
    /// logged and dropped; nothing errors back to the network caller.
    #[instrument(skip(self, request), fields(sender_id = %request.sender_id, channel = request.channel))]
    pub fn dispatch_chat(&self, request: ChatRequest) {
        let (source, sender_name) = if let Some(presence) = self.scene.presence(request.sender_id)
        {
            (ChatSource::Agent, presence.name.clone())
        } else if let Some(part) = self.scene.part_by_uuid(request.sender_id) {
            (ChatSource::Object, part.name.clone())
        } else {
            debug!("Chat sender not present in scene - dropping message");
            return;
        };

        let args = ChatArgs {
            sender_id: request.sender_id,
            sender_name,
            source,
            channel: request.channel,
            message: request.message,
            position: request.position,
            target_id: request.target_id,
            sent_at: Utc::now(),
        };

        let events = &self.scene.ctx().events;
        if request.broadcast {
            events.on_chat_broadcast.trigger(&args);
        } else {
            events.on_chat_from_world.trigger(&args);
        }
    }
}
