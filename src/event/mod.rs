// Scene-wide event distribution
//
// This module provides the typed publish/subscribe infrastructure that
// turns the region's independent subsystems into one coherent simulation
// loop without compile-time coupling between them.

// Public API - what other modules can use
pub use bus::{EventBus, SubscriptionId, Topic, VetoTopic};
pub use topics::{
    AvatarMovement, ChatArgs, ChatSource, ColliderArgs, ContactPoint, FrameTick, GroupMoveArgs,
    LandBuyArgs, ObjectArgs, PresenceArgs, RezScriptArgs, ScriptTarget, TeleportArgs, TouchArgs,
};

// Internal modules
mod bus;
mod topics;
