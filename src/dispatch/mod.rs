// Client request dispatch
//
// Turns raw client-originated requests (chat, touch, inventory browsing)
// into domain events and rate-limited background work.

// Public API - what other modules can use
pub use chat::ChatRequest;
pub use dispatcher::RequestDispatcher;
pub use inventory::{
    DescendantFetchConfig, DescendantFetcher, FolderContents, InMemoryInventoryService,
    InventoryFolder, InventoryItem, InventoryService, PendingDescendantRequest,
};

// Internal modules
mod chat;
mod dispatcher;
mod inventory;
mod touch;
