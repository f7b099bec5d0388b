//! Server-side conversation memory

pub mod store;

pub use store::{
    Clock, ConversationEntry, ConversationRecord, ConversationStore, ManualClock, StoreStats,
    SystemClock, Upserted,
};
