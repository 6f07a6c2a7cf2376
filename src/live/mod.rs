// Real-time layer: the broadcast connection and the concurrent-edit
// conflict coordinator.

pub mod client;
pub mod conflict;

pub use client::{pump_frames, BroadcastPublisher, LiveConnection, LiveEvent};
pub use conflict::{
    Conflict, ConflictCoordinator, ConflictResolution, RemoteOutcome, ResolvedEdit,
    HIGHLIGHT_DURATION,
};
