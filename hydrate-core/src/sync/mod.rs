//! Progress exchange between the main process and the widget

pub mod bridge;
pub mod refresh;
pub mod store;

pub use bridge::{
    decide, ReconcileDecision, ReconcileOutcome, SharedProgressState, SyncBridge, SyncPhase,
};
pub use refresh::{
    FileRefreshTrigger, NoopRefresh, RefreshTrigger, RefreshWatcher, APP_REFRESH_MARKER,
    WIDGET_REFRESH_MARKER,
};
pub use store::{FileSharedStore, MemorySharedStore, SharedStore};
